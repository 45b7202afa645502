//! Resuming or abandoning a session after a restart.

use oneword_core::command::{LeaveSession, SessionCommand};
use oneword_core::error::DomainError;
use oneword_core::identity::IdentityStore;
use oneword_core::service::{self, SessionService};
use tracing::{info, warn};
use uuid::Uuid;

/// What the identity store says about an interrupted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCheck {
    /// Nothing to resume.
    Nothing,
    /// The session is still open and can be rejoined.
    Resume {
        /// Session to return to.
        session_id: Uuid,
        /// Its title, for the prompt.
        title: String,
    },
    /// The remembered session no longer exists. The reference was cleared.
    SessionGone {
        /// The session that disappeared.
        session_id: Uuid,
    },
}

/// Looks up the remembered session.
///
/// A completed session is forgotten silently.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the identity store fails, or a
/// transient error if the service cannot be reached. The reference is kept
/// in that case.
pub async fn resume_check(
    service: &dyn SessionService,
    identity: &dyn IdentityStore,
) -> Result<ResumeCheck, DomainError> {
    let Some(session_id) = identity.load()?.current_session_id else {
        return Ok(ResumeCheck::Nothing);
    };
    match service.fetch_session(session_id).await {
        Ok(session) if session.is_completed() => {
            info!(%session_id, "remembered session has completed");
            identity.update(&|i| i.current_session_id = None)?;
            Ok(ResumeCheck::Nothing)
        }
        Ok(session) => Ok(ResumeCheck::Resume {
            session_id,
            title: session.title,
        }),
        Err(DomainError::SessionNotFound(_)) => {
            info!(%session_id, "remembered session no longer exists");
            identity.update(&|i| i.current_session_id = None)?;
            Ok(ResumeCheck::SessionGone { session_id })
        }
        Err(err) => Err(err),
    }
}

/// Leaves the remembered session, best-effort, and forgets it.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the identity store fails. A
/// failed leave command is logged and otherwise ignored.
pub async fn abandon(
    service: &dyn SessionService,
    identity: &dyn IdentityStore,
) -> Result<(), DomainError> {
    let stored = identity.load()?;
    if let (Some(session_id), Some(name)) = (stored.current_session_id, stored.name) {
        let command = SessionCommand::Leave(LeaveSession {
            correlation_id: Uuid::new_v4(),
            session_id,
            author_name: name,
        });
        if let Err(err) = service::execute(service, &command).await {
            warn!(%session_id, error = %err, "leave failed while abandoning session");
        }
    }
    identity.update(&|i| i.current_session_id = None)
}

/// Abandons the remembered session and forgets the remembered name.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the identity store fails.
pub async fn forget_name(
    service: &dyn SessionService,
    identity: &dyn IdentityStore,
) -> Result<(), DomainError> {
    abandon(service, identity).await?;
    identity.update(&|i| i.name = None)
}
