//! Integration tests for proposing, casting and concluding votes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use oneword_client::engine::ClientEvent;
use oneword_core::command::ProposeVote;
use oneword_core::error::{DomainError, ValidationError};
use oneword_core::event::{OutboundMessage, PushEnvelope, PushEvent};
use oneword_core::model::{Session, VoteOutcome, VoteType};
use oneword_core::service::SessionService;
use oneword_test_support::{InMemorySessionService, ScriptedTransport, session_in_progress};
use uuid::Uuid;

use common::{Harness, remote_vote};

/// `bo` and `cy` are writing; the local client has joined as `ada`.
async fn three_authors() -> (Harness, Session) {
    let service = Arc::new(InMemorySessionService::new());
    let session = session_in_progress(&["bo", "cy"]);
    service.insert(session.clone());
    let h = common::start(service, ScriptedTransport::accepting());
    h.open(session.id).await;
    h.client.join("ada").await.unwrap();
    (h, session)
}

fn count(calls: &[&'static str], wanted: &str) -> usize {
    calls.iter().filter(|c| **c == wanted).count()
}

#[tokio::test(start_paused = true)]
async fn test_majority_concludes_once_and_broadcasts_the_outcome() {
    // Arrange
    let (mut h, session) = three_authors().await;
    h.connect().await;
    h.client.propose_vote(VoteType::EndStory).await.unwrap();
    h.client.cast_vote(true).await.unwrap();
    let twice = h.client.cast_vote(false).await;

    // Act
    remote_vote(&h.service, session.id, "bo", true).await;
    h.client.refresh();
    let decided = h
        .event_until(|e| matches!(e, ClientEvent::VoteDecided { .. }))
        .await;
    let completed = h
        .event_until(|e| matches!(e, ClientEvent::SessionCompleted { .. }))
        .await;
    h.client.refresh();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Assert
    assert_eq!(twice, Err(DomainError::AlreadyVoted("ada".into())));
    assert_eq!(
        decided,
        ClientEvent::VoteDecided {
            outcome: VoteOutcome::Carried,
            message: "Vote passed: end the story".into(),
        }
    );
    assert_eq!(
        completed,
        ClientEvent::SessionCompleted {
            session_id: session.id
        }
    );
    assert_eq!(
        h.transport.sent(),
        vec![OutboundMessage::VoteOutcome {
            session_id: session.id,
            message: "Vote passed: end the story".into(),
        }]
    );
    let calls = h.service.command_calls();
    assert_eq!(count(&calls, "vote.conclude"), 1);
    assert_eq!(count(&calls, "vote.cast"), 2);
    assert!(h.authoritative(session.id).is_completed());
    assert_eq!(h.identity.current().current_session_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_proposer_must_wait_for_someone_else_to_propose() {
    // Arrange: ada's vote fails.
    let (h, session) = three_authors().await;
    h.client.propose_vote(VoteType::EndStory).await.unwrap();
    remote_vote(&h.service, session.id, "bo", false).await;
    remote_vote(&h.service, session.id, "cy", false).await;
    h.client.refresh();
    h.view_until(|v| {
        v.session
            .as_ref()
            .is_some_and(|s| s.previous_vote_proposer() == Some("ada"))
    })
    .await;

    // Act
    let blocked = h.client.propose_vote(VoteType::EndStory).await;
    h.service
        .propose_vote(&ProposeVote {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            vote_type: VoteType::EndStory,
            proposer: "bo".into(),
        })
        .await
        .unwrap();
    remote_vote(&h.service, session.id, "bo", false).await;
    remote_vote(&h.service, session.id, "cy", false).await;
    h.client.refresh();
    h.view_until(|v| {
        v.session
            .as_ref()
            .is_some_and(|s| s.previous_vote_proposer() == Some("bo"))
    })
    .await;
    let allowed = h.client.propose_vote(VoteType::EndStory).await;

    // Assert
    assert_eq!(
        blocked,
        Err(DomainError::ConsecutiveProposalNotAllowed("ada".into()))
    );
    assert_eq!(allowed, Ok(()));
    let calls = h.service.command_calls();
    assert_eq!(count(&calls, "vote.propose"), 3);
    assert_eq!(count(&calls, "vote.conclude"), 2);
    assert!(!h.authoritative(session.id).is_completed());
}

#[tokio::test(start_paused = true)]
async fn test_retracting_needs_a_word() {
    let (h, _session) = three_authors().await;

    let result = h.client.propose_vote(VoteType::EditWord).await;

    assert_eq!(
        result,
        Err(ValidationError::NothingToRetract.into())
    );
    assert_eq!(h.service.command_calls(), vec!["session.join"]);
}

#[tokio::test(start_paused = true)]
async fn test_shared_outcome_shows_then_refreshes() {
    // Arrange
    let (h, _session) = three_authors().await;
    h.connect().await;
    let fetches_before = count(&h.service.calls(), "session.fetch");

    // Act
    assert!(h.transport.push(PushEnvelope::bare(PushEvent::VoteOutcomeMessage {
        message: "Vote failed: end the story".into(),
    })));
    let shown = h
        .view_until(|v| v.banner.as_deref() == Some("Vote failed: end the story"))
        .await;
    let cleared = h.view_until(|v| v.banner.is_none()).await;

    // Assert
    assert_eq!(shown.banner.as_deref(), Some("Vote failed: end the story"));
    assert!(cleared.banner.is_none());
    common::eventually(|| count(&h.service.calls(), "session.fetch") > fetches_before).await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_conclusion_is_reported_and_retried_on_next_snapshot() {
    // Arrange
    let (mut h, session) = three_authors().await;
    h.client.propose_vote(VoteType::EndStory).await.unwrap();
    remote_vote(&h.service, session.id, "bo", true).await;
    remote_vote(&h.service, session.id, "cy", true).await;
    h.service.set_fail_commands(true);

    // Act
    h.client.refresh();
    let failed = h
        .event_until(|e| matches!(e, ClientEvent::CommandFailed { .. }))
        .await;
    h.service.set_fail_commands(false);
    h.client.refresh();
    h.event_until(|e| matches!(e, ClientEvent::SessionCompleted { .. }))
        .await;

    // Assert
    assert!(matches!(
        failed,
        ClientEvent::CommandFailed {
            command_type: "vote.conclude",
            error: DomainError::Transient(_),
        }
    ));
    assert_eq!(count(&h.service.command_calls(), "vote.conclude"), 2);
}
