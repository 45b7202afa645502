//! Process wiring for a host that embeds the session client.
//!
//! The host brings its own session service and push transport; everything
//! else comes from the environment.

use std::sync::Arc;

use oneword_core::clock::SystemClock;
use oneword_core::error::DomainError;
use oneword_core::service::SessionService;
use oneword_core::transport::PushTransport;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::ClientConfig;
use crate::engine::{ClientDeps, ClientEvent, SessionClient};
use crate::error::AppError;
use crate::identity_store::JsonFileIdentityStore;
use crate::telemetry;

/// Reads the configuration from the environment and installs tracing in
/// the format it names.
///
/// # Errors
///
/// Returns `AppError::Config` for an invalid variable or if tracing is
/// already installed.
pub fn init_from_env() -> Result<ClientConfig, AppError> {
    let config = ClientConfig::from_env()?;
    telemetry::init_tracing(config.log_format)?;
    info!(
        identity_path = %config.identity_path.display(),
        reconnect_attempts = config.reconnect.max_attempts,
        "session client configured"
    );
    Ok(config)
}

/// Starts a session client that keeps its identity in the JSON file at
/// `config.identity_path` and stamps notifications with the system clock.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the identity file exists but
/// cannot be read.
pub fn start(
    config: &ClientConfig,
    service: Arc<dyn SessionService>,
    transport: Arc<dyn PushTransport>,
) -> Result<(SessionClient, mpsc::UnboundedReceiver<ClientEvent>), DomainError> {
    let deps = ClientDeps {
        service,
        transport,
        identity: Arc::new(JsonFileIdentityStore::new(config.identity_path.clone())),
        clock: Arc::new(SystemClock),
    };
    SessionClient::spawn(deps, config)
}
