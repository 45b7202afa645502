//! Integration tests for starting a client the way a host process does.

mod common;

use std::sync::Arc;

use oneword_client::bootstrap;
use oneword_client::config::ClientConfig;
use oneword_client::error::AppError;
use oneword_client::identity_store::JsonFileIdentityStore;
use oneword_core::identity::{IdentityStore, ParticipantIdentity};
use oneword_test_support::{InMemorySessionService, ScriptedTransport, session_awaiting};
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn test_started_client_keeps_its_identity_on_disk() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    let participant_id = Uuid::new_v4();
    JsonFileIdentityStore::new(&path)
        .save(&ParticipantIdentity {
            participant_id: Some(participant_id),
            ..ParticipantIdentity::default()
        })
        .unwrap();
    let config = ClientConfig {
        identity_path: path.clone(),
        ..common::test_config()
    };
    let service = Arc::new(InMemorySessionService::new());
    let session = session_awaiting(&["bo"]);
    service.insert(session.clone());
    let (client, _events) = bootstrap::start(
        &config,
        service.clone(),
        Arc::new(ScriptedTransport::accepting()),
    )
    .unwrap();

    // Act
    client.open(session.id);
    client
        .watch()
        .wait_for(|v| v.session.is_some())
        .await
        .unwrap();
    client.join("ada").await.unwrap();
    client.shutdown();

    // Assert
    let stored = JsonFileIdentityStore::new(&path).load().unwrap();
    assert_eq!(stored.participant_id, Some(participant_id));
    assert_eq!(stored.name.as_deref(), Some("ada"));
    assert_eq!(stored.current_session_id, Some(session.id));
    let joined = service.snapshot(session.id).unwrap();
    assert_eq!(joined.author_named("ada").map(|a| a.id), Some(participant_id));
}

#[tokio::test]
async fn test_unreadable_identity_file_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    std::fs::write(&path, "{ not json").unwrap();
    let config = ClientConfig {
        identity_path: path,
        ..common::test_config()
    };

    let result = bootstrap::start(
        &config,
        Arc::new(InMemorySessionService::new()),
        Arc::new(ScriptedTransport::accepting()),
    );

    assert!(result.is_err());
}

#[test]
fn test_tracing_is_installed_once() {
    let first = bootstrap::init_from_env();
    let second = bootstrap::init_from_env();

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Config(_))));
}
