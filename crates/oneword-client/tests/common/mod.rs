//! Shared test helpers for client engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use oneword_client::config::ClientConfig;
use oneword_client::engine::{ClientDeps, ClientEvent, ClientView, SessionClient};
use oneword_connection::domain::state::{ConnectionState, ReconnectPolicy};
use oneword_core::command::{AppendWord, CastVote, JoinSession, LeaveSession, SkipTurn};
use oneword_core::identity::ParticipantIdentity;
use oneword_core::model::Session;
use oneword_core::service::SessionService;
use oneword_test_support::{
    FixedClock, InMemoryIdentityStore, InMemorySessionService, ScriptedTransport,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

/// Upper bound on any wait in paused time.
const PATIENCE: Duration = Duration::from_secs(120);

/// A running client wired to in-memory collaborators.
pub struct Harness {
    pub client: SessionClient,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    pub service: Arc<InMemorySessionService>,
    pub transport: Arc<ScriptedTransport>,
    pub identity: Arc<InMemoryIdentityStore>,
    pub participant_id: Uuid,
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        reconnect: ReconnectPolicy {
            polling_interval: Duration::from_millis(3000),
            max_attempts: 3,
        },
        ..ClientConfig::default()
    }
}

/// Start a client whose identity already holds a participant id.
pub fn start(service: Arc<InMemorySessionService>, transport: ScriptedTransport) -> Harness {
    let participant_id = Uuid::new_v4();
    start_as(service, transport, participant_id)
}

pub fn start_as(
    service: Arc<InMemorySessionService>,
    transport: ScriptedTransport,
    participant_id: Uuid,
) -> Harness {
    let transport = Arc::new(transport);
    let identity = Arc::new(InMemoryIdentityStore::with(ParticipantIdentity {
        participant_id: Some(participant_id),
        ..ParticipantIdentity::default()
    }));
    let deps = ClientDeps {
        service: service.clone(),
        transport: transport.clone(),
        identity: identity.clone(),
        clock: Arc::new(FixedClock::default()),
    };
    let (client, events) = SessionClient::spawn(deps, &test_config()).unwrap();
    Harness {
        client,
        events,
        service,
        transport,
        identity,
        participant_id,
    }
}

impl Harness {
    /// Wait until the published view satisfies `wanted`.
    pub async fn view_until(&self, wanted: impl FnMut(&ClientView) -> bool) -> ClientView {
        let mut rx = self.client.watch();
        timeout(PATIENCE, async move { rx.wait_for(wanted).await.unwrap().clone() })
            .await
            .expect("timed out waiting for view")
    }

    /// Wait for the next event satisfying `wanted`, skipping others.
    pub async fn event_until(&mut self, wanted: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        let events = &mut self.events;
        timeout(PATIENCE, async move {
            loop {
                match events.recv().await {
                    Some(event) if wanted(&event) => return event,
                    Some(_) => {}
                    None => panic!("client event stream ended"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Every event received so far without waiting.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            seen.push(event);
        }
        seen
    }

    /// Open `session_id` and wait for its first snapshot.
    pub async fn open(&self, session_id: Uuid) -> ClientView {
        self.client.open(session_id);
        self.view_until(|v| v.session.as_ref().is_some_and(|s| s.id == session_id))
            .await
    }

    /// Connect and wait for the channel to open.
    pub async fn connect(&self) {
        self.client.connect();
        self.view_until(|v| v.connection == ConnectionState::Open)
            .await;
    }

    /// Refresh and wait until the view shows at least `version`.
    pub async fn refresh_to(&self, version: u64) -> ClientView {
        self.client.refresh();
        self.view_until(|v| v.session.as_ref().is_some_and(|s| s.version >= version))
            .await
    }

    /// The authoritative copy of `session_id`.
    pub fn authoritative(&self, session_id: Uuid) -> Session {
        self.service.snapshot(session_id).unwrap()
    }
}

/// Wait until `condition` holds, polling every 100ms of paused time.
pub async fn eventually(condition: impl Fn() -> bool) {
    timeout(PATIENCE, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("condition never held");
}

/// Another participant joins directly through the service.
pub async fn remote_join(service: &InMemorySessionService, session_id: Uuid, name: &str) -> Session {
    service
        .join_session(&JoinSession {
            correlation_id: Uuid::new_v4(),
            session_id,
            participant_id: Uuid::new_v4(),
            name: name.to_owned(),
        })
        .await
        .unwrap()
}

/// Another participant appends a word directly through the service.
pub async fn remote_word(
    service: &InMemorySessionService,
    session_id: Uuid,
    author: &str,
    word: &str,
) -> Session {
    service
        .append_word(&AppendWord {
            correlation_id: Uuid::new_v4(),
            session_id,
            author_name: author.to_owned(),
            word: word.to_owned(),
        })
        .await
        .unwrap()
}

/// Another participant votes directly through the service.
pub async fn remote_vote(
    service: &InMemorySessionService,
    session_id: Uuid,
    voter: &str,
    decision: bool,
) -> Session {
    service
        .cast_vote(&CastVote {
            correlation_id: Uuid::new_v4(),
            session_id,
            voter: voter.to_owned(),
            decision,
        })
        .await
        .unwrap()
}

/// Another participant leaves directly through the service.
pub async fn remote_leave(service: &InMemorySessionService, session_id: Uuid, name: &str) -> Session {
    service
        .leave_session(&LeaveSession {
            correlation_id: Uuid::new_v4(),
            session_id,
            author_name: name.to_owned(),
        })
        .await
        .unwrap()
}

/// Another participant's turn runs out.
pub async fn remote_skip(service: &InMemorySessionService, session_id: Uuid, name: &str) -> Session {
    service
        .skip_turn(&SkipTurn {
            correlation_id: Uuid::new_v4(),
            session_id,
            author_name: name.to_owned(),
        })
        .await
        .unwrap()
}
