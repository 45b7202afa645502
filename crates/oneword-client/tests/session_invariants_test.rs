//! Invariants that must hold in every snapshot the client applies, checked
//! over scripted and seeded sequences of joins, leaves, words and skips.

mod common;

use std::sync::{Arc, Mutex};

use oneword_client::engine::SessionClient;
use oneword_core::model::Session;
use oneword_test_support::{InMemorySessionService, ScriptedTransport, session_in_progress};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use common::{Harness, remote_join, remote_leave, remote_skip, remote_word};

type Violations = Arc<Mutex<Vec<String>>>;

fn check(session: &Session) -> Result<(), String> {
    let creators = session.authors.iter().filter(|a| a.is_creator).count();
    if creators > 1 {
        return Err(format!("version {}: {creators} creators", session.version));
    }
    if !session.authors.is_empty() && session.turn_index >= session.authors.len() {
        return Err(format!(
            "version {}: turn index {} with {} authors",
            session.version,
            session.turn_index,
            session.authors.len()
        ));
    }
    Ok(())
}

/// Checks every view the client publishes until it stops.
fn watch_invariants(client: &SessionClient) -> Violations {
    let violations = Violations::default();
    let sink = Arc::clone(&violations);
    let mut views = client.watch();
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let checked = views.borrow_and_update().session.as_ref().map(check);
            if let Some(Err(violation)) = checked {
                sink.lock().unwrap().push(violation);
            }
        }
    });
    violations
}

/// `bo` and `cy` are writing with the local client joined as `ada` in
/// between them.
async fn bo_ada_cy() -> (Harness, Session) {
    let service = Arc::new(InMemorySessionService::new());
    let session = session_in_progress(&["bo"]);
    service.insert(session.clone());
    let h = common::start(service.clone(), ScriptedTransport::accepting());
    h.open(session.id).await;
    h.client.join("ada").await.unwrap();
    let latest = remote_join(&service, session.id, "cy").await;
    h.refresh_to(latest.version).await;
    (h, session)
}

#[tokio::test(start_paused = true)]
async fn test_turn_wraps_when_the_last_author_leaves_holding_it() {
    // Arrange
    let (h, session) = bo_ada_cy().await;
    let violations = watch_invariants(&h.client);
    let latest = remote_word(&h.service, session.id, "bo", "Once").await;
    h.refresh_to(latest.version).await;
    h.client.add_word("upon").await.unwrap();

    // Act
    let left = remote_leave(&h.service, session.id, "cy").await;
    let view = h.refresh_to(left.version).await;

    // Assert
    let shown = view.session.unwrap();
    assert_eq!(shown.turn_index, 0);
    assert_eq!(shown.current_turn_author().map(|a| a.name.as_str()), Some("bo"));
    assert!(!view.is_local_turn);
    assert!(violations.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_turn_passes_on_when_its_holder_leaves() {
    let (h, session) = bo_ada_cy().await;
    let violations = watch_invariants(&h.client);

    let left = remote_leave(&h.service, session.id, "bo").await;
    let view = h.refresh_to(left.version).await;

    let shown = view.session.unwrap();
    assert_eq!(shown.turn_index, 0);
    assert!(view.is_local_turn);
    assert!(violations.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_creator_who_leaves_and_returns_is_the_only_creator() {
    // Arrange
    let service = Arc::new(InMemorySessionService::new());
    let creator_id = Uuid::new_v4();
    let session = service.create_session("The Lighthouse", creator_id, 0, 0);
    let h = common::start_as(service.clone(), ScriptedTransport::accepting(), creator_id);
    let violations = watch_invariants(&h.client);
    h.open(session.id).await;
    h.client.join("ada").await.unwrap();
    remote_join(&service, session.id, "bo").await;

    // Act
    h.client.leave().await.unwrap();
    h.open(session.id).await;
    h.client.join("ada").await.unwrap();

    // Assert
    let after = h.authoritative(session.id);
    let creators: Vec<&str> = after
        .authors
        .iter()
        .filter(|a| a.is_creator)
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(creators, vec!["ada"]);
    assert!(h.client.view().is_creator);
    assert!(violations.lock().unwrap().is_empty());
}

/// Drives one seeded sequence and returns every invariant violation seen
/// either in the service or in a view the client published.
async fn run_sequence(seed: u64, steps: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let service = Arc::new(InMemorySessionService::new());
    let creator_id = Uuid::new_v4();
    let session = service.create_session("Seeded", creator_id, 0, 0);
    let h = common::start_as(service.clone(), ScriptedTransport::accepting(), creator_id);
    let violations = watch_invariants(&h.client);
    h.open(session.id).await;
    h.client.join("ada").await.unwrap();
    remote_join(&service, session.id, "bo").await;
    let latest = remote_join(&service, session.id, "cy").await;
    h.refresh_to(latest.version).await;
    h.client.begin().await.unwrap();
    let mut joined = 0;

    for _ in 0..steps {
        let before = h.authoritative(session.id);
        let local_in = before.author_named("ada").is_some();
        let holder = before
            .current_turn_author()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        match rng.random_range(0..5) {
            0 => {
                joined += 1;
                remote_join(&service, session.id, &format!("w{joined}")).await;
            }
            1 if before.authors.len() > 2 => {
                let remote: Vec<&str> = before
                    .authors
                    .iter()
                    .map(|a| a.name.as_str())
                    .filter(|name| *name != "ada")
                    .collect();
                let leaving = remote[rng.random_range(0..remote.len())];
                remote_leave(&service, session.id, leaving).await;
            }
            2 if holder == "ada" => h.client.add_word("and").await.unwrap(),
            2 => {
                remote_word(&service, session.id, &holder, "then").await;
            }
            3 => {
                remote_skip(&service, session.id, &holder).await;
            }
            4 if local_in && before.authors.len() > 2 => h.client.leave().await.unwrap(),
            4 if !local_in => {
                h.open(session.id).await;
                h.client.join("ada").await.unwrap();
            }
            _ => {}
        }

        let after = h.authoritative(session.id);
        if let Err(violation) = check(&after) {
            violations.lock().unwrap().push(violation);
        }
        if after.author_named("ada").is_some() {
            h.refresh_to(after.version).await;
        }
    }

    violations.lock().unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn test_seeded_sequences_keep_one_creator_and_a_valid_turn() {
    for seed in 0..12 {
        let violations = run_sequence(seed, 60).await;

        assert!(violations.is_empty(), "seed {seed}: {violations:?}");
    }
}
