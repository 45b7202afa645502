//! Push event dispatch.
//!
//! Turns inbound frames into what the engine should do with them. Every
//! session event asks for a refresh; none of them changes local state on
//! its own. Replays are dropped by event id.

use std::collections::VecDeque;

use oneword_core::event::{PushEnvelope, PushEvent};
use tracing::debug;
use uuid::Uuid;

/// Side effect beyond refreshing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The service issued a participant id for this connection.
    IdentityIssued(Uuid),
    /// Show a message for a while, then refresh.
    TransientBanner(String),
}

/// What to do about one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Fetch the session again.
    pub refresh: bool,
    /// Message for the user.
    pub notification: Option<String>,
    /// Extra effect.
    pub effect: Option<Effect>,
}

/// Filters and interprets push events for the tracked session.
#[derive(Debug)]
pub struct EventDispatcher {
    session_id: Option<Uuid>,
    seen: VecDeque<Uuid>,
    window: usize,
}

impl EventDispatcher {
    /// Remember up to `window` recent event ids.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            session_id: None,
            seen: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Sets the session whose events are of interest.
    pub fn set_session(&mut self, session_id: Option<Uuid>) {
        self.session_id = session_id;
    }

    /// Interprets one frame. Returns `None` when the frame is dropped.
    pub fn dispatch(&mut self, envelope: &PushEnvelope) -> Option<Dispatch> {
        if let PushEvent::UserConnected { id } = envelope.event {
            return Some(Dispatch {
                refresh: self.session_id.is_some(),
                notification: None,
                effect: Some(Effect::IdentityIssued(id)),
            });
        }

        let tracked = self.session_id?;
        if envelope.session_id.is_some_and(|id| id != tracked) {
            debug!(event = envelope.event.kind(), "dropping event for another session");
            return None;
        }
        if let Some(event_id) = envelope.event_id
            && !self.remember(event_id)
        {
            debug!(%event_id, event = envelope.event.kind(), "dropping replayed event");
            return None;
        }

        Some(interpret(&envelope.event))
    }

    fn remember(&mut self, event_id: Uuid) -> bool {
        if self.seen.contains(&event_id) {
            return false;
        }
        if self.window == 0 {
            return true;
        }
        if self.seen.len() == self.window {
            self.seen.pop_front();
        }
        self.seen.push_back(event_id);
        true
    }
}

fn refresh_with(notification: String) -> Dispatch {
    Dispatch {
        refresh: true,
        notification: Some(notification),
        effect: None,
    }
}

fn interpret(event: &PushEvent) -> Dispatch {
    match event {
        PushEvent::WordAdded {
            author,
            word,
            next_author,
        } => refresh_with(format!(
            "{author} added '{}' to the story. {next_author}, it's your turn.",
            word.replace('\\', "")
        )),
        PushEvent::SkippedTurn { author } | PushEvent::TimerExpired { author } => {
            refresh_with(format!("{author} passed or ran out of time!"))
        }
        PushEvent::AuthorJoined { author } => refresh_with(format!("{author} joined the story.")),
        PushEvent::AuthorLeft { author } | PushEvent::UserDisconnected { author } => {
            refresh_with(format!("{author} left the story."))
        }
        PushEvent::VoteOutcomeMessage { message } => Dispatch {
            refresh: false,
            notification: None,
            effect: Some(Effect::TransientBanner(message.clone())),
        },
        PushEvent::SessionDeleted
        | PushEvent::StateChanged
        | PushEvent::VoteStarted
        | PushEvent::VoteMade
        | PushEvent::VoteEnded
        | PushEvent::UserConnected { .. } => Dispatch {
            refresh: true,
            ..Dispatch::default()
        },
    }
}
