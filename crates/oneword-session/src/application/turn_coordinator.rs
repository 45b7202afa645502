//! Turn coordinator.
//!
//! Runs the per-turn countdown and builds the turn commands a local author
//! may issue. Each countdown activation gets a new generation; ticks carry
//! the generation they were started under and are discarded once it is no
//! longer current, so a cancelled countdown can never trigger a late skip.

use std::time::Duration;

use oneword_core::command::{AppendWord, SkipTurn};
use oneword_core::error::DomainError;
use oneword_core::model::{Session, SessionState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::countdown::{self, Countdown, TickOutcome, TimerDirective};
use crate::domain::validation::validate_word;
use crate::domain::views;

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One-second tick from a countdown activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    /// Generation the ticker was started under.
    pub generation: u64,
}

/// What a tick meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// From a cancelled activation; ignore it.
    Stale,
    /// Seconds left.
    Counting(u32),
    /// The countdown reached zero and stopped.
    Expired,
}

/// Owns the countdown and its ticker task.
#[derive(Debug)]
pub struct TurnCoordinator {
    countdown: Option<Countdown>,
    generation: u64,
    ticker: Option<JoinHandle<()>>,
    ticks: mpsc::UnboundedSender<TimerTick>,
}

impl TurnCoordinator {
    /// Create a coordinator whose ticks are delivered on `ticks`.
    #[must_use]
    pub fn new(ticks: mpsc::UnboundedSender<TimerTick>) -> Self {
        Self {
            countdown: None,
            generation: 0,
            ticker: None,
            ticks,
        }
    }

    /// Seconds left on the current turn, or `None` while paused or untimed.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.countdown.and_then(|c| c.remaining())
    }

    /// The per-turn limit captured from the first snapshot; 0 when untimed
    /// or before any snapshot.
    #[must_use]
    pub fn countdown_max(&self) -> u32 {
        self.countdown.map_or(0, |c| c.max())
    }

    /// Current activation generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-evaluates the countdown after `next` replaced `previous`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_snapshot(&mut self, previous: Option<&Session>, next: &Session) -> TimerDirective {
        let max = self
            .countdown
            .get_or_insert_with(|| Countdown::new(next.turn_time_limit_seconds))
            .max();
        let directive = countdown::directive(previous, next, max);
        match directive {
            TimerDirective::Inert | TimerDirective::Keep => {}
            TimerDirective::Restart => self.restart(),
            TimerDirective::Pause => self.pause(),
        }
        directive
    }

    /// Applies a tick.
    pub fn on_tick(&mut self, tick: TimerTick) -> TickResult {
        if tick.generation != self.generation {
            return TickResult::Stale;
        }
        let Some(countdown) = self.countdown.as_mut() else {
            return TickResult::Stale;
        };
        match countdown.tick() {
            TickOutcome::Idle => TickResult::Stale,
            TickOutcome::Counting(n) => TickResult::Counting(n),
            TickOutcome::Expired => {
                info!(generation = self.generation, "turn countdown expired");
                self.stop_ticker();
                TickResult::Expired
            }
        }
    }

    /// Cancels everything and forgets the captured limit.
    pub fn reset(&mut self) {
        self.stop_ticker();
        self.countdown = None;
    }

    /// The skip to send after expiry, if the local author holds the turn.
    #[must_use]
    pub fn skip_command(session: &Session, local_name: Option<&str>) -> Option<SkipTurn> {
        let name = local_name?;
        if session.state != SessionState::InProgress || !views::is_turn_of(session, name) {
            return None;
        }
        Some(SkipTurn {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            author_name: name.to_owned(),
        })
    }

    /// Validates a word and builds the command to append it.
    ///
    /// # Errors
    ///
    /// - `Validation` if the word is empty, too long or has inner spaces.
    /// - `InvalidState` unless the session is in progress.
    /// - `VoteAlreadyActive` while a vote is open.
    /// - `NotJoined` without a confirmed local name.
    /// - `NotYourTurn` if another author holds the turn.
    pub fn word_command(
        session: &Session,
        local_name: Option<&str>,
        raw_word: &str,
    ) -> Result<AppendWord, DomainError> {
        let word = validate_word(raw_word)?;
        if session.state != SessionState::InProgress {
            return Err(DomainError::InvalidState(session.state));
        }
        if session.vote_is_active() {
            return Err(DomainError::VoteAlreadyActive);
        }
        let name = local_name.ok_or(DomainError::NotJoined)?;
        let current = views::current_turn_name(session).unwrap_or_default();
        if current != name {
            return Err(DomainError::NotYourTurn {
                attempted: name.to_owned(),
                current: current.to_owned(),
            });
        }
        Ok(AppendWord {
            correlation_id: Uuid::new_v4(),
            session_id: session.id,
            author_name: name.to_owned(),
            word,
        })
    }

    fn restart(&mut self) {
        self.stop_ticker();
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.restart();
        }
        debug!(generation = self.generation, "turn countdown started");

        let ticks = self.ticks.clone();
        let generation = self.generation;
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            loop {
                interval.tick().await;
                if ticks.send(TimerTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn pause(&mut self) {
        self.stop_ticker();
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.clear();
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.generation += 1;
    }
}

impl Drop for TurnCoordinator {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
