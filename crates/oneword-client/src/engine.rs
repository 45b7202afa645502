//! Session client engine.
//!
//! One tokio task owns every piece of local state: the session store, the
//! turn and vote coordinators, the membership manager and the dispatcher.
//! Caller requests, connection signals, countdown ticks and completions of
//! remote calls all arrive on channels and are handled one at a time.
//! Remote calls run on spawned tasks and post their results back to the
//! inbox, so a slow service never holds up ticks or push handling.
//!
//! Callers talk to the engine through a cheap, cloneable [`SessionClient`]
//! handle. The engine publishes a [`ClientView`] after every step and
//! reports discrete happenings as [`ClientEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use oneword_connection::application::manager::ConnectionManager;
use oneword_connection::domain::state::{ConnectionSignal, ConnectionState};
use oneword_core::clock::Clock;
use oneword_core::command::{Command, SessionCommand};
use oneword_core::error::DomainError;
use oneword_core::event::OutboundMessage;
use oneword_core::identity::IdentityStore;
use oneword_core::model::{Session, VoteOutcome, VoteType};
use oneword_core::service::{self, SessionService};
use oneword_core::transport::PushTransport;
use oneword_session::application::membership::{MembershipManager, NamePrompt};
use oneword_session::application::store::{ApplyOutcome, FetchTicket, SessionStore};
use oneword_session::application::turn_coordinator::{TickResult, TimerTick, TurnCoordinator};
use oneword_session::domain::views;
use oneword_voting::application::vote_coordinator::{VoteCoordinator, VotePhase};
use oneword_voting::domain::resolution::{BallotLine, VoteTally};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::dispatcher::{Effect, EventDispatcher};

/// Everything a caller needs to render the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientView {
    /// Newest authoritative snapshot.
    pub session: Option<Session>,
    /// Seconds left on the current turn.
    pub countdown: Option<u32>,
    /// Per-turn limit; 0 when untimed.
    pub countdown_max: u32,
    /// Status line.
    pub banner: Option<String>,
    /// Local display name, confirmed or remembered.
    pub local_name: Option<String>,
    /// Whether the local name is a confirmed author of the session.
    pub confirmed: bool,
    /// Whether the local author holds the turn.
    pub is_local_turn: bool,
    /// Whether the local author created the session.
    pub is_creator: bool,
    /// Push channel state.
    pub connection: ConnectionState,
    /// Where the open vote stands for this client.
    pub vote_phase: VotePhase,
    /// Ballot counts while a vote is open.
    pub tally: Option<VoteTally>,
    /// Per-author ballots while a vote is open.
    pub ballots: Vec<BallotLine>,
}

/// A timestamped message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// When the engine received it.
    pub at: DateTime<Utc>,
    /// Display text.
    pub text: String,
}

/// Discrete things the caller should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Something happened in the session.
    Notification(Notification),
    /// Ask the user for a display name.
    NamePrompt(NamePrompt),
    /// The story is finished.
    SessionCompleted {
        /// The finished session.
        session_id: Uuid,
    },
    /// The session no longer exists; return to a safe entry point.
    SessionNotFound {
        /// The missing session.
        session_id: Uuid,
    },
    /// The push channel changed state.
    Connection(ConnectionState),
    /// Reconnection gave up; only `connect` will try again.
    UnableToConnect {
        /// Attempts made.
        attempts: u32,
    },
    /// This client decided a vote and asked the service to conclude it.
    VoteDecided {
        /// The decided outcome.
        outcome: VoteOutcome,
        /// Announcement text.
        message: String,
    },
    /// A command the engine issued on its own behalf failed.
    CommandFailed {
        /// Which command.
        command_type: &'static str,
        /// Why.
        error: DomainError,
    },
}

/// Collaborators the engine is built from.
pub struct ClientDeps {
    /// Authoritative session service.
    pub service: Arc<dyn SessionService>,
    /// Push channel transport.
    pub transport: Arc<dyn PushTransport>,
    /// Durable participant identity.
    pub identity: Arc<dyn IdentityStore>,
    /// Timestamps for notifications.
    pub clock: Arc<dyn Clock>,
}

type Reply = oneshot::Sender<Result<(), DomainError>>;

#[derive(Debug)]
enum Request {
    Connect,
    Open(Uuid),
    Refresh,
    Join { name: String, reply: Reply },
    Leave { reply: Reply },
    Begin { reply: Reply },
    AddWord { word: String, reply: Reply },
    ProposeVote { vote_type: VoteType, reply: Reply },
    CastVote { decision: bool, reply: Reply },
}

#[derive(Debug)]
enum EngineInput {
    Request(Request),
    Fetched {
        ticket: FetchTicket,
        result: Result<Session, DomainError>,
    },
    Completed {
        command: SessionCommand,
        result: Result<Session, DomainError>,
        reply: Option<Reply>,
    },
    BannerExpired {
        token: u64,
    },
    Shutdown,
}

fn engine_stopped() -> DomainError {
    DomainError::Infrastructure("session client has stopped".into())
}

fn send_reply(reply: Reply, outcome: Result<(), DomainError>) {
    if reply.send(outcome).is_err() {
        debug!("caller stopped waiting for the reply");
    }
}

/// Handle to a running session engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionClient {
    inbox: mpsc::UnboundedSender<EngineInput>,
    view: watch::Receiver<ClientView>,
}

impl SessionClient {
    /// Starts the engine task. Must be called from within a tokio runtime.
    ///
    /// The engine stops on [`SessionClient::shutdown`] or once every handle
    /// has been dropped.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the stored identity cannot
    /// be read.
    pub fn spawn(
        deps: ClientDeps,
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), DomainError> {
        let membership = MembershipManager::new(Arc::clone(&deps.identity))?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ClientView::default());

        let connection = ConnectionManager::new(deps.transport, config.reconnect);
        connection.on_message(signal_tx);

        let engine = Engine {
            service: deps.service,
            clock: deps.clock,
            connection,
            store: SessionStore::new(),
            turns: TurnCoordinator::new(tick_tx),
            votes: VoteCoordinator::new(),
            membership,
            dispatcher: EventDispatcher::new(config.dedup_window),
            banner: None,
            banner_token: 0,
            banner_duration: config.outcome_banner_duration,
            inbox: inbox_tx.downgrade(),
            events: event_tx,
            view: view_tx,
        };
        tokio::spawn(engine.run(inbox_rx, signal_rx, tick_rx));

        Ok((
            Self {
                inbox: inbox_tx,
                view: view_rx,
            },
            event_rx,
        ))
    }

    fn post(&self, request: Request) {
        if self.inbox.send(EngineInput::Request(request)).is_err() {
            warn!("session client has stopped; request dropped");
        }
    }

    async fn call(&self, build: impl FnOnce(Reply) -> Request) -> Result<(), DomainError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(EngineInput::Request(build(reply)))
            .map_err(|_| engine_stopped())?;
        response.await.map_err(|_| engine_stopped())?
    }

    /// Opens the push channel, or restarts reconnection after it gave up.
    pub fn connect(&self) {
        self.post(Request::Connect);
    }

    /// Switches to `session_id` and fetches it.
    pub fn open(&self, session_id: Uuid) {
        self.post(Request::Open(session_id));
    }

    /// Fetches the current session again.
    pub fn refresh(&self) {
        self.post(Request::Refresh);
    }

    /// Joins the open session as `name`.
    ///
    /// # Errors
    ///
    /// Local validation, name clash and missing identity are reported
    /// without contacting the service; otherwise the service's answer.
    pub async fn join(&self, name: &str) -> Result<(), DomainError> {
        let name = name.to_owned();
        self.call(|reply| Request::Join { name, reply }).await
    }

    /// Leaves the open session. Always exits locally, even if the service
    /// could not be told.
    ///
    /// # Errors
    ///
    /// Only if the engine has stopped.
    pub async fn leave(&self) -> Result<(), DomainError> {
        self.call(|reply| Request::Leave { reply }).await
    }

    /// Starts the story.
    ///
    /// # Errors
    ///
    /// `NotCreator`, `InvalidState` or `NotEnoughAuthors` locally;
    /// otherwise the service's answer.
    pub async fn begin(&self) -> Result<(), DomainError> {
        self.call(|reply| Request::Begin { reply }).await
    }

    /// Appends a word on the local author's turn. Never retried.
    ///
    /// # Errors
    ///
    /// Word validation and turn checks locally; otherwise the service's
    /// answer.
    pub async fn add_word(&self, word: &str) -> Result<(), DomainError> {
        let word = word.to_owned();
        self.call(|reply| Request::AddWord { word, reply }).await
    }

    /// Proposes a vote.
    ///
    /// # Errors
    ///
    /// `ConsecutiveProposalNotAllowed`, `VoteAlreadyActive` and state checks
    /// locally; otherwise the service's answer.
    pub async fn propose_vote(&self, vote_type: VoteType) -> Result<(), DomainError> {
        self.call(|reply| Request::ProposeVote { vote_type, reply })
            .await
    }

    /// Casts the local author's ballot.
    ///
    /// # Errors
    ///
    /// `NoActiveVote` or `AlreadyVoted` locally; otherwise the service's
    /// answer.
    pub async fn cast_vote(&self, decision: bool) -> Result<(), DomainError> {
        self.call(|reply| Request::CastVote { decision, reply }).await
    }

    /// The latest published view.
    #[must_use]
    pub fn view(&self) -> ClientView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified whenever the view changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// Stops the engine and closes the push channel.
    pub fn shutdown(&self) {
        if self.inbox.send(EngineInput::Shutdown).is_err() {
            debug!("session client already stopped");
        }
    }
}

struct Engine {
    service: Arc<dyn SessionService>,
    clock: Arc<dyn Clock>,
    connection: ConnectionManager,
    store: SessionStore,
    turns: TurnCoordinator,
    votes: VoteCoordinator,
    membership: MembershipManager,
    dispatcher: EventDispatcher,
    banner: Option<String>,
    banner_token: u64,
    banner_duration: Duration,
    inbox: mpsc::WeakUnboundedSender<EngineInput>,
    events: mpsc::UnboundedSender<ClientEvent>,
    view: watch::Sender<ClientView>,
}

impl Engine {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<EngineInput>,
        mut signals: mpsc::UnboundedReceiver<ConnectionSignal>,
        mut ticks: mpsc::UnboundedReceiver<TimerTick>,
    ) {
        info!("session client started");
        self.publish();
        loop {
            tokio::select! {
                input = inbox.recv() => match input {
                    None | Some(EngineInput::Shutdown) => break,
                    Some(input) => self.handle_input(input),
                },
                Some(signal) = signals.recv() => self.handle_signal(signal),
                Some(tick) = ticks.recv() => self.handle_tick(tick),
            }
            self.publish();
        }
        self.connection.disconnect();
        self.turns.reset();
        info!("session client stopped");
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("client event receiver dropped");
        }
    }

    fn publish(&self) {
        let session = self.store.snapshot();
        let local = self.membership.confirmed_name();
        let view = ClientView {
            session: session.cloned(),
            countdown: self.turns.remaining(),
            countdown_max: self.turns.countdown_max(),
            banner: self.banner.clone(),
            local_name: self.membership.local_name().map(str::to_owned),
            confirmed: self.membership.is_confirmed(),
            is_local_turn: session
                .zip(local)
                .is_some_and(|(s, name)| views::is_turn_of(s, name)),
            is_creator: session.is_some_and(|s| self.membership.is_creator(s)),
            connection: self.connection.current_state(),
            vote_phase: session.map_or(VotePhase::Idle, |s| self.votes.phase(s)),
            tally: self.store.tally(),
            ballots: self.store.ballot_summary(),
        };
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn handle_input(&mut self, input: EngineInput) {
        match input {
            EngineInput::Request(request) => self.handle_request(request),
            EngineInput::Fetched { ticket, result } => self.on_fetched(ticket, result),
            EngineInput::Completed {
                command,
                result,
                reply,
            } => self.on_command_completed(command, result, reply),
            EngineInput::BannerExpired { token } => {
                if token == self.banner_token {
                    self.banner = None;
                    self.request_refresh();
                }
            }
            EngineInput::Shutdown => {}
        }
    }

    fn loaded(&self) -> Result<&Session, DomainError> {
        match (self.store.snapshot(), self.store.session_id()) {
            (Some(session), _) => Ok(session),
            (None, Some(session_id)) => Err(DomainError::Transient(format!(
                "session {session_id} has not been loaded yet"
            ))),
            (None, None) => Err(DomainError::NotJoined),
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect => self.connection.connect(),
            Request::Open(session_id) => self.open(session_id),
            Request::Refresh => self.request_refresh(),
            Request::Join { name, reply } => {
                let command = self
                    .loaded()
                    .and_then(|s| self.membership.validate_join(s, &name));
                self.issue_or_reply(command.map(SessionCommand::Join), reply);
            }
            Request::Leave { reply } => self.leave(reply),
            Request::Begin { reply } => {
                let command = self
                    .loaded()
                    .and_then(|s| self.membership.begin_command(s));
                self.issue_or_reply(command.map(SessionCommand::SetState), reply);
            }
            Request::AddWord { word, reply } => {
                let command = self.loaded().and_then(|s| {
                    TurnCoordinator::word_command(s, self.membership.confirmed_name(), &word)
                });
                self.issue_or_reply(command.map(SessionCommand::AppendWord), reply);
            }
            Request::ProposeVote { vote_type, reply } => {
                let command = self.loaded().and_then(|s| {
                    let proposer = self.membership.confirmed_name().ok_or(DomainError::NotJoined)?;
                    self.votes.propose(s, vote_type, proposer)
                });
                self.issue_or_reply(command.map(SessionCommand::ProposeVote), reply);
            }
            Request::CastVote { decision, reply } => {
                let command = self.loaded().and_then(|s| {
                    let voter = self.membership.confirmed_name().ok_or(DomainError::NotJoined)?;
                    self.votes.cast(s, decision, voter)
                });
                self.issue_or_reply(command.map(SessionCommand::CastVote), reply);
            }
        }
    }

    fn issue_or_reply(&self, command: Result<SessionCommand, DomainError>, reply: Reply) {
        match command {
            Ok(command) => self.spawn_command(command, Some(reply)),
            Err(err) => {
                debug!(error = %err, "request rejected locally");
                send_reply(reply, Err(err));
            }
        }
    }

    #[instrument(skip(self))]
    fn open(&mut self, session_id: Uuid) {
        if self.store.session_id() != Some(session_id) {
            self.turns.reset();
            self.votes = VoteCoordinator::new();
            self.banner = None;
        }
        self.store.track(session_id);
        self.dispatcher.set_session(Some(session_id));
        self.request_refresh();
    }

    fn leave(&mut self, reply: Reply) {
        let completed = self.store.snapshot().is_some_and(Session::is_completed);
        let command = self
            .store
            .session_id()
            .filter(|_| !completed)
            .and_then(|id| self.membership.leave_command(id));
        match command {
            Some(command) => self.spawn_command(SessionCommand::Leave(command), Some(reply)),
            None => {
                if completed {
                    debug!("session is completed; leaving without telling the service");
                }
                self.exit_session();
                send_reply(reply, Ok(()));
            }
        }
    }

    fn exit_session(&mut self) {
        if let Err(err) = self.membership.complete_leave() {
            warn!(error = %err, "failed to persist leave");
        }
        self.store.clear();
        self.dispatcher.set_session(None);
        self.turns.reset();
        self.votes = VoteCoordinator::new();
        self.banner = None;
    }

    fn request_refresh(&mut self) {
        if let Some(ticket) = self.store.begin_refresh() {
            self.spawn_fetch(ticket);
        }
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let Some(inbox) = self.inbox.upgrade() else {
            return;
        };
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let result = service.fetch_session(ticket.session_id).await;
            if inbox.send(EngineInput::Fetched { ticket, result }).is_err() {
                debug!(session_id = %ticket.session_id, "engine stopped before fetch returned");
            }
        });
    }

    fn spawn_command(&self, command: SessionCommand, reply: Option<Reply>) {
        let Some(inbox) = self.inbox.upgrade() else {
            return;
        };
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let result = service::execute(service.as_ref(), &command).await;
            let completed = EngineInput::Completed {
                command,
                result,
                reply,
            };
            if inbox.send(completed).is_err() {
                debug!("engine stopped before command returned");
            }
        });
    }

    fn on_fetched(&mut self, ticket: FetchTicket, result: Result<Session, DomainError>) {
        let session_id = ticket.session_id;
        if self.store.session_id() != Some(session_id) {
            debug!(%session_id, "ignoring fetch for a session no longer open");
            return;
        }
        if let Some(again) = self.store.finish_refresh(ticket) {
            self.spawn_fetch(again);
        }
        match result {
            Ok(session) => self.apply_snapshot(session),
            Err(DomainError::SessionNotFound(id)) => self.on_session_gone(id),
            Err(err) => warn!(%session_id, error = %err, "refresh failed"),
        }
    }

    fn on_command_completed(
        &mut self,
        command: SessionCommand,
        result: Result<Session, DomainError>,
        reply: Option<Reply>,
    ) {
        if let SessionCommand::Leave(_) = &command {
            if let Err(err) = &result {
                warn!(error = %err, "leave failed; exiting locally anyway");
            }
            self.exit_session();
            if let Some(reply) = reply {
                send_reply(reply, Ok(()));
            }
            return;
        }

        let outcome = match result {
            Ok(session) => {
                if let SessionCommand::Join(join) = &command
                    && let Err(err) = self.membership.confirm_join(join)
                {
                    warn!(error = %err, "failed to persist join");
                }
                self.apply_snapshot(session);
                Ok(())
            }
            Err(err) => {
                if let SessionCommand::ConcludeVote(_) = &command {
                    self.votes.conclusion_failed();
                }
                if let DomainError::SessionNotFound(id) = err {
                    self.on_session_gone(id);
                }
                Err(err)
            }
        };

        match (reply, outcome) {
            (Some(reply), outcome) => send_reply(reply, outcome),
            (None, Err(error)) => self.emit(ClientEvent::CommandFailed {
                command_type: command.command_type(),
                error,
            }),
            (None, Ok(())) => {}
        }
    }

    fn on_session_gone(&mut self, session_id: Uuid) {
        if self.store.session_id() != Some(session_id) {
            return;
        }
        warn!(%session_id, "session no longer exists");
        self.exit_session();
        self.emit(ClientEvent::SessionNotFound { session_id });
    }

    fn apply_snapshot(&mut self, session: Session) {
        let ApplyOutcome::Applied { previous } = self.store.apply(session) else {
            return;
        };
        let Some(next) = self.store.snapshot().cloned() else {
            return;
        };
        debug!(session_id = %next.id, version = next.version, "snapshot applied");

        match views::status_banner(previous.as_ref(), &next) {
            Some(banner) => self.show_banner(banner),
            None if self.banner.as_deref() == Some(views::WAITING_BANNER) => self.banner = None,
            None => {}
        }
        let directive = self.turns.on_snapshot(previous.as_ref(), &next);
        debug!(?directive, generation = self.turns.generation(), "countdown evaluated");
        if let Some(prompt) = self.membership.reconcile(&next) {
            self.emit(ClientEvent::NamePrompt(prompt));
        }
        if let Some(conclusion) = self.votes.observe(&next) {
            self.announce_outcome(next.id, &conclusion.message);
            self.emit(ClientEvent::VoteDecided {
                outcome: conclusion.outcome,
                message: conclusion.message,
            });
            self.spawn_command(SessionCommand::ConcludeVote(conclusion.command), None);
        }

        let newly_completed =
            next.is_completed() && !previous.as_ref().is_some_and(Session::is_completed);
        if newly_completed {
            info!(session_id = %next.id, words = next.words.len(), "story completed");
            if let Err(err) = self.membership.forget_session() {
                warn!(error = %err, "failed to forget completed session");
            }
            self.emit(ClientEvent::SessionCompleted {
                session_id: next.id,
            });
        }
    }

    fn announce_outcome(&mut self, session_id: Uuid, message: &str) {
        let broadcast = OutboundMessage::VoteOutcome {
            session_id,
            message: message.to_owned(),
        };
        if let Err(err) = self.connection.send(broadcast) {
            warn!(error = %err, "could not broadcast vote outcome");
        }
        self.show_transient(message.to_owned());
    }

    fn show_banner(&mut self, banner: String) {
        self.banner = Some(banner);
        self.banner_token += 1;
    }

    fn show_transient(&mut self, banner: String) {
        self.show_banner(banner);
        let Some(inbox) = self.inbox.upgrade() else {
            return;
        };
        let token = self.banner_token;
        let duration = self.banner_duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if inbox.send(EngineInput::BannerExpired { token }).is_err() {
                debug!("engine stopped before banner expired");
            }
        });
    }

    fn handle_signal(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::StateChanged(state) => self.emit(ClientEvent::Connection(state)),
            ConnectionSignal::Push(envelope) => {
                let Some(dispatch) = self.dispatcher.dispatch(&envelope) else {
                    return;
                };
                if let Some(text) = dispatch.notification {
                    self.emit(ClientEvent::Notification(Notification {
                        at: self.clock.now(),
                        text,
                    }));
                }
                match dispatch.effect {
                    Some(Effect::IdentityIssued(id)) => {
                        if let Err(err) = self.membership.reissue_identity(id) {
                            warn!(error = %err, "failed to persist participant id");
                        }
                    }
                    Some(Effect::TransientBanner(message)) => self.show_transient(message),
                    None => {}
                }
                if dispatch.refresh {
                    self.request_refresh();
                }
            }
            ConnectionSignal::Lost => {
                if let Err(err) = self.membership.invalidate_identity() {
                    warn!(error = %err, "failed to clear participant id");
                }
            }
            ConnectionSignal::UnableToConnect { attempts } => {
                self.emit(ClientEvent::UnableToConnect { attempts });
            }
        }
    }

    fn handle_tick(&mut self, tick: TimerTick) {
        if self.turns.on_tick(tick) != TickResult::Expired {
            return;
        }
        let skip = self
            .store
            .snapshot()
            .and_then(|s| TurnCoordinator::skip_command(s, self.membership.confirmed_name()));
        if let Some(skip) = skip {
            info!(author = %skip.author_name, "turn expired; skipping");
            self.spawn_command(SessionCommand::SkipTurn(skip), None);
        }
    }
}
