//! Session orchestrator: turns connection lifecycle events into client state
//! transitions, persists them, and routes the resulting messages.
//!
//! Events are queued per client id. Each partition has one worker draining it
//! in order, so the fetch/mutate/save cycle for a client never interleaves with
//! another event for the same client, while different clients run in parallel.
//! Store work runs on the blocking pool, so a stalled store call only holds up
//! its own partition. A worker retires once its client has no live sessions
//! and nothing is queued.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use nightfury_core::{Action, Client, Game, Message};
use nightfury_store::{ClientRepo, GameRepo, StoreError};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, ProtocolError};
use crate::registry::Registry;
use crate::router::BroadcastRouter;
use crate::session::{client_id, game_name, Session, CLIENT_ID_KEY, GAME_NAME_KEY};

/// Message events a partition buffers before new ones are dropped.
pub const DEFAULT_MESSAGE_QUEUE: usize = 1024;

/// A lifecycle event raised by one of the registries.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    ClientConnected(Arc<Session>),
    ClientDisconnected(Arc<Session>),
    ClientMessage(Arc<Session>, String),
    GameConnected(Arc<Session>),
    GameDisconnected(Arc<Session>),
    GameMessage(Arc<Session>, String),
}

impl SessionEvent {
    pub fn session(&self) -> &Arc<Session> {
        match self {
            Self::ClientConnected(s)
            | Self::ClientDisconnected(s)
            | Self::ClientMessage(s, _)
            | Self::GameConnected(s)
            | Self::GameDisconnected(s)
            | Self::GameMessage(s, _) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientConnected(_) => "client_connected",
            Self::ClientDisconnected(_) => "client_disconnected",
            Self::ClientMessage(..) => "client_message",
            Self::GameConnected(_) => "game_connected",
            Self::GameDisconnected(_) => "game_disconnected",
            Self::GameMessage(..) => "game_message",
        }
    }

    /// Frames from a peer, as opposed to connection lifecycle.
    pub fn is_message(&self) -> bool {
        matches!(self, Self::ClientMessage(..) | Self::GameMessage(..))
    }

    /// Change in live sessions this event brings to its partition.
    fn live_delta(&self) -> isize {
        match self {
            Self::ClientConnected(_) | Self::GameConnected(_) => 1,
            Self::ClientDisconnected(_) | Self::GameDisconnected(_) => -1,
            Self::ClientMessage(..) | Self::GameMessage(..) => 0,
        }
    }
}

struct Partition {
    tx: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
    /// Message events queued and not yet taken by the worker.
    pending: Arc<AtomicUsize>,
}

pub struct Orchestrator {
    clients: ClientRepo,
    games: GameRepo,
    router: BroadcastRouter,
    partitions: DashMap<String, Partition>,
    next_generation: AtomicU64,
    message_queue: usize,
    accepting: RwLock<bool>,
    workers: TaskTracker,
}

impl Orchestrator {
    pub fn new(clients: ClientRepo, games: GameRepo, router: BroadcastRouter) -> Self {
        Self {
            clients,
            games,
            router,
            partitions: DashMap::new(),
            next_generation: AtomicU64::new(0),
            message_queue: DEFAULT_MESSAGE_QUEUE,
            accepting: RwLock::new(true),
            workers: TaskTracker::new(),
        }
    }

    /// Cap on message events buffered per partition. Lifecycle events are
    /// never dropped.
    pub fn with_message_queue(mut self, capacity: usize) -> Self {
        self.message_queue = capacity.max(1);
        self
    }

    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Install lifecycle hooks on both registries. Hooks hold a weak handle so
    /// the registries never keep the orchestrator alive.
    pub fn bind(self: &Arc<Self>, clients: &Registry, games: &Registry) {
        let weak = Arc::downgrade(self);
        clients.on_connect(hook(&weak, |s| SessionEvent::ClientConnected(Arc::clone(s))));
        clients.on_disconnect(hook(&weak, |s| {
            SessionEvent::ClientDisconnected(Arc::clone(s))
        }));
        let w = weak.clone();
        clients.on_message(move |s, text| {
            if let Some(this) = w.upgrade() {
                this.dispatch(SessionEvent::ClientMessage(Arc::clone(s), text.to_string()));
            }
        });

        games.on_connect(hook(&weak, |s| SessionEvent::GameConnected(Arc::clone(s))));
        games.on_disconnect(hook(&weak, |s| SessionEvent::GameDisconnected(Arc::clone(s))));
        games.on_message(move |s, text| {
            if let Some(this) = weak.upgrade() {
                this.dispatch(SessionEvent::GameMessage(Arc::clone(s), text.to_string()));
            }
        });
    }

    /// Queue an event on its client's partition, spawning the partition worker
    /// on first use. Returns whether the event was accepted: events arriving
    /// after `drain`, and messages beyond a full partition, are dropped.
    pub fn dispatch(self: &Arc<Self>, event: SessionEvent) -> bool {
        let accepting = self.accepting.read();
        if !*accepting {
            debug!(event = event.kind(), "Orchestrator stopped, dropping event");
            return false;
        }

        let Some(id) = client_id(event.session()).map(str::to_owned) else {
            drop(accepting);
            self.handle(event);
            return true;
        };

        // Send while holding the entry so a retiring worker cannot miss it.
        let partition = self
            .partitions
            .entry(id.clone())
            .or_insert_with(|| self.spawn_partition(&id));

        let is_message = event.is_message();
        if is_message {
            let queued = partition.pending.fetch_add(1, Ordering::AcqRel);
            if queued >= self.message_queue {
                partition.pending.fetch_sub(1, Ordering::AcqRel);
                warn!(
                    client_id = %id,
                    event = event.kind(),
                    queued,
                    "Partition queue full, dropping message"
                );
                return false;
            }
        }

        if let Err(mpsc::error::SendError(event)) = partition.tx.send(event) {
            if is_message {
                partition.pending.fetch_sub(1, Ordering::AcqRel);
            }
            warn!(client_id = %id, event = event.kind(), "Partition closed, dropping event");
            return false;
        }
        true
    }

    fn spawn_partition(self: &Arc<Self>, id: &str) -> Partition {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::new(AtomicUsize::new(0));
        let queued = Arc::clone(&pending);
        let this = Arc::clone(self);
        let id = id.to_string();
        debug!(client_id = %id, generation, "Starting partition worker");
        self.workers.spawn(async move {
            let mut live: isize = 0;
            while let Some(event) = rx.recv().await {
                if event.is_message() {
                    queued.fetch_sub(1, Ordering::AcqRel);
                }
                live = (live + event.live_delta()).max(0);

                let worker = Arc::clone(&this);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.handle(event)).await {
                    error!(client_id = %id, error = %e, "Event handler panicked");
                }

                if live == 0 && this.retire_partition(&id, generation, &rx) {
                    break;
                }
            }
            debug!(client_id = %id, generation, "Partition worker finished");
        });
        Partition {
            tx,
            generation,
            pending,
        }
    }

    /// Drop this worker's partition entry if nothing is queued behind it.
    fn retire_partition(
        &self,
        id: &str,
        generation: u64,
        rx: &mpsc::UnboundedReceiver<SessionEvent>,
    ) -> bool {
        self.partitions
            .remove_if(id, |_, p| p.generation == generation && rx.is_empty())
            .is_some()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Process one event to completion. Failures are logged, never returned.
    pub fn handle(&self, event: SessionEvent) {
        let kind = event.kind();
        let result = match &event {
            SessionEvent::ClientConnected(s) => self.client_connected(s),
            SessionEvent::ClientDisconnected(s) => self.client_disconnected(s),
            SessionEvent::ClientMessage(s, text) => self.client_message(s, text),
            SessionEvent::GameConnected(s) => self.game_connected(s),
            SessionEvent::GameDisconnected(s) => self.game_disconnected(s),
            SessionEvent::GameMessage(s, text) => self.game_message(s, text),
        };

        if let Err(e) = result {
            let session = event.session();
            let client = client_id(session).unwrap_or_default();
            let game = game_name(session).unwrap_or_default();
            let error_kind = e.error_kind();
            if e.is_server_fault() {
                error!(event = kind, client_id = client, game, error_kind, error = %e, "Event failed");
            } else {
                warn!(event = kind, client_id = client, game, error_kind, error = %e, "Event rejected");
            }
        }
    }

    fn client_connected(&self, session: &Session) -> Result<(), OrchestratorError> {
        let id = require_client_id(session)?;
        let mut client = self.client_or_default(id)?;
        client.connected();
        self.clients.save(&client)?;
        info!(client_id = %id, "Client connected");
        Ok(())
    }

    fn client_disconnected(&self, session: &Session) -> Result<(), OrchestratorError> {
        let id = require_client_id(session)?;
        let mut client = self.client_or_default(id)?;
        client.disconnected();
        self.clients.save(&client)?;
        info!(client_id = %id, "Client disconnected");
        Ok(())
    }

    fn client_message(&self, session: &Session, text: &str) -> Result<(), OrchestratorError> {
        let id = require_client_id(session)?;
        let message = Message::decode(text).map_err(ProtocolError::from)?;

        match message.known_action() {
            Some(Action::Start) => {
                let mut client = self.existing_client(id)?;
                let first = client.start()?;
                self.clients.save(&client)?;
                let game = self.resolve_game(&first.name)?;
                info!(client_id = %id, game = %game.name, "Client started");
                self.send_to_game(&client, &game)
            }
            Some(Action::Reset) => {
                let mut client = self.existing_client(id)?;
                client.reset();
                self.clients.save(&client)?;
                info!(client_id = %id, "Client reset");
                Ok(())
            }
            _ => Err(ProtocolError::UnknownAction(message.action).into()),
        }
    }

    fn game_connected(&self, session: &Session) -> Result<(), OrchestratorError> {
        let (id, name) = match require_game_keys(session) {
            Ok(keys) => keys,
            Err(e) => {
                self.router.games().close(session);
                return Err(e);
            }
        };

        let client = match self.clients.find(id)? {
            Some(client) if client.available => client,
            found => {
                info!(
                    client_id = %id,
                    game = %name,
                    known = found.is_some(),
                    "Client not available, closing game session"
                );
                self.router.games().close(session);
                return Ok(());
            }
        };

        let mut client = client;
        let game = self.resolve_game(name)?;
        client.add(&game);
        self.clients.save(&client)?;
        info!(client_id = %id, game = %game.name, "Game attached");
        Ok(())
    }

    fn game_disconnected(&self, session: &Session) -> Result<(), OrchestratorError> {
        let (id, name) = require_game_keys(session)?;
        let mut client = self.existing_client(id)?;
        let game = self.resolve_game(name)?;
        // The definition may have changed since connect; detach whatever key
        // the game was attached under.
        let Some(attached) = client
            .attached_name(&game.name)
            .or_else(|| client.attached_name(name))
            .map(Game::named)
        else {
            debug!(client_id = %id, game = %name, "Game was not attached");
            return Ok(());
        };
        client.remove(&attached);
        self.clients.save(&client)?;
        info!(client_id = %id, game = %attached.name, "Game detached");
        Ok(())
    }

    fn game_message(&self, session: &Session, text: &str) -> Result<(), OrchestratorError> {
        let (id, name) = require_game_keys(session)?;
        let message = Message::decode(text).map_err(ProtocolError::from)?;
        let mut client = self.existing_client(id)?;
        let game = self.resolve_game(name)?;

        match message.known_action() {
            Some(Action::Started) => {
                info!(client_id = %id, game = %game.name, "Game started");
                self.send_to_client(&client, Action::Started, &game)
            }
            Some(Action::Completed) => {
                client.complete_game(&game)?;
                self.clients.save(&client)?;
                info!(client_id = %id, game = %game.name, "Game completed");
                self.send_to_client(&client, Action::Completed, &game)?;

                if client.has_next() {
                    let next = client.next()?;
                    self.clients.save(&client)?;
                    let next = self.resolve_game(&next.name)?;
                    info!(client_id = %id, game = %next.name, "Next game started");
                    self.send_to_client(&client, Action::Started, &next)?;
                    self.send_to_game(&client, &next)?;
                }
                Ok(())
            }
            Some(Action::Failed) => {
                client.fail_game(&game)?;
                self.clients.save(&client)?;
                info!(client_id = %id, game = %game.name, "Game failed");
                self.send_to_client(&client, Action::Failed, &game)
            }
            _ => Err(ProtocolError::UnknownAction(message.action).into()),
        }
    }

    fn client_or_default(&self, id: &str) -> Result<Client, StoreError> {
        Ok(self
            .clients
            .find(id)?
            .unwrap_or_else(|| Client::new(id, false)))
    }

    fn existing_client(&self, id: &str) -> Result<Client, OrchestratorError> {
        self.clients
            .find(id)?
            .ok_or_else(|| OrchestratorError::ClientNotFound(id.to_string()))
    }

    /// Stored definition for `name`, or a bare game carrying only the name.
    fn resolve_game(&self, name: &str) -> Result<Game, StoreError> {
        Ok(self.games.find(name)?.unwrap_or_else(|| Game::named(name)))
    }

    fn send_to_client(
        &self,
        client: &Client,
        action: Action,
        game: &Game,
    ) -> Result<(), OrchestratorError> {
        let message = Message::with_game(action, game).map_err(OrchestratorError::Encode)?;
        self.router.broadcast_to_client(client, &message);
        Ok(())
    }

    fn send_to_game(&self, client: &Client, game: &Game) -> Result<(), OrchestratorError> {
        let message = Message::with_game(Action::Start, game).map_err(OrchestratorError::Encode)?;
        self.router.broadcast_to_game(client, game, &message);
        Ok(())
    }

    /// Stop accepting events, close every partition queue and wait for the
    /// workers to finish what was already queued.
    pub async fn drain(&self) {
        {
            let mut accepting = self.accepting.write();
            *accepting = false;
            self.partitions.clear();
        }
        self.workers.close();
        self.workers.wait().await;
        debug!("Orchestrator drained");
    }

    /// Delete every persisted client record.
    pub fn purge_clients(&self) -> Result<usize, StoreError> {
        let purged = self.clients.purge()?;
        info!(purged, "Purged client records");
        Ok(purged)
    }

    /// `drain` followed by `purge_clients`.
    pub async fn shutdown(&self) -> Result<usize, StoreError> {
        self.drain().await;
        self.purge_clients()
    }
}

fn hook(
    orchestrator: &Weak<Orchestrator>,
    event: fn(&Arc<Session>) -> SessionEvent,
) -> impl Fn(&Arc<Session>) + Send + Sync + 'static {
    let orchestrator = orchestrator.clone();
    move |session| {
        if let Some(this) = orchestrator.upgrade() {
            this.dispatch(event(session));
        }
    }
}

fn require_client_id(session: &Session) -> Result<&str, ProtocolError> {
    client_id(session).ok_or(ProtocolError::MissingKey(CLIENT_ID_KEY))
}

fn require_game_keys(session: &Session) -> Result<(&str, &str), OrchestratorError> {
    let id = require_client_id(session)?;
    let name = game_name(session).ok_or(ProtocolError::MissingKey(GAME_NAME_KEY))?;
    Ok((id, name))
}
