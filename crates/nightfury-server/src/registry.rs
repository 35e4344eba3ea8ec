use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use nightfury_core::SessionId;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::session::{Session, SessionKeys, TransportError};

pub type SessionHandler = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&Arc<Session>, &str) + Send + Sync>;

/// Which endpoint a registry serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryKind {
    Client,
    Game,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Game => f.write_str("game"),
        }
    }
}

#[derive(Default)]
struct Handlers {
    connect: Option<SessionHandler>,
    disconnect: Option<SessionHandler>,
    message: Option<MessageHandler>,
}

/// Set of live sessions for one endpoint, plus the lifecycle hooks fired for them.
pub struct Registry {
    kind: RegistryKind,
    sessions: DashMap<SessionId, Arc<Session>>,
    max_send_queue: usize,
    handlers: RwLock<Handlers>,
}

impl Registry {
    pub fn new(kind: RegistryKind, max_send_queue: usize) -> Self {
        Self {
            kind,
            sessions: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
            handlers: RwLock::new(Handlers::default()),
        }
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    /// Register a new session and return it with the receiving end of its send queue.
    pub fn register(&self, keys: SessionKeys) -> (Arc<Session>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let session = Arc::new(Session::new(keys, tx));
        self.sessions.insert(session.id().clone(), Arc::clone(&session));
        (session, rx)
    }

    pub fn unregister(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn on_connect(&self, handler: impl Fn(&Arc<Session>) + Send + Sync + 'static) {
        self.handlers.write().connect = Some(Arc::new(handler));
    }

    pub fn on_disconnect(&self, handler: impl Fn(&Arc<Session>) + Send + Sync + 'static) {
        self.handlers.write().disconnect = Some(Arc::new(handler));
    }

    pub fn on_message(&self, handler: impl Fn(&Arc<Session>, &str) + Send + Sync + 'static) {
        self.handlers.write().message = Some(Arc::new(handler));
    }

    pub(crate) fn fire_connect(&self, session: &Arc<Session>) {
        let handler = self.handlers.read().connect.clone();
        if let Some(handler) = handler {
            handler(session);
        }
    }

    pub(crate) fn fire_disconnect(&self, session: &Arc<Session>) {
        let handler = self.handlers.read().disconnect.clone();
        if let Some(handler) = handler {
            handler(session);
        }
    }

    pub(crate) fn fire_message(&self, session: &Arc<Session>, text: &str) {
        let handler = self.handlers.read().message.clone();
        if let Some(handler) = handler {
            handler(session, text);
        }
    }

    /// Send to every live session. Returns how many queued the frame.
    pub fn broadcast(&self, data: &str) -> usize {
        self.broadcast_filter(data, |_| true)
    }

    /// Send to every live session matching `predicate`.
    pub fn broadcast_filter(&self, data: &str, predicate: impl Fn(&Session) -> bool) -> usize {
        let targets: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_closed() && predicate(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        targets
            .iter()
            .filter(|session| self.deliver(session, data))
            .count()
    }

    /// Send to every live session except `exclude`.
    pub fn broadcast_others(&self, data: &str, exclude: &Session) -> usize {
        self.broadcast_filter(data, |session| session.id() != exclude.id())
    }

    fn deliver(&self, session: &Session, data: &str) -> bool {
        match session.write(data) {
            Ok(()) => true,
            Err(TransportError::QueueFull) => {
                tracing::warn!(
                    registry = %self.kind,
                    session_id = %session.id(),
                    msg_len = data.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(TransportError::Closed) => false,
        }
    }

    /// Close one session. Its disconnect hook fires once the socket task winds down.
    pub fn close(&self, session: &Session) {
        tracing::debug!(registry = %self.kind, session_id = %session.id(), "Closing session");
        session.close();
    }

    /// Close every live session. Returns how many were asked to close.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for entry in self.sessions.iter() {
            if !entry.value().is_closed() {
                entry.value().close();
                closed += 1;
            }
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Drive one upgraded socket: register it, pump frames both ways with a heartbeat,
/// and fire the disconnect hook exactly once when either side goes away.
pub async fn serve_socket(
    socket: WebSocket,
    registry: Arc<Registry>,
    keys: SessionKeys,
    heartbeat: Duration,
) {
    let (session, mut rx) = registry.register(keys);
    tracing::info!(
        registry = %registry.kind(),
        session_id = %session.id(),
        keys = ?session.keys(),
        "WebSocket session connected"
    );
    registry.fire_connect(&session);

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_session = Arc::clone(&session);
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(session_id = %writer_session.id(), "Sent ping");
                }
                _ = writer_session.closed() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    let reader_session = Arc::clone(&session);
    let reader_registry = Arc::clone(&registry);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    reader_registry.fire_message(&reader_session, text.as_str());
                }
                WsMessage::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => reader_registry.fire_message(&reader_session, text),
                    Err(_) => tracing::debug!(
                        session_id = %reader_session.id(),
                        "Dropping non UTF-8 binary frame"
                    ),
                },
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    session.close();
    registry.unregister(session.id());
    tracing::info!(
        registry = %registry.kind(),
        session_id = %session.id(),
        "WebSocket session disconnected"
    );
    registry.fire_disconnect(&session);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::session::client_id;

    #[test]
    fn register_and_unregister() {
        let registry = Registry::new(RegistryKind::Client, 8);
        assert!(registry.is_empty());

        let (a, _ra) = registry.register(SessionKeys::client("a"));
        let (_b, _rb) = registry.register(SessionKeys::client("b"));
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(a.id()).is_some());
        assert!(registry.unregister(a.id()).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn broadcast_reaches_all() {
        let registry = Registry::new(RegistryKind::Client, 8);
        let (_a, mut ra) = registry.register(SessionKeys::client("a"));
        let (_b, mut rb) = registry.register(SessionKeys::client("b"));

        assert_eq!(registry.broadcast("hi"), 2);
        assert_eq!(ra.try_recv().unwrap(), "hi");
        assert_eq!(rb.try_recv().unwrap(), "hi");
    }

    #[test]
    fn broadcast_filter_selects_by_keys() {
        let registry = Registry::new(RegistryKind::Client, 8);
        let (_a, mut ra) = registry.register(SessionKeys::client("a"));
        let (_b, mut rb) = registry.register(SessionKeys::client("b"));

        let sent = registry.broadcast_filter("x", |s| client_id(s) == Some("b"));
        assert_eq!(sent, 1);
        assert!(ra.try_recv().is_err());
        assert_eq!(rb.try_recv().unwrap(), "x");
    }

    #[test]
    fn broadcast_others_skips_sender() {
        let registry = Registry::new(RegistryKind::Game, 8);
        let (a, mut ra) = registry.register(SessionKeys::game("c", "ludo"));
        let (_b, mut rb) = registry.register(SessionKeys::game("c", "chess"));

        assert_eq!(registry.broadcast_others("x", &a), 1);
        assert!(ra.try_recv().is_err());
        assert!(rb.try_recv().is_ok());
    }

    #[test]
    fn broadcast_skips_closed_and_full() {
        let registry = Registry::new(RegistryKind::Client, 1);
        let (a, _ra) = registry.register(SessionKeys::client("a"));
        let (_b, _rb) = registry.register(SessionKeys::client("b"));
        a.close();

        assert_eq!(registry.broadcast("1"), 1);
        // b's single-slot queue is now full
        assert_eq!(registry.broadcast("2"), 0);
    }

    #[test]
    fn close_all_marks_sessions() {
        let registry = Registry::new(RegistryKind::Client, 8);
        let (a, _ra) = registry.register(SessionKeys::client("a"));
        let (b, _rb) = registry.register(SessionKeys::client("b"));
        registry.close(&a);

        assert_eq!(registry.close_all(), 1);
        assert!(a.is_closed());
        assert!(b.is_closed());
    }

    #[test]
    fn hooks_fire_when_set() {
        let registry = Registry::new(RegistryKind::Client, 8);
        let (s, _rx) = registry.register(SessionKeys::client("a"));

        // no handlers yet
        registry.fire_connect(&s);
        registry.fire_message(&s, "ignored");

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        registry.on_connect(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&count);
        registry.on_disconnect(move |_| {
            c.fetch_add(10, Ordering::SeqCst);
        });
        let c = Arc::clone(&count);
        registry.on_message(move |_, text| {
            c.fetch_add(text.len() * 100, Ordering::SeqCst);
        });

        registry.fire_connect(&s);
        registry.fire_disconnect(&s);
        registry.fire_message(&s, "ab");
        assert_eq!(count.load(Ordering::SeqCst), 211);
    }

    #[test]
    fn kind_display() {
        assert_eq!(RegistryKind::Client.to_string(), "client");
        assert_eq!(RegistryKind::Game.to_string(), "game");
    }
}
