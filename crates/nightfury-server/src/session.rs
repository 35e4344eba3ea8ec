//! Live connection handles and the identity keys attached at handshake.

use std::collections::BTreeMap;

use nightfury_core::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Handshake key holding the client id.
pub const CLIENT_ID_KEY: &str = "id";
/// Handshake key holding the game name (game sessions only).
pub const GAME_NAME_KEY: &str = "name";

/// Identity metadata captured from the upgrade request path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionKeys(BTreeMap<String, String>);

impl SessionKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(client_id: impl Into<String>) -> Self {
        Self::new().with(CLIENT_ID_KEY, client_id)
    }

    pub fn game(client_id: impl Into<String>, game_name: impl Into<String>) -> Self {
        Self::client(client_id).with(GAME_NAME_KEY, game_name)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Why an outbound write did not reach the session's queue.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("send queue full")]
    QueueFull,
    #[error("session closed")]
    Closed,
}

/// One open connection. Lives exactly as long as the socket.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    keys: SessionKeys,
    tx: mpsc::Sender<String>,
    close: CancellationToken,
}

impl Session {
    pub fn new(keys: SessionKeys, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: SessionId::new(),
            keys,
            tx,
            close: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Queue a text frame. Never blocks; a full queue drops the frame.
    pub fn write(&self, data: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.tx.try_send(data.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Ask the connection to close. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Resolves once `close` has been called.
    pub fn closed(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.close.cancelled()
    }
}

/// Client id attached at handshake, if any.
pub fn client_id(session: &Session) -> Option<&str> {
    session.keys.get(CLIENT_ID_KEY)
}

/// Game name attached at handshake, if any.
pub fn game_name(session: &Session) -> Option<&str> {
    session.keys.get(GAME_NAME_KEY)
}
