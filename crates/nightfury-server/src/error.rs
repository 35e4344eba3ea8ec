use nightfury_core::TransitionError;
use nightfury_store::StoreError;

/// A session or frame that does not fit the wire protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("session has no '{0}' key")]
    MissingKey(&'static str),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

/// Anything that aborts handling of a single orchestrator event.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("client {0} not found")]
    ClientNotFound(String),
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}

impl OrchestratorError {
    /// Store and encoding failures are server faults; everything else is a misbehaving peer.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Encode(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Store(_) => "store",
            Self::Transition(e) => e.error_kind(),
            Self::ClientNotFound(_) => "client_not_found",
            Self::Encode(_) => "encode",
        }
    }
}
