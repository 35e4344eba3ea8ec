pub mod api;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod shutdown;

pub use config::ServerConfig;
pub use error::{OrchestratorError, ProtocolError};
pub use orchestrator::{Orchestrator, SessionEvent};
pub use registry::{Registry, RegistryKind};
pub use router::BroadcastRouter;
pub use server::{build_router, start, AppState, ServerHandle};
pub use session::{Session, SessionKeys};
