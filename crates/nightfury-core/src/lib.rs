pub mod client;
pub mod definition;
pub mod errors;
pub mod game;
pub mod hint;
pub mod ids;
pub mod incident;
pub mod message;
pub mod slug;
pub mod status;

pub use client::Client;
pub use definition::{Definition, DefinitionError};
pub use errors::TransitionError;
pub use game::Game;
pub use hint::Hint;
pub use ids::SessionId;
pub use incident::SecurityIncident;
pub use message::{Action, Message};
pub use status::{GameStatus, Status};
