pub mod clients;
pub mod database;
pub mod definitions;
pub mod error;
pub mod models;
pub mod repository;
pub mod schema;

pub use clients::ClientRepo;
pub use database::Database;
pub use definitions::{DefinitionRepo, GameRepo, HintRepo, SecurityIncidentRepo};
pub use error::StoreError;
pub use repository::{Model, Repository, RepositoryExt};
