//! Shared contract for definitions managed through the REST API.

/// Rejected definition payload.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("'{0}' is required")]
    MissingField(&'static str),
    #[error("{0}")]
    IdentityChanged(String),
}

/// A user-managed definition (game, hint, security incident).
pub trait Definition {
    /// Human readable kind, used in not-found messages.
    const KIND: &'static str;

    /// The identity field (game name, title).
    fn identity(&self) -> &str;

    /// Storage key for a given identity.
    fn key_for(identity: &str) -> String;

    fn key(&self) -> String {
        Self::key_for(self.identity())
    }

    fn validate(&self) -> Result<(), DefinitionError>;

    /// Updates may not change the identity field.
    fn ensure_same_identity(&self, updated: &Self) -> Result<(), DefinitionError>;
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), DefinitionError> {
    if value.trim().is_empty() {
        return Err(DefinitionError::MissingField(field));
    }
    Ok(())
}
