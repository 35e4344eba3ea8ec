use serde::{Deserialize, Serialize};

use crate::definition::{require, Definition, DefinitionError};
use crate::slug::slug;

/// A playable unit. Definitions are managed over the REST API and only read
/// by the orchestrator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Game {
    /// Placeholder used when a game connects without a stored definition.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Storage key: the slug of the name.
    pub fn id(&self) -> String {
        slug(&self.name)
    }
}

impl Definition for Game {
    const KIND: &'static str = "game";

    fn identity(&self) -> &str {
        &self.name
    }

    fn key_for(identity: &str) -> String {
        slug(identity)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        require("name", &self.name)?;
        require("instruction", &self.instruction)?;
        require("type", &self.kind)
    }

    fn ensure_same_identity(&self, updated: &Self) -> Result<(), DefinitionError> {
        if self.name != updated.name {
            return Err(DefinitionError::IdentityChanged("name cannot be different".into()));
        }
        Ok(())
    }
}
