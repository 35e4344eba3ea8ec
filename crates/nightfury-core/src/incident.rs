use serde::{Deserialize, Serialize};

use crate::definition::{require, Definition, DefinitionError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub title: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub takeaway: String,
}

impl Definition for SecurityIncident {
    const KIND: &'static str = "security incident";

    fn identity(&self) -> &str {
        &self.title
    }

    /// Spaces become hyphens; case is preserved.
    fn key_for(identity: &str) -> String {
        identity.replace(' ', "-")
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        require("title", &self.title)?;
        require("tag", &self.tag)?;
        require("content", &self.content)?;
        require("takeaway", &self.takeaway)
    }

    fn ensure_same_identity(&self, updated: &Self) -> Result<(), DefinitionError> {
        if self.title != updated.title {
            return Err(DefinitionError::IdentityChanged("title cannot be different".into()));
        }
        Ok(())
    }
}
