use serde::{Deserialize, Serialize};

use crate::definition::{require, Definition, DefinitionError};
use crate::slug::{hyphens_to_spaces, slug};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub title: String,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub takeaway: String,
}

impl Definition for Hint {
    const KIND: &'static str = "hint";

    fn identity(&self) -> &str {
        &self.title
    }

    fn key_for(identity: &str) -> String {
        slug(identity)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        require("title", &self.title)?;
        if self.tag.is_empty() {
            return Err(DefinitionError::MissingField("tag"));
        }
        require("content", &self.content)?;
        require("takeaway", &self.takeaway)
    }

    /// Titles may arrive in slug form, so hyphens are read as spaces.
    fn ensure_same_identity(&self, updated: &Self) -> Result<(), DefinitionError> {
        if hyphens_to_spaces(&self.title) != hyphens_to_spaces(&updated.title) {
            return Err(DefinitionError::IdentityChanged(format!(
                "title '{}' cannot be different",
                self.title
            )));
        }
        Ok(())
    }
}
