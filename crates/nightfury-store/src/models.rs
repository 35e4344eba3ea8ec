//! Bucket placement of the domain types.

use nightfury_core::{Client, Definition, Game, Hint, SecurityIncident};

use crate::repository::Model;

impl Model for Client {
    const BUCKET: &'static str = "clients";

    fn model_id(&self) -> String {
        self.name.clone()
    }
}

impl Model for Game {
    const BUCKET: &'static str = "games";

    fn model_id(&self) -> String {
        self.key()
    }
}

impl Model for Hint {
    const BUCKET: &'static str = "hints";

    fn model_id(&self) -> String {
        self.key()
    }
}

impl Model for SecurityIncident {
    const BUCKET: &'static str = "securityIncidents";

    fn model_id(&self) -> String {
        self.key()
    }
}
