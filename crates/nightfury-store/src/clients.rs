use std::collections::BTreeMap;
use std::sync::Arc;

use nightfury_core::Client;
use tracing::instrument;

use crate::error::StoreError;
use crate::repository::{decode, Model, Repository, RepositoryExt};

/// Persistence for `Client` records.
#[derive(Clone)]
pub struct ClientRepo {
    store: Arc<dyn Repository>,
}

impl ClientRepo {
    pub fn new(store: Arc<dyn Repository>) -> Self {
        Self { store }
    }

    /// Fetch a client; `Ok(None)` when it has never been saved.
    #[instrument(skip(self))]
    pub fn find(&self, name: &str) -> Result<Option<Client>, StoreError> {
        self.store.fetch_model(name)
    }

    #[instrument(skip(self))]
    pub fn get(&self, name: &str) -> Result<Client, StoreError> {
        self.find(name)?
            .ok_or_else(|| StoreError::NotFound(format!("client with name {name} doesn't exist")))
    }

    #[instrument(skip(self, client), fields(client_id = %client.name))]
    pub fn save(&self, client: &Client) -> Result<(), StoreError> {
        self.store.save_model(client)
    }

    #[instrument(skip(self, client), fields(client_id = %client.name))]
    pub fn delete(&self, client: &Client) -> Result<bool, StoreError> {
        self.store.delete_model(client)
    }

    #[instrument(skip(self))]
    pub fn list(&self) -> Result<BTreeMap<String, Client>, StoreError> {
        self.store.fetch_all_models(decode)
    }

    /// Delete every client record. Clients do not outlive the process.
    #[instrument(skip(self))]
    pub fn purge(&self) -> Result<usize, StoreError> {
        self.store.delete_bucket(Client::BUCKET)
    }
}
