//! Bucket/key persistence contract and typed helpers on top of it.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Raw persistence collaborator. Values are JSON documents.
///
/// A missing entry is `Ok(None)`, never an error.
pub trait Repository: Send + Sync {
    fn save(&self, bucket: &str, key: &str, value: &str) -> Result<(), StoreError>;
    fn fetch(&self, bucket: &str, key: &str) -> Result<Option<String>, StoreError>;
    /// Returns whether an entry was removed.
    fn delete(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;
    /// All entries of a bucket, ordered by key.
    fn fetch_all(&self, bucket: &str) -> Result<Vec<(String, String)>, StoreError>;
    /// Remove every entry of a bucket; returns the number removed.
    fn delete_bucket(&self, bucket: &str) -> Result<usize, StoreError>;
}

/// A record that lives in a fixed bucket under its own id.
pub trait Model: Serialize + DeserializeOwned {
    const BUCKET: &'static str;

    fn model_id(&self) -> String;
}

/// Typed access for any [`Repository`], including `dyn Repository`.
pub trait RepositoryExt: Repository {
    fn save_model<M: Model>(&self, model: &M) -> Result<(), StoreError> {
        let value = serde_json::to_string(model)?;
        self.save(M::BUCKET, &model.model_id(), &value)
    }

    fn fetch_model<M: Model>(&self, key: &str) -> Result<Option<M>, StoreError> {
        self.fetch(M::BUCKET, key)?
            .map(|raw| decode::<M>(&raw))
            .transpose()
    }

    fn delete_model<M: Model>(&self, model: &M) -> Result<bool, StoreError> {
        self.delete(M::BUCKET, &model.model_id())
    }

    /// Decode every entry of `M::BUCKET` with `decode_fn`. Stops at the first
    /// entry that fails to decode.
    fn fetch_all_models<M, F>(&self, decode_fn: F) -> Result<BTreeMap<String, M>, StoreError>
    where
        M: Model,
        F: Fn(&str) -> Result<M, StoreError>,
    {
        self.fetch_all(M::BUCKET)?
            .into_iter()
            .map(|(key, raw)| decode_fn(&raw).map(|model| (key, model)))
            .collect()
    }
}

impl<R: Repository + ?Sized> RepositoryExt for R {}

/// Default JSON decoder; malformed documents surface as `CorruptRow`.
pub fn decode<M: DeserializeOwned>(raw: &str) -> Result<M, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table: "records",
        column: "value",
        detail: format!("invalid JSON: {e}"),
    })
}
