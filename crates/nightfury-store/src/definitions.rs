use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use nightfury_core::{Definition, Game, Hint, SecurityIncident};
use tracing::instrument;

use crate::error::StoreError;
use crate::repository::{decode, Model, Repository, RepositoryExt};

/// Persistence for user-managed definitions, addressed by identity.
pub struct DefinitionRepo<D> {
    store: Arc<dyn Repository>,
    _kind: PhantomData<fn() -> D>,
}

pub type GameRepo = DefinitionRepo<Game>;
pub type HintRepo = DefinitionRepo<Hint>;
pub type SecurityIncidentRepo = DefinitionRepo<SecurityIncident>;

impl<D> Clone for DefinitionRepo<D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<D: Model + Definition> DefinitionRepo<D> {
    pub fn new(store: Arc<dyn Repository>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Look up by identity (name or title); the storage key is derived from it.
    #[instrument(skip(self), fields(kind = D::KIND))]
    pub fn find(&self, identity: &str) -> Result<Option<D>, StoreError> {
        self.store.fetch_model(&D::key_for(identity))
    }

    #[instrument(skip(self), fields(kind = D::KIND))]
    pub fn get(&self, identity: &str) -> Result<D, StoreError> {
        self.find(identity)?.ok_or_else(|| {
            StoreError::NotFound(format!("{} with name {identity} doesn't exist", D::KIND))
        })
    }

    #[instrument(skip(self, definition), fields(kind = D::KIND, key = %definition.key()))]
    pub fn save(&self, definition: &D) -> Result<(), StoreError> {
        self.store.save_model(definition)
    }

    #[instrument(skip(self, definition), fields(kind = D::KIND, key = %definition.key()))]
    pub fn delete(&self, definition: &D) -> Result<bool, StoreError> {
        self.store.delete_model(definition)
    }

    #[instrument(skip(self), fields(kind = D::KIND))]
    pub fn list(&self) -> Result<BTreeMap<String, D>, StoreError> {
        self.store.fetch_all_models(decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn store() -> Arc<dyn Repository> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn game(name: &str) -> Game {
        Game {
            name: name.into(),
            instruction: "play".into(),
            kind: "board".into(),
            ..Default::default()
        }
    }

    #[test]
    fn game_lookup_by_name_uses_slug() {
        let repo = GameRepo::new(store());
        repo.save(&game("Snake and Ladder")).unwrap();

        let found = repo.get("snake and_ladder").unwrap();
        assert_eq!(found.name, "Snake and Ladder");
        assert!(repo.list().unwrap().contains_key("snake-and-ladder"));
    }

    #[test]
    fn missing_definition_is_not_found() {
        let repo = HintRepo::new(store());
        let err = repo.get("phishing").unwrap_err();
        assert_eq!(err.to_string(), "not found: hint with name phishing doesn't exist");
    }

    #[test]
    fn incident_key_preserves_case() {
        let repo = SecurityIncidentRepo::new(store());
        let incident = SecurityIncident {
            title: "Equifax Breach".into(),
            tag: "breach".into(),
            content: "c".into(),
            takeaway: "t".into(),
        };
        repo.save(&incident).unwrap();
        assert!(repo.find("Equifax-Breach").unwrap().is_some());
        assert!(repo.find("equifax-breach").unwrap().is_none());
    }

    #[test]
    fn delete_definition() {
        let repo = GameRepo::new(store());
        let g = game("ludo");
        repo.save(&g).unwrap();
        assert!(repo.delete(&g).unwrap());
        assert!(repo.find("ludo").unwrap().is_none());
    }

    #[test]
    fn repos_share_one_store_without_collisions() {
        let store = store();
        let games = GameRepo::new(Arc::clone(&store));
        let hints = HintRepo::new(store);
        games.save(&game("phishing")).unwrap();
        assert!(hints.find("phishing").unwrap().is_none());
    }
}
