//! Per-client game progression state machine.
//!
//! All operations are pure: they mutate the in-memory `Client` and leave
//! persistence to the caller. A failed transition never mutates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::TransitionError;
use crate::game::Game;
use crate::slug::slug;
use crate::status::{GameStatus, Status};

/// A kiosk identity progressing through the games attached to it.
///
/// Game statuses are kept ordered by name, so the game picked by `start` and
/// `next` is always the lexicographically smallest Ready one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub game_statuses: BTreeMap<String, GameStatus>,
}

impl Client {
    pub fn new(name: impl Into<String>, available: bool) -> Self {
        Self {
            name: name.into(),
            available,
            game_statuses: BTreeMap::new(),
        }
    }

    pub fn with_games(mut self, games: impl IntoIterator<Item = GameStatus>) -> Self {
        for game in games {
            self.game_statuses.insert(game.name.clone(), game);
        }
        self
    }

    /// Aggregate status. Checks run in order; the first match wins.
    pub fn status(&self) -> Status {
        let total = self.game_statuses.len();
        let count = |status: Status| {
            self.game_statuses
                .values()
                .filter(|gs| gs.status == status)
                .count()
        };

        if count(Status::Ready) == total {
            return Status::Ready;
        }
        if count(Status::Completed) == total {
            return Status::Completed;
        }
        if count(Status::Failed) >= 1 {
            return Status::Failed;
        }
        Status::InProgress
    }

    pub fn status_of(&self, game: &str) -> Option<Status> {
        self.game_statuses.get(game).map(|gs| gs.status)
    }

    /// Start the first game. Only legal while every game is Ready.
    pub fn start(&mut self) -> Result<Game, TransitionError> {
        if self.status() != Status::Ready {
            return Err(TransitionError::AlreadyStarted);
        }
        self.start_next_game()
    }

    /// Start the following game once the active one has been resolved.
    pub fn next(&mut self) -> Result<Game, TransitionError> {
        match self.status() {
            Status::Ready => return Err(TransitionError::NotStarted),
            Status::Completed => return Err(TransitionError::Completed),
            Status::Failed => return Err(TransitionError::Failed),
            Status::InProgress => {}
        }
        if self.is_any_game_in_progress() {
            return Err(TransitionError::AlreadyInProgress);
        }
        self.start_next_game()
    }

    pub fn has_next(&self) -> bool {
        self.status() != Status::Failed && self.ready_game().is_some()
    }

    pub fn complete_game(&mut self, game: &Game) -> Result<(), TransitionError> {
        let updated = self.current(&game.name).completed()?;
        self.game_statuses.insert(game.name.clone(), updated);
        Ok(())
    }

    pub fn fail_game(&mut self, game: &Game) -> Result<(), TransitionError> {
        let updated = self.current(&game.name).failed()?;
        self.game_statuses.insert(game.name.clone(), updated);
        Ok(())
    }

    pub fn reset(&mut self) {
        for gs in self.game_statuses.values_mut() {
            gs.status = Status::Ready;
        }
    }

    /// Attach a game as Ready, replacing any recorded progress for it.
    pub fn add(&mut self, game: &Game) {
        self.game_statuses
            .insert(game.name.clone(), GameStatus::ready(game.name.clone()));
    }

    /// Detach a game together with its recorded progress.
    pub fn remove(&mut self, game: &Game) {
        self.game_statuses.remove(&game.name);
    }

    /// Key under which `name` is attached: an exact match first, then any
    /// attached game whose slug equals the slug of `name`.
    pub fn attached_name(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.game_statuses.get_key_value(name) {
            return Some(key);
        }
        let wanted = slug(name);
        self.game_statuses
            .keys()
            .find(|key| slug(key) == wanted)
            .map(String::as_str)
    }

    pub fn connected(&mut self) {
        self.available = true;
    }

    pub fn disconnected(&mut self) {
        self.available = false;
    }

    fn is_any_game_in_progress(&self) -> bool {
        self.game_statuses
            .values()
            .any(|gs| gs.status == Status::InProgress)
    }

    fn ready_game(&self) -> Option<&GameStatus> {
        self.game_statuses
            .values()
            .find(|gs| gs.status == Status::Ready)
    }

    // An unattached game reads as Ready.
    fn current(&self, name: &str) -> GameStatus {
        self.game_statuses
            .get(name)
            .cloned()
            .unwrap_or_else(|| GameStatus::ready(name))
    }

    fn start_next_game(&mut self) -> Result<Game, TransitionError> {
        let ready = self.ready_game().ok_or(TransitionError::NoReadyGame)?;
        let updated = ready.in_progress()?;
        let game = Game::named(updated.name.clone());
        self.game_statuses.insert(updated.name.clone(), updated);
        Ok(game)
    }
}
