use std::sync::Arc;

use nightfury_core::slug::slug;
use nightfury_core::{Client, Game, Message};

use crate::registry::Registry;
use crate::session::{client_id, game_name};

/// Addresses outbound messages to the sessions of one client or one of its games.
#[derive(Clone)]
pub struct BroadcastRouter {
    clients: Arc<Registry>,
    games: Arc<Registry>,
}

impl BroadcastRouter {
    pub fn new(clients: Arc<Registry>, games: Arc<Registry>) -> Self {
        Self { clients, games }
    }

    pub fn clients(&self) -> &Arc<Registry> {
        &self.clients
    }

    pub fn games(&self) -> &Arc<Registry> {
        &self.games
    }

    /// Deliver to every client session opened for `client`.
    pub fn broadcast_to_client(&self, client: &Client, message: &Message) -> usize {
        let Some(data) = encode(message) else {
            return 0;
        };
        let sent = self
            .clients
            .broadcast_filter(&data, |s| client_id(s) == Some(client.name.as_str()));
        tracing::debug!(
            client_id = %client.name,
            action = %message.action,
            recipients = sent,
            "Broadcast to client"
        );
        sent
    }

    /// Deliver to the game sessions of `client` playing `game`. Game names are
    /// compared in slug form, the same way definitions are looked up.
    pub fn broadcast_to_game(&self, client: &Client, game: &Game, message: &Message) -> usize {
        let Some(data) = encode(message) else {
            return 0;
        };
        let target = game.id();
        let sent = self.games.broadcast_filter(&data, |s| {
            client_id(s) == Some(client.name.as_str())
                && game_name(s).is_some_and(|name| slug(name) == target)
        });
        tracing::debug!(
            client_id = %client.name,
            game = %game.name,
            action = %message.action,
            recipients = sent,
            "Broadcast to game"
        );
        sent
    }
}

fn encode(message: &Message) -> Option<String> {
    match message.encode() {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::error!(action = %message.action, error = %e, "Failed to encode message");
            None
        }
    }
}
