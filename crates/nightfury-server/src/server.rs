use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use nightfury_store::{ClientRepo, GameRepo, Repository, StoreError};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::ServerConfig;
use crate::orchestrator::Orchestrator;
use crate::registry::{self, Registry, RegistryKind};
use crate::router::BroadcastRouter;
use crate::session::SessionKeys;
use crate::shutdown::ShutdownCoordinator;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Repository>,
    pub clients: Arc<Registry>,
    pub games: Arc<Registry>,
    pub orchestrator: Arc<Orchestrator>,
    pub heartbeat: Duration,
}

impl AppState {
    /// Build both registries and an orchestrator bound to them.
    pub fn new(store: Arc<dyn Repository>, config: &ServerConfig) -> Self {
        let clients = Arc::new(Registry::new(RegistryKind::Client, config.max_send_queue));
        let games = Arc::new(Registry::new(RegistryKind::Game, config.max_send_queue));
        let router = BroadcastRouter::new(Arc::clone(&clients), Arc::clone(&games));
        let orchestrator = Arc::new(
            Orchestrator::new(
                ClientRepo::new(Arc::clone(&store)),
                GameRepo::new(Arc::clone(&store)),
                router,
            )
            .with_message_queue(config.max_partition_queue),
        );
        orchestrator.bind(&clients, &games);

        Self {
            store,
            clients,
            games,
            orchestrator,
            heartbeat: config.heartbeat_interval(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/v1/clients/{id}", get(client_ws_handler))
        .route("/ws/v1/clients/{id}/games/{name}", get(game_ws_handler))
        .merge(api::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    store: Arc<dyn Repository>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(store, &config);
    let router = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "nightfury server started");

    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        port: local_addr.port(),
        state,
        coordinator,
        server,
        shutdown_timeout: config.shutdown_timeout(),
    })
}

/// Handle returned by `start()`; keeps the server task alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    state: AppState,
    coordinator: ShutdownCoordinator,
    server: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl ServerHandle {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting connections, let queued orchestrator work finish, close
    /// every live session, then delete all client records. Returns how many
    /// client records were removed.
    pub async fn shutdown(self) -> Result<usize, StoreError> {
        tracing::info!("Shutting down");
        self.coordinator
            .graceful_shutdown(vec![self.server], self.shutdown_timeout)
            .await;

        self.state.orchestrator.drain().await;

        if !self.state.clients.is_empty() || !self.state.games.is_empty() {
            let clients = self.state.clients.close_all();
            let games = self.state.games.close_all();
            tracing::info!(clients, games, "Closed live sessions");
        }

        self.state.orchestrator.purge_clients()
    }
}

async fn client_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> impl IntoResponse {
    let keys = SessionKeys::client(client_id);
    ws.on_upgrade(move |socket| registry::serve_socket(socket, state.clients, keys, state.heartbeat))
}

async fn game_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((client_id, game_name)): Path<(String, String)>,
) -> impl IntoResponse {
    let keys = SessionKeys::game(client_id, game_name);
    ws.on_upgrade(move |socket| registry::serve_socket(socket, state.games, keys, state.heartbeat))
}

#[cfg(test)]
mod tests {
    use nightfury_core::Client;
    use nightfury_store::Database;

    use super::*;

    fn store() -> Arc<dyn Repository> {
        Arc::new(Database::in_memory().unwrap())
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_ping() {
        let handle = start(local_config(), store()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/ping", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "pong");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_purges_clients() {
        let store = store();
        let repo = ClientRepo::new(Arc::clone(&store));
        repo.save(&Client::new("kiosk", true)).unwrap();

        let handle = start(local_config(), store).await.unwrap();
        assert_eq!(handle.shutdown().await.unwrap(), 1);
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn build_router_creates_routes() {
        let state = AppState::new(store(), &ServerConfig::default());
        let _router = build_router(state);
    }
}
