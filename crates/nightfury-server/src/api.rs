//! REST endpoints for definitions (games, hints, security incidents) and a
//! read-only view of clients.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nightfury_core::{Client, Definition, DefinitionError, Game, Hint, SecurityIncident};
use nightfury_store::{ClientRepo, DefinitionRepo, HintRepo, Model, StoreError};

use crate::server::AppState;

/// Error surfaced to HTTP callers as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => {
                tracing::error!(error = %other, "Store failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<DefinitionError> for ApiError {
    fn from(e: DefinitionError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Anything the generic CRUD handlers can serve.
pub trait Resource: Model + Definition + Send + 'static {}

impl<T: Model + Definition + Send + 'static> Resource for T {}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/v1/clients", get(list_clients))
        .route("/api/v1/games", get(list::<Game>).post(create::<Game>))
        .route(
            "/api/v1/games/{name}",
            get(read::<Game>).put(update::<Game>).delete(remove::<Game>),
        )
        .route("/api/v1/hints", get(list::<Hint>).post(create::<Hint>))
        .route("/api/v1/hints/upload", post(upload_hints))
        .route(
            "/api/v1/hints/{title}",
            get(read::<Hint>).put(update::<Hint>).delete(remove::<Hint>),
        )
        .route(
            "/api/v1/security-incidents",
            get(list::<SecurityIncident>).post(create::<SecurityIncident>),
        )
        .route(
            "/api/v1/security-incidents/{title}",
            get(read::<SecurityIncident>)
                .put(update::<SecurityIncident>)
                .delete(remove::<SecurityIncident>),
        )
}

fn repo<D: Resource>(state: &AppState) -> DefinitionRepo<D> {
    DefinitionRepo::new(state.store.clone())
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "pong" }))
}

async fn list_clients(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Client>>, ApiError> {
    Ok(Json(ClientRepo::new(state.store.clone()).list()?))
}

async fn list<D: Resource>(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, D>>, ApiError> {
    Ok(Json(repo::<D>(&state).list()?))
}

async fn read<D: Resource>(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<D>, ApiError> {
    Ok(Json(repo::<D>(&state).get(&identity)?))
}

async fn create<D: Resource>(
    State(state): State<AppState>,
    payload: Result<Json<D>, JsonRejection>,
) -> Result<(StatusCode, Json<D>), ApiError> {
    let Json(definition) = payload?;
    definition.validate()?;
    repo::<D>(&state).save(&definition)?;
    tracing::info!(kind = D::KIND, key = %definition.key(), "Definition created");
    Ok((StatusCode::CREATED, Json(definition)))
}

async fn update<D: Resource>(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    payload: Result<Json<D>, JsonRejection>,
) -> Result<Json<D>, ApiError> {
    let repo = repo::<D>(&state);
    let current = repo.get(&identity)?;
    let Json(updated) = payload?;
    updated.validate()?;
    current.ensure_same_identity(&updated)?;
    repo.save(&updated)?;
    tracing::info!(kind = D::KIND, key = %updated.key(), "Definition updated");
    Ok(Json(updated))
}

async fn remove<D: Resource>(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<StatusCode, ApiError> {
    let repo = repo::<D>(&state);
    let current = repo.get(&identity)?;
    repo.delete(&current)?;
    tracing::info!(kind = D::KIND, key = %current.key(), "Definition deleted");
    Ok(StatusCode::OK)
}

/// Bulk create. Every hint is validated before any is saved.
async fn upload_hints(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Hint>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Hint>>), ApiError> {
    let Json(hints) = payload?;
    for hint in &hints {
        hint.validate()?;
    }
    let repo = HintRepo::new(state.store.clone());
    for hint in &hints {
        repo.save(hint)?;
    }
    tracing::info!(count = hints.len(), "Hints uploaded");
    Ok((StatusCode::CREATED, Json(hints)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use nightfury_store::{Database, Repository};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Router, Arc<dyn Repository>) {
        let store: Arc<dyn Repository> = Arc::new(Database::in_memory().unwrap());
        let state = AppState::new(Arc::clone(&store), &crate::ServerConfig::default());
        (routes().with_state(state), store)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn ludo() -> Value {
        json!({"name": "Ludo King", "title": "Ludo", "instruction": "roll", "type": "board"})
    }

    #[tokio::test]
    async fn ping_pongs() {
        let (app, _) = app();
        let (status, body) = call(&app, Method::GET, "/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "pong"}));
    }

    #[tokio::test]
    async fn game_crud() {
        let (app, _) = app();

        let (status, body) = call(&app, Method::POST, "/api/v1/games", Some(ludo())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "board");

        let (status, body) = call(&app, Method::GET, "/api/v1/games", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ludo-king"]["name"], "Ludo King");

        let (status, body) = call(&app, Method::GET, "/api/v1/games/ludo-king", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ludo");

        let mut changed = ludo();
        changed["title"] = json!("Ludo Deluxe");
        let (status, body) =
            call(&app, Method::PUT, "/api/v1/games/ludo-king", Some(changed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ludo Deluxe");

        let (status, _) = call(&app, Method::DELETE, "/api/v1/games/ludo-king", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, Method::GET, "/api/v1/games/ludo-king", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "game with name ludo-king doesn't exist");
    }

    #[tokio::test]
    async fn game_rename_rejected() {
        let (app, _) = app();
        call(&app, Method::POST, "/api/v1/games", Some(ludo())).await;

        let mut renamed = ludo();
        renamed["name"] = json!("Chess");
        let (status, body) =
            call(&app, Method::PUT, "/api/v1/games/ludo-king", Some(renamed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "name cannot be different");
    }

    #[tokio::test]
    async fn missing_required_field_rejected() {
        let (app, _) = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/games",
            Some(json!({"name": "ludo", "type": "board"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "'instruction' is required");
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let (app, _) = app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/games")
            .header("content-type", "application/json")
            .body(Body::from("{oops"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let (app, _) = app();
        let (status, _) = call(&app, Method::PUT, "/api/v1/games/ghost", Some(ludo())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hint_upload_and_slugged_update() {
        let (app, _) = app();
        let hints = json!([
            {"title": "strong passwords", "tag": ["auth"], "content": "c", "takeaway": "t"},
            {"title": "phishing", "tag": ["mail"], "content": "c", "takeaway": "t"}
        ]);
        let (status, body) = call(&app, Method::POST, "/api/v1/hints/upload", Some(hints)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, all) = call(&app, Method::GET, "/api/v1/hints", None).await;
        assert!(all.get("strong-passwords").is_some());

        let update = json!({"title": "strong-passwords", "tag": ["auth"], "content": "new", "takeaway": "t"});
        let (status, body) =
            call(&app, Method::PUT, "/api/v1/hints/strong-passwords", Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], "new");

        let renamed = json!({"title": "weak passwords", "tag": ["auth"], "content": "c", "takeaway": "t"});
        let (status, body) =
            call(&app, Method::PUT, "/api/v1/hints/strong-passwords", Some(renamed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "title 'strong passwords' cannot be different");
    }

    #[tokio::test]
    async fn invalid_upload_saves_nothing() {
        let (app, _) = app();
        let hints = json!([
            {"title": "ok", "tag": ["a"], "content": "c", "takeaway": "t"},
            {"title": "bad", "tag": [], "content": "c", "takeaway": "t"}
        ]);
        let (status, _) = call(&app, Method::POST, "/api/v1/hints/upload", Some(hints)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, all) = call(&app, Method::GET, "/api/v1/hints", None).await;
        assert_eq!(all, json!({}));
    }

    #[tokio::test]
    async fn security_incident_crud() {
        let (app, _) = app();
        let incident = json!({"title": "Equifax Breach", "tag": "breach", "content": "c", "takeaway": "t"});
        let (status, _) =
            call(&app, Method::POST, "/api/v1/security-incidents", Some(incident)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) =
            call(&app, Method::GET, "/api/v1/security-incidents/Equifax-Breach", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "breach");

        let (status, _) =
            call(&app, Method::DELETE, "/api/v1/security-incidents/Equifax-Breach", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn clients_listing() {
        let (app, store) = app();
        ClientRepo::new(store).save(&Client::new("kiosk", true)).unwrap();

        let (status, body) = call(&app, Method::GET, "/api/v1/clients", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kiosk"]["available"], true);
    }

    #[test]
    fn store_errors_map_to_status() {
        assert_eq!(
            ApiError::from(StoreError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Database("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
