//! HTTP gateway: model and character management plus the chat relay.
//!
//! Startup sequence:
//! 1. Load config, apply `--host` / `--port`
//! 2. Pick the data store (hosted, or in-memory with `--in-memory`)
//! 3. Build the credential table and the chat dispatcher
//! 4. Serve the router until Ctrl+C / SIGTERM
//!
//! Every failure body is `{success: false, error}`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use tertulia_core::config::load_config;
use tertulia_core::types::{ChatRequest, NewCharacter, NewModel};
use tertulia_core::utils::parse_image_data_url;
use tertulia_providers::{ChatDispatcher, ChatError, EnvCredentials};
use tertulia_store::{DataStore, StoreError};

use crate::helpers;

/// Largest accepted request body; characters carry base64 images.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

// ─────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────

/// Run the gateway until a shutdown signal arrives.
pub async fn run(host: Option<String>, port: Option<u16>, in_memory: bool) -> Result<()> {
    helpers::print_banner();

    let mut config = load_config(None);
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let timeout = Duration::from_secs(config.gateway.request_timeout_secs);
    let store = helpers::build_store(&config, in_memory, timeout)?;

    let credentials = EnvCredentials::from_config(&config.providers);
    if credentials.is_empty() {
        warn!("no provider credentials in the environment; only models with stored keys will answer");
    }
    let dispatcher = ChatDispatcher::new(Arc::clone(&store), credentials, timeout)
        .context("failed to create chat dispatcher")?;

    let state = AppState {
        store: Arc::clone(&store),
        dispatcher: Arc::new(dispatcher),
    };
    let app = router(state, &config.gateway.allowed_origins);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        addr = %addr,
        store = store.display_name(),
        origins = ?config.gateway.allowed_origins,
        "gateway listening"
    );
    println!("  Listening: http://{addr}");
    println!("  Store:     {}", store.display_name());
    println!();
    println!("  Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    println!("  Gateway stopped. Goodbye!");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

// ─────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub dispatcher: Arc<ChatDispatcher>,
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/models", get(list_models).post(create_model))
        .route("/api/models/{id}", delete(delete_model))
        .route("/api/personajes", get(list_characters).post(create_character))
        .route("/api/personajes/{id}", delete(delete_character))
        .route("/api/chat", post(chat))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// A handler failure, rendered as `{success: false, error}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        if !e.is_client_error() {
            error!(error = %e, "store failure");
        }
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::LastModel => ApiError::BadRequest(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        if let Some(provider) = e.provider() {
            warn!(provider = provider.display_name(), error = %e, "chat request failed upstream");
        }
        match e {
            ChatError::InvalidInput(m) => ApiError::BadRequest(m),
            ChatError::NotFound(m) => ApiError::NotFound(m),
            ChatError::Store(e) => e.into(),
            ChatError::Config(_) | ChatError::Upstream { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Tertulia API funcionando"
    }))
}

async fn list_models(State(state): State<AppState>) -> ApiResult {
    let models = state.store.list_models().await?;
    Ok(Json(json!({ "success": true, "models": models })))
}

#[derive(Debug, Deserialize)]
struct CreateModelBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
}

async fn create_model(
    State(state): State<AppState>,
    payload: Result<Json<CreateModelBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let (Some(name), Some(url), Some(api_key)) = (
        non_blank(body.name),
        non_blank(body.url),
        non_blank(body.api_key),
    ) else {
        return Err(ApiError::BadRequest(
            "Nombre, URL y API Key son requeridos".into(),
        ));
    };

    let model = state
        .store
        .insert_model(NewModel {
            name: name.trim().to_string(),
            url: url.trim().to_string(),
            api_key: api_key.trim().to_string(),
            is_custom: true,
        })
        .await?;
    info!(id = %model.id, name = %model.name, "model added");
    Ok(Json(json!({ "success": true, "model": model })))
}

async fn delete_model(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.store.delete_model(&id).await?;
    info!(id = %id, "model deleted");
    Ok(Json(json!({ "success": true, "message": "Modelo eliminado correctamente" })))
}

async fn list_characters(State(state): State<AppState>) -> ApiResult {
    let characters = state.store.list_characters().await?;
    Ok(Json(json!({ "success": true, "personajes": characters })))
}

#[derive(Debug, Deserialize)]
struct CreateCharacterBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    image_base64: Option<String>,
}

async fn create_character(
    State(state): State<AppState>,
    payload: Result<Json<CreateCharacterBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let name = non_blank(body.name)
        .ok_or_else(|| ApiError::BadRequest("El nombre es requerido".into()))?;

    let image = non_blank(body.image_base64)
        .map(|data_url| parse_image_data_url(&data_url))
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("Imagen inválida: {e}")))?;

    let character = state
        .store
        .insert_character(
            NewCharacter {
                name: name.trim().to_string(),
                description: body.description.unwrap_or_default(),
                system_prompt: body.system_prompt.unwrap_or_default(),
            },
            image,
        )
        .await?;
    info!(
        id = %character.id,
        name = %character.name,
        image = character.image_url.is_some(),
        "character added"
    );
    Ok(Json(json!({ "success": true, "personaje": character })))
}

async fn delete_character(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.store.delete_character(&id).await?;
    info!(id = %id, "character deleted");
    Ok(Json(json!({ "success": true, "message": "Personaje eliminado correctamente" })))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let reply = state.dispatcher.dispatch(&request).await?;
    Ok(Json(json!({ "success": true, "response": reply })))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
