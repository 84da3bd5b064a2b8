/*!
 * API REST FEEDER - Serveur HTTP du kernel
 *
 * RÔLE :
 * Interface opérateur et supervision : lecture de l'état du départ, journal,
 * historiques, injection manuelle de télémétrie et actions opérateur.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, chaque handler parle au moteur via l'`EngineHandle` (jamais d'accès direct)
 * - Moteur arrêté → 503
 * - Télémétrie rejetée → 422 avec la raison
 *
 * SÉCURITÉ :
 * - Header x-api-key (comparé à FEEDER_API_KEY) obligatoire sauf sur /health*
 * - Sans FEEDER_API_KEY configurée, tout est refusé
 */

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rumqttc::AsyncClient;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actor::{EngineHandle, NodeSeries};
use crate::error::EngineClosed;
use crate::event_log::LogEntry;
use crate::health::{HealthTracker, KernelHealth};
use crate::models::now_ms;
use crate::mqtt::publish_command;
use crate::snapshot::{EdgeView, NodeView};
use crate::topology::NodeId;

const DEFAULT_EVENTS_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub health: HealthTracker,
    pub mqtt: AsyncClient,
    pub command_topic: String,
}

type ApiResult<T> = Result<Json<T>, StatusCode>;

fn unavailable(_: EngineClosed) -> StatusCode {
    tracing::error!("HTTP request while feeder engine is stopped");
    StatusCode::SERVICE_UNAVAILABLE
}

fn api_key_ok(path: &str, headers: &HeaderMap, expected: &str) -> bool {
    if path.starts_with("/health") {
        return true;
    }
    if expected.is_empty() {
        return false;
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    let expected = std::env::var("FEEDER_API_KEY").unwrap_or_default();
    if !api_key_ok(req.uri().path(), req.headers(), &expected) {
        if expected.is_empty() {
            tracing::warn!("FEEDER_API_KEY not set, API access denied");
        } else {
            tracing::warn!(path = %req.uri().path(), "unauthorized API request");
        }
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/status", get(get_status))
        .route("/nodes", get(list_nodes))
        .route("/nodes/{id}", get(get_node))
        .route("/edges", get(list_edges))
        .route("/events", get(list_events))
        .route("/series", delete(clear_series))
        .route("/series/{id}", get(get_series))
        .route("/telemetry", post(post_telemetry))
        .route("/reset", post(post_reset))
        .route("/substation/toggle", post(toggle_substation))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health())
}

// GET /status (statut système + condition dominante)
async fn get_status(State(app): State<AppState>) -> ApiResult<Value> {
    let snapshot = app.engine.snapshot().await.map_err(unavailable)?;
    Ok(Json(json!({
        "status": snapshot.status,
        "dominant_fault": snapshot.dominant_fault,
        "source_online": snapshot.source_online,
    })))
}

// GET /nodes
async fn list_nodes(State(app): State<AppState>) -> ApiResult<Vec<NodeView>> {
    let snapshot = app.engine.snapshot().await.map_err(unavailable)?;
    Ok(Json(snapshot.nodes))
}

// GET /nodes/{id}
async fn get_node(State(app): State<AppState>, Path(id): Path<NodeId>) -> ApiResult<NodeView> {
    let snapshot = app.engine.snapshot().await.map_err(unavailable)?;
    snapshot.node(id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

// GET /edges
async fn list_edges(State(app): State<AppState>) -> ApiResult<Vec<EdgeView>> {
    let snapshot = app.engine.snapshot().await.map_err(unavailable)?;
    Ok(Json(snapshot.edges))
}

#[derive(Debug, Deserialize)]
struct EventsParams {
    limit: Option<usize>,
}

// GET /events?limit=N (plus récentes en dernier)
async fn list_events(State(app): State<AppState>, Query(params): Query<EventsParams>) -> ApiResult<Vec<LogEntry>> {
    let limit = params.limit.unwrap_or(DEFAULT_EVENTS_LIMIT);
    Ok(Json(app.engine.events(limit).await.map_err(unavailable)?))
}

// GET /series/{id}
async fn get_series(State(app): State<AppState>, Path(id): Path<NodeId>) -> ApiResult<NodeSeries> {
    let series = app.engine.series(id).await.map_err(unavailable)?;
    series.map(Json).ok_or(StatusCode::NOT_FOUND)
}

// DELETE /series
async fn clear_series(State(app): State<AppState>) -> ApiResult<Value> {
    app.engine.clear_series().await.map_err(unavailable)?;
    Ok(Json(json!({ "status": "cleared" })))
}

// POST /telemetry (même contrat que scada/poles)
async fn post_telemetry(State(app): State<AppState>, body: Bytes) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let result = app
        .engine
        .ingest_and_wait(body.to_vec(), now_ms())
        .await
        .map_err(|e| (unavailable(e), Json(json!({ "error": "engine unavailable" }))))?;

    match result {
        Ok(status) => Ok(Json(json!({ "accepted": true, "status": status }))),
        Err(err) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "accepted": false, "error": err.to_string() })),
        )),
    }
}

// POST /reset
async fn post_reset(State(app): State<AppState>) -> ApiResult<Value> {
    let status = app.engine.reset(now_ms()).await.map_err(unavailable)?;
    Ok(Json(json!({ "status": status })))
}

#[derive(Debug, Deserialize)]
struct ToggleParams {
    online: Option<bool>,
}

// POST /substation/toggle?online=true|false (sans paramètre : inverse l'état)
async fn toggle_substation(State(app): State<AppState>, Query(params): Query<ToggleParams>) -> ApiResult<Value> {
    let command = app.engine.toggle_source(params.online, now_ms()).await.map_err(unavailable)?;

    let published = match publish_command(&app.mqtt, &app.command_topic, &command).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "substation command not published");
            false
        }
    };
    Ok(Json(json!({ "command": command, "published": published })))
}
