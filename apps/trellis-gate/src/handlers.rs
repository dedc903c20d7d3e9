//! HTTP handlers for artifact retrieval and in-host preview.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use trellis_client::ArtifactKind;

use crate::registry::ArtifactRegistry;
use crate::viewer;

pub struct AppState {
    pub registry: ArtifactRegistry,
}

pub type SharedState = Arc<AppState>;

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn get_model(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    serve_artifact(&state, &id, ArtifactKind::Model, "model/gltf-binary").await
}

pub async fn get_video(Path(id): Path<String>, State(state): State<SharedState>) -> Response {
    serve_artifact(&state, &id, ArtifactKind::Video, "video/mp4").await
}

async fn serve_artifact(
    state: &AppState,
    id: &str,
    kind: ArtifactKind,
    content_type: &'static str,
) -> Response {
    let Some(path) = state.registry.find(id, kind) else {
        return not_found(id, kind);
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(err) => {
            warn!("could not read {}: {err}", path.display());
            not_found(id, kind)
        }
    }
}

fn not_found(id: &str, kind: ArtifactKind) -> Response {
    (StatusCode::NOT_FOUND, format!("{kind} {id} not found")).into_response()
}

pub async fn view_model(Path(id): Path<String>) -> Html<String> {
    Html(viewer::model_viewer_page(&id))
}

pub async fn view_video(Path(id): Path<String>) -> Html<String> {
    Html(viewer::video_player_page(&id))
}

/// File-existence probe used by node UIs to know when artifacts landed.
pub async fn exists(Path(id): Path<String>, State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "session_id": id,
        "model": state.registry.find(&id, ArtifactKind::Model).is_some(),
        "video": state.registry.find(&id, ArtifactKind::Video).is_some(),
    }))
}
