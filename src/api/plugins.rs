//! Main page, plugin render and plugin action endpoints

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::ApiState;
use crate::plugins::{ActionResult, Page};

/// Menu entry for one plugin
#[derive(Debug, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    pub title: String,
    pub icon: String,
}

/// `GET /api/main` response
#[derive(Debug, Serialize, Deserialize)]
pub struct MainResponse {
    #[serde(rename = "host-name")]
    pub host_name: String,
    pub plugins: Vec<PluginInfo>,
    #[serde(rename = "host-badge-color")]
    pub host_badge_color: String,
}

/// Render request body
#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub args: Vec<String>,
}

/// Action request body
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

/// `GET /api/main`
pub async fn main_page(State(state): State<Arc<ApiState>>) -> Json<MainResponse> {
    let plugins = state
        .runtime
        .plugins()
        .iter()
        .map(|p| PluginInfo {
            id: p.id().to_string(),
            title: p.title().to_string(),
            icon: p.icon().to_string(),
        })
        .collect();

    Json(MainResponse {
        host_name: state.host_name.clone(),
        plugins,
        host_badge_color: state.host_badge_color.clone(),
    })
}

/// `POST /api/plugins/{id}`
pub async fn render(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Page>, StatusCode> {
    let plugin = state.runtime.plugin_by_id(&id).ok_or(StatusCode::NOT_FOUND)?;

    let request = if body.is_empty() {
        RenderRequest::default()
    } else {
        serde_json::from_slice::<RenderRequest>(&body).map_err(|e| {
            tracing::debug!(plugin = %id, error = %e, "malformed render request");
            StatusCode::BAD_REQUEST
        })?
    };

    Ok(Json(plugin.render(&request.args)))
}

/// `POST /api/plugins/{id}/action`
pub async fn action(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ActionResult>, StatusCode> {
    let plugin = state.runtime.plugin_by_id(&id).ok_or(StatusCode::NOT_FOUND)?;

    let request: ActionRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(plugin = %id, error = %e, "malformed action request");
        StatusCode::BAD_REQUEST
    })?;

    let handler = plugin.actions().remove(&request.cmd).ok_or_else(|| {
        tracing::debug!(plugin = %id, cmd = %request.cmd, "unknown action");
        StatusCode::NOT_FOUND
    })?;

    let data = request
        .data
        .map_or_else(Vec::new, |raw| raw.get().as_bytes().to_vec());

    tracing::debug!(plugin = %id, cmd = %request.cmd, args = ?request.args, "plugin action");
    Ok(Json(handler(request.args, data).await))
}
