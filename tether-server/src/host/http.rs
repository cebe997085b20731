use crate::host::HostState;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const HEALTH_CHECK_BODY: &str = "hello entry";

/// Answers every request that is not a relay handshake or a module download.
pub async fn health_check(uri: Uri) -> &'static str {
    debug!("HTTP request received: {}", uri.path());
    HEALTH_CHECK_BODY
}

#[derive(Deserialize)]
struct ModuleConfig {
    block: Option<String>,
}

/// Serves `<modules_dir>/<block>` where `block` comes from `<modules_dir>/<name>.json`.
pub async fn module_handler(
    Path(name): Path<String>,
    State(state): State<HostState>,
) -> Response {
    info!("Module {} download requested", name);

    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return (StatusCode::BAD_REQUEST, "Invalid module name").into_response();
    }

    let config_path = state.modules_dir.join(format!("{name}.json"));
    let raw = match tokio::fs::read(&config_path).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No module config at {}: {}", config_path.display(), e);
            return (StatusCode::NOT_FOUND, "Cannot find module").into_response();
        }
    };

    let block = match serde_json::from_slice::<ModuleConfig>(&raw) {
        Ok(ModuleConfig { block: Some(block) }) => block,
        Ok(_) => return (StatusCode::BAD_REQUEST, "Cannot find module").into_response(),
        Err(e) => {
            warn!("Malformed module config {}: {}", config_path.display(), e);
            return (StatusCode::BAD_REQUEST, "Cannot find module").into_response();
        }
    };

    match tokio::fs::read(state.modules_dir.join(&block)).await {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Module block {} unreadable: {}", block, e);
            (StatusCode::BAD_REQUEST, "Cannot find module").into_response()
        }
    }
}
