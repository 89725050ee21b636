use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{debug, error};

use super::AppState;
use crate::disk::get_disk_info;
use crate::error::AgentError;
use crate::types::{ErrorResponse, InfoResponse};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(message: String) -> ApiError {
    error!("Disk lookup failed: {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}

/// GET /api/v1/info - Persistent and ephemeral filesystem usage
pub async fn disk_info(State(state): State<Arc<AppState>>) -> Result<Json<InfoResponse>, ApiError> {
    let lookup = state.clone();
    let info = tokio::task::spawn_blocking(move || -> Result<InfoResponse, AgentError> {
        Ok(InfoResponse {
            persistent: get_disk_info(&lookup.persistent_disk_path)?,
            ephemeral: get_disk_info(&lookup.ephemeral_disk_path)?,
        })
    })
    .await
    .map_err(|e| internal_error(format!("disk lookup task failed: {}", e)))?
    .map_err(|e| internal_error(e.to_string()))?;

    debug!(
        "Disk info: persistent {}/{} bytes free, ephemeral {}/{} bytes free",
        info.persistent.bytes_free,
        info.persistent.bytes_total,
        info.ephemeral.bytes_free,
        info.ephemeral.bytes_total
    );

    Ok(Json(info))
}
