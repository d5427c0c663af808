use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(poll_result).post(receive_result))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub request_id: String,
    #[serde(default)]
    pub result: Value,
}

/// Called by the extraction worker once a job finishes.
async fn receive_result(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<StatusCode, (StatusCode, String)> {
    if payload.request_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "request_id is required".to_string()));
    }
    if payload.result.is_null() {
        return Err((StatusCode::BAD_REQUEST, "result is required".to_string()));
    }

    state
        .results
        .put(&payload.request_id, payload.result)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    tracing::info!("Stored result for {}", payload.request_id);
    Ok(StatusCode::OK)
}

/// 204 while the job is pending, the stored result once it is in.
async fn poll_result(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Result<Response, (StatusCode, String)> {
    let stored = state
        .results
        .get(&query.request_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(match stored {
        Some(stored) => Json(WebhookPayload {
            request_id: query.request_id,
            result: stored.result,
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
