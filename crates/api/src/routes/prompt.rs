//! Prompt submission and queue inspection.
//!
//! `POST /prompt` is the only route that changes queue state from the HTTP
//! side, so it is also the one that announces the change to every session.

use axum::extract::State;
use axum::Json;
use relay_core::queue::{QueueInfo, QueueSnapshot};
use relay_core::types::SessionId;
use relay_events::EventError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Body of `POST /prompt`, read after the on-prompt hooks ran.
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    /// Session that should receive the execution events.
    #[serde(default)]
    pub client_id: Option<SessionId>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub prompt_id: String,
    pub number: u64,
}

/// GET /prompt -- `{"exec_info": {"queue_remaining": N}}`.
pub async fn queue_info(State(state): State<AppState>) -> Json<QueueInfo> {
    Json(state.queue.queue_info())
}

/// GET /queue -- running and pending items.
pub async fn queue_snapshot(State(state): State<AppState>) -> Json<QueueSnapshot> {
    Json(state.queue.snapshot())
}

/// POST /prompt
///
/// The hook chain sees the whole request body, so a hook may rewrite the
/// prompt as well as the `client_id`.
///
/// Once shutdown has closed the publish queue, nothing is queued and the
/// request gets 503. After a prompt is queued the request succeeds even if
/// the status broadcast cannot be sent.
pub async fn submit_prompt(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<PromptResponse>> {
    let body = state.hooks.trigger(body);
    let request: PromptRequest = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid prompt request: {e}")))?;

    let prompt = match request.prompt {
        Some(prompt @ Value::Object(_)) => prompt,
        Some(_) => return Err(AppError::BadRequest("prompt must be an object".into())),
        None => return Err(AppError::BadRequest("no prompt provided".into())),
    };
    let client_id = request.client_id.filter(|id| !id.is_empty());

    if state.publisher.is_closed() {
        return Err(EventError::QueueClosed.into());
    }

    let item = state.queue.submit(prompt, client_id);
    tracing::info!(
        prompt_id = %item.prompt_id,
        number = item.number,
        client_id = ?item.client_id,
        "Prompt queued",
    );

    if let Err(e) = state.publisher.queue_updated(state.queue.as_ref()) {
        tracing::warn!(
            prompt_id = %item.prompt_id,
            error = %e,
            "Queue status broadcast failed",
        );
    }

    Ok(Json(PromptResponse {
        prompt_id: item.prompt_id,
        number: item.number,
    }))
}
