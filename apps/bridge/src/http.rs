//! HTTP ingress: accepts provider webhooks and helpdesk
//! callbacks and republishes them onto the durable queue; serves health,
//! webhook-url discovery and the ticket-stats endpoint. Callers never see
//! downstream processing errors; only publish failures surface
//! as a 500.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bridge_queue::Subject;
use serde_json::{Value, json};

use crate::state::AppState;

const GENERAL_BODY_LIMIT: usize = 50 * 1024 * 1024;
const WEBHOOK_BODY_LIMIT: usize = 500 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook-url", get(webhook_url))
        .route("/{webhook_name}/ticket-stats", get(ticket_stats))
        .route("/{webhook_name}/callback", post(receive_callback).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)))
        .route("/{webhook_name}", post(receive_principal).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)))
        .layer(DefaultBodyLimit::max(GENERAL_BODY_LIMIT))
        .with_state(state)
}

/// Provider payloads arrive either bare or wrapped under a `body` key
///; the processors only ever see the unwrapped shape.
fn unwrap_body(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value
        && let Some(body) = map.remove("body")
    {
        return body;
    }
    value
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn webhook_url(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let webhooks: Vec<Value> = state
        .clients
        .values()
        .map(|c| {
            json!({
                "tenant": c.tenant.id,
                "webhookUrl": format!("{}/{}", c.tenant.webhook_base, c.tenant.webhook_name),
                "callbackUrl": format!("{}/{}/callback", c.tenant.webhook_base, c.tenant.webhook_name),
            })
        })
        .collect();
    Json(json!({"webhooks": webhooks}))
}

async fn ticket_stats(State(state): State<Arc<AppState>>, Path(webhook_name): Path<String>) -> impl IntoResponse {
    if state.by_webhook_name(&webhook_name).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(state.ledger.stats()).into_response()
}

async fn receive_principal(State(state): State<Arc<AppState>>, Path(webhook_name): Path<String>, Json(body): Json<Value>) -> impl IntoResponse {
    let payload = unwrap_body(body);
    match state.queue.publish(Subject::Principal, &payload).await {
        Ok(()) => (StatusCode::OK, Json(json!({"accepted": true, "queued": Subject::Principal.as_str()}))).into_response(),
        Err(err) => {
            tracing::error!(webhook_name, error = %err, "failed to publish provider webhook event");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn receive_callback(State(state): State<Arc<AppState>>, Path(webhook_name): Path<String>, Json(body): Json<Value>) -> impl IntoResponse {
    let payload = unwrap_body(body);
    match state.queue.publish(Subject::Callback, &payload).await {
        Ok(()) => (StatusCode::OK, Json(json!({"accepted": true, "queued": Subject::Callback.as_str()}))).into_response(),
        Err(err) => {
            tracing::error!(webhook_name, error = %err, "failed to publish helpdesk callback event");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_body_strips_wrapper() {
        let wrapped = json!({"body": {"phone": "1"}});
        assert_eq!(unwrap_body(wrapped), json!({"phone": "1"}));
    }

    #[test]
    fn unwrap_body_passes_through_bare_payload() {
        let bare = json!({"phone": "1", "momment": 1});
        assert_eq!(unwrap_body(bare.clone()), bare);
    }
}
