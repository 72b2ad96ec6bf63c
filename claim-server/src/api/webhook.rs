//! Konsol webhook
//!
//! POST /webhooks/konsol: `{event, data: {id, status, ...}, signature}`
//!
//! With `KONSOL_WEBHOOK_SECRET` set, `signature` must be the HMAC of `data`
//! (see [`crate::gateway::signature`]). Known payments go through the same
//! status update as the reconcile worker; unknown ones are acknowledged.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Router, routing::post};
use serde::Deserialize;

use crate::core::ServerState;
use crate::gateway::signature;

/// Header alternative to the body `signature` field
pub const SIGNATURE_HEADER: &str = "x-konsol-signature";

pub fn router() -> Router<ServerState> {
    Router::new().route("/webhooks/konsol", post(handle_webhook))
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    event: Option<String>,
    data: serde_json::Value,
    #[serde(default)]
    signature: Option<String>,
}

pub async fn handle_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Some(secret) = state.config.konsol_webhook_secret.as_deref() {
        let provided = envelope
            .signature
            .as_deref()
            .or_else(|| headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()))
            .unwrap_or_default();
        let payload = signature::canonical_payload(&envelope.data);
        if let Err(e) = signature::verify(&payload, provided, secret) {
            tracing::warn!(error = e, "Webhook signature verification failed");
            return StatusCode::BAD_REQUEST;
        }
    }

    let (Some(konsol_id), Some(status)) = (
        envelope.data.get("id").and_then(|v| v.as_str()),
        envelope.data.get("status").and_then(|v| v.as_str()),
    ) else {
        tracing::warn!("Webhook data missing id or status");
        return StatusCode::BAD_REQUEST;
    };

    tracing::info!(
        event = envelope.event.as_deref().unwrap_or(""),
        konsol_id,
        status,
        "Received Konsol webhook"
    );

    match state.reconciler.apply_webhook(konsol_id, status) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!(konsol_id, error = %e, "Failed to apply webhook status");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
