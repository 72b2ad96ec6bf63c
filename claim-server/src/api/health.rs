//! 健康检查
//!
//! `GET /health` 返回服务状态和对账待处理的支付数量。

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check(State(state): State<ServerState>) -> Json<Value> {
    let open_payments = state
        .storage
        .list_open_payments(&state.config.konsol_terminal_statuses)
        .map(|p| json!(p.len()))
        .unwrap_or(Value::Null);

    Json(json!({
        "status": if open_payments.is_null() { "degraded" } else { "ok" },
        "service": "claim-server",
        "version": env!("CARGO_PKG_VERSION"),
        "open_payments": open_payments,
    }))
}
