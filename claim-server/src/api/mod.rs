//! API 路由模块
//!
//! | 路径 | 方法 | 认证 |
//! |------|------|------|
//! | /health | GET | 无 |
//! | /webhooks/konsol | POST | 签名 |
//! | /api/conversation/{user_id} | POST | Bearer |
//! | /api/conversation/{user_id}/outbox | GET | Bearer |
//! | /api/claims, /api/claims/{id} | GET | Bearer |
//! | /api/claims/{id}/approve, /reject | POST | Bearer |
//! | /api/claims/{id}/bank-member | PUT | Bearer |
//! | /api/bank-members | GET | Bearer |
//! | /api/payments/{konsol_id} | GET | Bearer |
//! | /api/codes | POST | Bearer |

pub mod auth;
pub mod claims;
pub mod codes;
pub mod conversation;
pub mod health;
pub mod payments;
pub mod webhook;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

pub use auth::AdminActor;

/// All routes, no middleware
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(conversation::router())
        .merge(claims::router())
        .merge(payments::router())
        .merge(codes::router())
}

/// Router with middleware and state, ready to serve
pub fn build_app(state: &ServerState) -> Router {
    build_router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}
