//! Claim administration API

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/claims", get(handler::list))
        .route("/api/claims/{id}", get(handler::get_by_id))
        .route("/api/claims/{id}/approve", post(handler::approve))
        .route("/api/claims/{id}/reject", post(handler::reject))
        .route("/api/claims/{id}/bank-member", put(handler::set_bank_member))
        .route("/api/bank-members", get(handler::bank_members))
}
