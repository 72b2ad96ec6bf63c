//! Payment API

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/{konsol_id}", get(handler::get_by_id))
}
