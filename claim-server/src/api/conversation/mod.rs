//! Conversation transport
//!
//! The bot front end posts each user reply here and relays the returned
//! prompts to the user.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/conversation/{user_id}", post(handler::reply))
        .route("/api/conversation/{user_id}/outbox", get(handler::outbox))
}
