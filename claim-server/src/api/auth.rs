//! Bearer token check for `/api/*`
//!
//! Every `/api/` route is administrator or bot-transport traffic and needs
//! `Authorization: Bearer <ADMIN_API_TOKEN>`. `/health` and the webhook are
//! public (the webhook carries its own signature).

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use shared::error::AppError;

use crate::core::ServerState;

/// Header naming the administrator behind a request (for logs)
pub const ACTOR_HEADER: &str = "x-admin-actor";

/// Who made the request, injected by [`require_admin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminActor(pub String);

impl AdminActor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn require_admin(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method() == http::Method::OPTIONS || !req.uri().path().starts_with("/api/") {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").ok_or_else(|| AppError::invalid_token("Invalid authorization header")))
        .transpose()?;

    let Some(token) = token else {
        tracing::warn!(uri = %req.uri(), "Missing authorization header");
        return Err(AppError::not_authenticated());
    };

    if !constant_time_eq(token.trim().as_bytes(), state.config.admin_api_token.as_bytes()) {
        tracing::warn!(uri = %req.uri(), "Invalid admin token");
        return Err(AppError::invalid_token("Invalid token"));
    }

    let actor = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("admin")
        .to_string();
    req.extensions_mut().insert(AdminActor(actor));

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
