use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use validator::Validate;

use crate::core::ServerState;

#[derive(Debug, Deserialize, Validate)]
pub struct ImportCodes {
    #[validate(length(min = 1, max = 10000))]
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub received: usize,
    pub added: usize,
}

/// POST /api/codes - 导入兑换码 (已存在的码不会被重置)
pub async fn import(
    State(state): State<ServerState>,
    Json(payload): Json<ImportCodes>,
) -> AppResult<Json<ImportResult>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let added = state.vault.import_codes(&payload.codes)?;
    Ok(Json(ImportResult {
        received: payload.codes.len(),
        added,
    }))
}
