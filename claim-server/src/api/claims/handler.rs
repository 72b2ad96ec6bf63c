//! Claim API Handlers

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use shared::models::{Claim, Payment, ProcessStatus};
use validator::Validate;

use crate::api::AdminActor;
use crate::claims::Payout;
use crate::core::ServerState;
use crate::gateway::BankMember;
use crate::utils::validation::{MAX_GATEWAY_ID_LEN, validate_required_text};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Defaults to `awaiting_review`
    pub status: Option<ProcessStatus>,
}

#[derive(Debug, Serialize)]
pub struct ClaimDetail {
    pub claim: Claim,
    pub payment: Option<Payment>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BankMemberUpdate {
    #[validate(length(min = 1, max = 64))]
    pub bank_member_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BankMemberQuery {
    pub q: Option<String>,
}

/// GET /api/claims?status= - 按处理阶段列出申领
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Claim>>> {
    let status = query.status.unwrap_or(ProcessStatus::AwaitingReview);
    let claims = state.controller.list_claims(status)?;
    Ok(Json(claims))
}

/// GET /api/claims/{id} - 申领及其支付记录
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ClaimDetail>> {
    let claim = state.controller.get_claim(&id)?;
    let payment = state.controller.claim_payment(&id)?;
    Ok(Json(ClaimDetail { claim, payment }))
}

/// POST /api/claims/{id}/approve - 审批通过并发起支付
pub async fn approve(
    State(state): State<ServerState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
) -> AppResult<Json<Payout>> {
    let payout = state.controller.approve(&id, actor.as_str()).await?;
    Ok(Json(payout))
}

/// POST /api/claims/{id}/reject - 拒绝申领
pub async fn reject(
    State(state): State<ServerState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
) -> AppResult<Json<Claim>> {
    let claim = state.controller.reject(&id, actor.as_str()).await?;
    Ok(Json(claim))
}

/// PUT /api/claims/{id}/bank-member - 设置 FPS 银行编号
pub async fn set_bank_member(
    State(state): State<ServerState>,
    Extension(actor): Extension<AdminActor>,
    Path(id): Path<String>,
    Json(payload): Json<BankMemberUpdate>,
) -> AppResult<Json<Claim>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    validate_required_text(&payload.bank_member_id, "bank_member_id", MAX_GATEWAY_ID_LEN)?;

    let claim = state
        .controller
        .set_bank_member_id(&id, &payload.bank_member_id, actor.as_str())
        .await?;
    Ok(Json(claim))
}

/// GET /api/bank-members?q= - FPS 银行列表
pub async fn bank_members(
    State(state): State<ServerState>,
    Query(query): Query<BankMemberQuery>,
) -> AppResult<Json<Vec<BankMember>>> {
    let members = state.controller.list_bank_members(query.q.as_deref()).await?;
    Ok(Json(members))
}
