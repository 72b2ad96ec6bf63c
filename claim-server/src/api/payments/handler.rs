use axum::{
    Json,
    extract::{Path, State},
};
use shared::error::AppResult;

use crate::core::ServerState;
use crate::reconcile::PaymentSnapshot;
use crate::utils::validation::{MAX_GATEWAY_ID_LEN, validate_required_text};

/// GET /api/payments/{konsol_id} - 从网关刷新后返回支付记录
///
/// 网关不可用时返回本地记录 (`refreshed: false`)。
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(konsol_id): Path<String>,
) -> AppResult<Json<PaymentSnapshot>> {
    validate_required_text(&konsol_id, "konsol_id", MAX_GATEWAY_ID_LEN)?;
    let snapshot = state.reconciler.snapshot(&konsol_id).await?;
    Ok(Json(snapshot))
}
