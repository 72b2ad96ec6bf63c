use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use shared::error::AppResult;

use crate::conversation::{ConversationStep, Prompt, UserReply};
use crate::core::ServerState;

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub step: ConversationStep,
    pub prompts: Vec<Prompt>,
}

/// POST /api/conversation/{user_id} - 处理一条用户回复
pub async fn reply(
    State(state): State<ServerState>,
    Path(user_id): Path<i64>,
    Json(reply): Json<UserReply>,
) -> AppResult<Json<ConversationResponse>> {
    let step = state.conversation.handle(user_id, reply).await?;
    Ok(Json(ConversationResponse {
        step,
        prompts: state.channel.drain(user_id),
    }))
}

/// GET /api/conversation/{user_id}/outbox - 取走待发送的消息
///
/// 管理员通知和审批结果不是对回复的应答，由前端轮询取走。
pub async fn outbox(
    State(state): State<ServerState>,
    Path(chat_id): Path<i64>,
) -> AppResult<Json<Vec<Prompt>>> {
    Ok(Json(state.channel.drain(chat_id)))
}
