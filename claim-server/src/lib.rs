//! Claim Server - 推广兑换码申领与支付服务
//!
//! # 架构概述
//!
//! 用户兑换推广码后，通过会话提交凭证和收款信息；管理员审批后，
//! 服务调用 Konsol 支付网关付款并记录支付，之后通过轮询或 webhook 对账。
//! 每个申领最多支付一次。
//!
//! # 模块结构
//!
//! ```text
//! claim-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── conversation/  # 申领会话状态机
//! ├── claims/        # 审批与支付
//! ├── reconcile.rs   # 支付状态对账
//! ├── gateway/       # Konsol 客户端与 webhook 签名
//! ├── storage/       # redb 存储
//! ├── vault.rs       # 兑换码
//! ├── notify.rs      # 通知与订阅检查
//! ├── locks.rs       # 按用户/申领加锁
//! └── utils/         # 日志、输入校验
//! ```

pub mod api;
pub mod claims;
pub mod conversation;
pub mod core;
pub mod gateway;
pub mod locks;
pub mod notify;
pub mod reconcile;
pub mod storage;
pub mod utils;
pub mod vault;

// Re-export 公共类型
pub use claims::{ClaimController, ClaimError, Payout};
pub use conversation::{ConversationService, UserReply};
pub use core::{Config, Server, ServerState};
pub use reconcile::Reconciler;
pub use storage::ClaimStorage;

pub use shared::error::{AppError, AppResult, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};
