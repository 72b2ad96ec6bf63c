use thiserror::Error;

use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// 启动与运行期错误 (HTTP 处理器使用 `AppError`)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("网关客户端错误: {0}")]
    Gateway(#[from] GatewayError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
