//! 核心模块 - 配置、状态、服务器与后台任务
//!
//! - [`Config`] - 环境变量配置
//! - [`ServerState`] - 共享服务
//! - [`Server`] - HTTP 服务器
//! - [`ServerError`] - 启动错误
//! - [`BackgroundTasks`] - 后台任务

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
