use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::ServerError;

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 数据库与日志目录 |
/// | HTTP_PORT | 8080 | HTTP 端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | ADMIN_API_TOKEN | (dev 占位) | 管理接口 Bearer token |
/// | ADMIN_CHAT_ID | 0 | 管理员通知会话 |
/// | CLAIM_AMOUNT | 100.00 | 每个申领的支付金额 |
/// | PAYOUT_PURPOSE | Prize payout | 付款用途 |
/// | KONSOL_BASE_URL | https://swagger-payments.konsol.pro | 网关地址 |
/// | KONSOL_TOKEN | (dev 占位) | 网关 token |
/// | KONSOL_TIMEOUT_SECS | 30 | 网关请求超时 |
/// | KONSOL_PAID_STATUS | executed | 视为已支付的状态 |
/// | KONSOL_TERMINAL_STATUSES | executed,failed | 不再对账的状态 |
/// | KONSOL_PLACEHOLDER_PHONE | +79000000000 | 银行卡收款人的联系电话 |
/// | KONSOL_WEBHOOK_SECRET | - | 设置后校验 webhook 签名 |
/// | RECONCILE_INTERVAL_SECS | 300 | 对账周期 |
/// | TELEGRAM_BOT_TOKEN / SUBSCRIPTION_CHANNEL | - | 同时设置时启用订阅检查 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,

    pub admin_api_token: String,
    pub admin_chat_id: i64,

    pub claim_amount: Decimal,
    pub payout_purpose: String,

    pub konsol_base_url: String,
    pub konsol_token: String,
    pub konsol_timeout_secs: u64,
    pub konsol_paid_status: String,
    pub konsol_terminal_statuses: Vec<String>,
    pub konsol_placeholder_phone: String,
    pub konsol_webhook_secret: Option<String>,

    pub reconcile_interval_secs: u64,

    pub telegram_bot_token: Option<String>,
    pub subscription_channel: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置的项使用默认值；密钥在非 development 环境下必须设置。
    pub fn from_env() -> Result<Self, ServerError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let claim_amount = check_claim_amount(env_parse_strict("CLAIM_AMOUNT", Decimal::new(10000, 2))?)?;
        let konsol_timeout_secs = check_timeout(env_parse_strict("KONSOL_TIMEOUT_SECS", 30)?)?;

        let paid_status = env_string("KONSOL_PAID_STATUS", "executed");
        let mut terminal = parse_list(&env_string("KONSOL_TERMINAL_STATUSES", "executed,failed"));
        if !terminal.contains(&paid_status) {
            terminal.push(paid_status.clone());
        }

        Ok(Self {
            work_dir: env_string("WORK_DIR", "./data"),
            http_port: env_parse("HTTP_PORT", 8080),
            log_level: env_string("LOG_LEVEL", "info"),
            admin_api_token: Self::require_secret("ADMIN_API_TOKEN", &environment)?,
            admin_chat_id: env_parse("ADMIN_CHAT_ID", 0),
            claim_amount,
            payout_purpose: env_string("PAYOUT_PURPOSE", "Prize payout"),
            konsol_base_url: env_string("KONSOL_BASE_URL", "https://swagger-payments.konsol.pro"),
            konsol_token: Self::require_secret("KONSOL_TOKEN", &environment)?,
            konsol_timeout_secs,
            konsol_paid_status: paid_status,
            konsol_terminal_statuses: terminal,
            konsol_placeholder_phone: env_string("KONSOL_PLACEHOLDER_PHONE", "+79000000000"),
            konsol_webhook_secret: env_optional("KONSOL_WEBHOOK_SECRET"),
            reconcile_interval_secs: env_parse("RECONCILE_INTERVAL_SECS", 300),
            telegram_bot_token: env_optional("TELEGRAM_BOT_TOKEN"),
            subscription_channel: env_optional("SUBSCRIPTION_CHANNEL"),
            environment,
        })
    }

    /// 密钥: 非 development 环境下必须设置且非空
    fn require_secret(name: &str, environment: &str) -> Result<String, ServerError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(ServerError::Config(format!(
                        "{name} must be set in {environment} environment"
                    )));
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(ServerError::Config(format!(
                "{name} must not be empty in {environment} environment"
            )));
        }
        Ok(val)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("claims.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn konsol_timeout(&self) -> Duration {
        Duration::from_secs(self.konsol_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Like [`env_parse`], but a set value that does not parse is an error
fn env_parse_strict<T>(name: &str, default: T) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_setting(name, env_optional(name).as_deref(), default)
}

fn parse_setting<T>(name: &str, raw: Option<&str>, default: T) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ServerError::Config(format!("{name}={raw:?} is invalid: {e}"))),
    }
}

fn check_claim_amount(amount: Decimal) -> Result<Decimal, ServerError> {
    if amount <= Decimal::ZERO {
        return Err(ServerError::Config(format!(
            "CLAIM_AMOUNT must be positive, got {amount}"
        )));
    }
    Ok(amount)
}

fn check_timeout(secs: u64) -> Result<u64, ServerError> {
    if secs == 0 {
        return Err(ServerError::Config("KONSOL_TIMEOUT_SECS must be at least 1".into()));
    }
    Ok(secs)
}

/// Comma separated list, blanks dropped
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
