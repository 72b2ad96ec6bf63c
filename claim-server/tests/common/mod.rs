//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use claim_server::gateway::{
    BankMember, ContractorProfile, CreatePaymentRequest, GatewayError, GatewayPayment, PayoutGateway,
};
use claim_server::notify::AllowAll;
use claim_server::{ClaimStorage, Config, ServerState};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ADMIN_CHAT: i64 = -1001;
pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Gateway that hands out sequential ids and reports scripted statuses
#[derive(Default)]
pub struct ScriptedGateway {
    pub contractors: AtomicUsize,
    pub payments: AtomicUsize,
    /// konsol_id -> status returned by `get_payment`
    statuses: DashMap<String, String>,
    /// Delay inside `create_payment`, widens race windows
    pub create_delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn with_create_delay(delay: Duration) -> Self {
        Self {
            create_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn set_status(&self, konsol_id: &str, status: &str) {
        self.statuses.insert(konsol_id.to_string(), status.to_string());
    }
}

#[async_trait]
impl PayoutGateway for ScriptedGateway {
    async fn register_contractor(&self, _profile: &ContractorProfile) -> Result<String, GatewayError> {
        let n = self.contractors.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ctr_{n}"))
    }

    async fn create_payment(
        &self,
        _request: &CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.payments.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("pay_{n}");
        self.statuses.insert(id.clone(), "created".into());
        Ok(GatewayPayment {
            id,
            status: "created".into(),
            extra: Default::default(),
        })
    }

    async fn get_payment(&self, konsol_id: &str) -> Result<GatewayPayment, GatewayError> {
        match self.statuses.get(konsol_id) {
            Some(status) => Ok(GatewayPayment {
                id: konsol_id.to_string(),
                status: status.clone(),
                extra: Default::default(),
            }),
            None => Err(GatewayError::Status {
                status: 404,
                body: "{\"error\":\"not found\"}".into(),
            }),
        }
    }

    async fn list_bank_members(&self) -> Result<Vec<BankMember>, GatewayError> {
        Ok(vec![BankMember {
            id: "100000000011".into(),
            name: "Sberbank".into(),
            bic: None,
        }])
    }
}

pub fn test_config() -> Config {
    let paid = "executed".to_string();
    Config {
        work_dir: "./target/test-data".into(),
        http_port: 0,
        environment: "development".into(),
        log_level: "debug".into(),
        admin_api_token: ADMIN_TOKEN.into(),
        admin_chat_id: ADMIN_CHAT,
        claim_amount: Decimal::new(10000, 2),
        payout_purpose: "Prize payout".into(),
        konsol_base_url: "http://127.0.0.1:1".into(),
        konsol_token: "unused".into(),
        konsol_timeout_secs: 1,
        konsol_paid_status: paid.clone(),
        konsol_terminal_statuses: vec![paid, "failed".into()],
        konsol_placeholder_phone: "+79000000000".into(),
        konsol_webhook_secret: Some(WEBHOOK_SECRET.into()),
        reconcile_interval_secs: 300,
        telegram_bot_token: None,
        subscription_channel: None,
    }
}

/// In-memory state wired to `gateway`, with `codes` loaded
pub fn test_state(gateway: Arc<ScriptedGateway>, codes: &[&str]) -> ServerState {
    let storage = ClaimStorage::open_in_memory().unwrap();
    let state = ServerState::with_components(test_config(), storage, gateway, Arc::new(AllowAll));
    let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
    state.vault.import_codes(&codes).unwrap();
    state
}
