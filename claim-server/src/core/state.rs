//! 服务器状态
//!
//! 所有服务共享同一个 [`ClaimStorage`] 和同一组 [`ClaimLocks`]，
//! 因此会话、审批和对账看到的是同一份数据和同一把锁。

use std::sync::Arc;
use std::time::Duration;

use crate::claims::{ClaimController, PayoutSettings};
use crate::conversation::{BufferedChannel, ConversationService};
use crate::core::Config;
use crate::core::error::{Result, ServerError};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::gateway::{KonsolClient, PayoutGateway};
use crate::locks::ClaimLocks;
use crate::notify::{AllowAll, ChannelNotifier, EngagementVerifier, TelegramSubscriptionChecker};
use crate::reconcile::{ReconcileWorker, Reconciler};
use crate::storage::ClaimStorage;
use crate::vault::LocalCodeVault;

const LOCK_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub storage: ClaimStorage,
    pub vault: LocalCodeVault,
    /// Outbox of the HTTP conversation transport
    pub channel: Arc<BufferedChannel>,
    pub locks: Arc<ClaimLocks>,
    pub conversation: ConversationService,
    pub controller: ClaimController,
    pub reconciler: Reconciler,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("environment", &self.config.environment)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// 打开数据库并创建网关客户端
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let storage = ClaimStorage::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "Claim database opened");

        let gateway = KonsolClient::new(
            config.konsol_base_url.clone(),
            config.konsol_token.clone(),
            config.konsol_timeout(),
        )?;

        let engagement: Arc<dyn EngagementVerifier> =
            match (&config.telegram_bot_token, &config.subscription_channel) {
                (Some(token), Some(channel)) => {
                    let checker = TelegramSubscriptionChecker::new(token, channel.clone())
                        .map_err(|e| ServerError::Config(format!("subscription checker: {e}")))?;
                    tracing::info!(channel = %channel, "Subscription check enabled");
                    Arc::new(checker)
                }
                _ => {
                    tracing::warn!("SUBSCRIPTION_CHANNEL not configured, subscription check disabled");
                    Arc::new(AllowAll)
                }
            };

        Ok(Self::with_components(
            config.clone(),
            storage,
            Arc::new(gateway),
            engagement,
        ))
    }

    /// 使用给定的存储、网关和订阅检查组装状态
    pub fn with_components(
        config: Config,
        storage: ClaimStorage,
        gateway: Arc<dyn PayoutGateway>,
        engagement: Arc<dyn EngagementVerifier>,
    ) -> Self {
        let channel = Arc::new(BufferedChannel::new());
        let notifier = Arc::new(ChannelNotifier::new(channel.clone(), config.admin_chat_id));
        let locks = Arc::new(ClaimLocks::new());
        let vault = LocalCodeVault::new(storage.clone());

        let conversation = ConversationService::new(
            storage.clone(),
            Arc::new(vault.clone()),
            engagement,
            channel.clone(),
            notifier.clone(),
            locks.clone(),
            config.claim_amount,
        );

        let controller = ClaimController::new(
            storage.clone(),
            gateway.clone(),
            notifier,
            locks.clone(),
            PayoutSettings {
                purpose: config.payout_purpose.clone(),
                paid_status: config.konsol_paid_status.clone(),
                placeholder_phone: config.konsol_placeholder_phone.clone(),
            },
        );

        let reconciler = Reconciler::new(
            storage.clone(),
            gateway,
            config.konsol_paid_status.clone(),
            config.konsol_terminal_statuses.clone(),
        );

        Self {
            config: Arc::new(config),
            storage,
            vault,
            channel,
            locks,
            conversation,
            controller,
            reconciler,
        }
    }

    /// 启动对账和锁清理任务
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let worker = ReconcileWorker::new(
            self.reconciler.clone(),
            self.config.reconcile_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("reconcile_worker", TaskKind::Periodic, worker.run());

        let locks = self.locks.clone();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("lock_sweeper", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(LOCK_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = locks.evict_idle();
                        if evicted > 0 {
                            tracing::debug!(evicted, "Evicted idle locks");
                        }
                    }
                }
            }
        });

        tasks.log_summary();
        tasks
    }
}
