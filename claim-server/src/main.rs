use claim_server::{Config, Server, init_logger_with_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载 .env (不存在时忽略)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env()?;

    // 3. 日志
    init_logger_with_file(&config.log_level, Some(&config.log_dir()));
    tracing::info!("Claim server starting...");

    // 4. 启动 HTTP 服务器 (Server::run 会启动后台任务)
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
