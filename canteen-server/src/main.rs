use canteen_server::{Config, Server, ServerState, init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境与日志
    dotenv::dotenv().ok();
    init_logger();

    tracing::info!("Canteen server starting...");

    // 2. 加载配置
    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;

    // 3. 初始化状态 (数据库、排队引擎、告警管线)
    let state = ServerState::initialize(&config).await?;

    // 4. 启动 HTTP 服务器 (Server::run 会自动启动后台任务)
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
