use tracing_subscriber::EnvFilter;

use visualizer_downloader_lib::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("visualizer_downloader_lib=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::load()?;
    visualizer_downloader_lib::run(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("[Server] Failed to install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("[Server] Shutting down");
}
