pub mod api;
pub mod config;
pub mod downloader;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;

use api::AppState;
use config::AppConfig;
use downloader::{Downloader, LrcLibClient, YtDlpRunner, YtDlpSearch};

/// Wire the yt-dlp runner, search and lyrics clients from configuration.
pub fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let runner = YtDlpRunner::locate(config.ytdlp.path.as_deref());
    let program = runner.program().to_path_buf();
    tracing::info!("[Server] Using yt-dlp at {}", program.display());

    let downloader = Downloader::new(Arc::new(runner))
        .with_network(config.network())
        .with_auto_update(config.ytdlp.auto_update);
    let lyrics = LrcLibClient::new(config.lyrics.url.clone(), config.ytdlp.proxy.as_deref())
        .context("building lyrics client")?;

    Ok(AppState {
        downloader: Arc::new(downloader),
        search: Arc::new(YtDlpSearch::new(program.clone(), config.network())),
        lyrics: Arc::new(lyrics),
        download_dir: config.server.download_dir.clone(),
        ytdlp_program: program,
    })
}

/// Serve the HTTP API until `shutdown` resolves.
pub async fn run<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    std::fs::create_dir_all(&config.server.download_dir).with_context(|| {
        format!("creating {}", config.server.download_dir.display())
    })?;

    let state = build_state(&config)?;
    let app = api::router(state);

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}:{}", config.server.host, config.server.port))?;

    tracing::info!(
        "[Server] API running on http://{}",
        listener.local_addr().context("reading bound address")?
    );
    tracing::info!(
        "[Server] Downloads served from {} at /downloads",
        config.server.download_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("running API server")?;

    Ok(())
}
