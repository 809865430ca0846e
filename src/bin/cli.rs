use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use visualizer_downloader_lib::config::AppConfig;
use visualizer_downloader_lib::downloader::search::DEFAULT_RESULTS;
use visualizer_downloader_lib::downloader::{
    tools, DownloadProgress, Downloader, LrcLibClient, Lyrics, LyricsProvider, OutputKind,
    ProgressEmitter, SearchProvider, SourceLocator, VideoSummary, YtDlpRunner, YtDlpSearch,
};

#[derive(Parser, Debug)]
#[command(name = "ytdl", version, about = "Search and download YouTube audio/video with yt-dlp")]
struct Cli {
    /// Log orchestration details to stderr
    #[arg(long, short, global = true, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search YouTube and list the hits
    Search {
        query: Vec<String>,

        #[arg(long, short, default_value_t = DEFAULT_RESULTS)]
        limit: usize,
    },
    /// Download a URL, a video id (with --id) or the best search hit
    Download {
        input: Vec<String>,

        #[arg(
            long,
            short,
            default_value = "mp3",
            value_parser = clap::builder::PossibleValuesParser::new(["mp3", "mp4"])
        )]
        format: String,

        #[arg(long = "output-dir", short)]
        output_dir: Option<PathBuf>,

        /// Treat the input as a bare video id instead of a search query
        #[arg(long, action = clap::ArgAction::SetTrue)]
        id: bool,

        /// Which search hit to download (1-based)
        #[arg(long, default_value_t = 1)]
        pick: usize,

        /// Also look up synced lyrics for the downloaded track
        #[arg(long, action = clap::ArgAction::SetTrue)]
        lyrics: bool,
    },
    /// Look up lyrics for a "Artist - Song" style title
    Lyrics { title: Vec<String> },
    /// Show which yt-dlp would be used and whether it runs
    Doctor,
    /// Update yt-dlp
    Update,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "visualizer_downloader_lib=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    match cli.command {
        Command::Search { query, limit } => {
            let results = search(&config, &query.join(" "), limit).await?;
            print_results(&results);
        }
        Command::Download {
            input,
            format,
            output_dir,
            id,
            pick,
            lyrics,
        } => {
            let input = input.join(" ");
            let output_dir = output_dir.unwrap_or_else(|| config.server.download_dir.clone());
            download(&config, &input, &format, output_dir, id, pick, lyrics).await?;
        }
        Command::Lyrics { title } => {
            let client = LrcLibClient::new(config.lyrics.url.clone(), config.ytdlp.proxy.as_deref())?;
            match client.lookup_title(&title.join(" ")).await? {
                Some(found) => print_lyrics(&found),
                None => println!("No lyrics found"),
            }
        }
        Command::Doctor => doctor(&config).await,
        Command::Update => {
            let program = tools::find_ytdlp(config.ytdlp.path.as_deref());
            let summary = tools::update_ytdlp(&program, 300).await?;
            println!("{}", summary);
        }
    }

    Ok(())
}

async fn search(config: &AppConfig, query: &str, limit: usize) -> anyhow::Result<Vec<VideoSummary>> {
    if query.trim().is_empty() {
        bail!("a search query is required");
    }
    let program = tools::find_ytdlp(config.ytdlp.path.as_deref());
    let provider = YtDlpSearch::new(program, config.network());
    Ok(provider.search(query, limit).await?)
}

fn print_results(results: &[VideoSummary]) {
    if results.is_empty() {
        println!("No videos found. Try a different search term.");
        return;
    }
    for (idx, video) in results.iter().enumerate() {
        let duration = video.duration.as_deref().unwrap_or("?:??");
        let views = video
            .views
            .map(|v| format!(" {} views", v))
            .unwrap_or_default();
        println!("{}. {}", idx + 1, video.title);
        println!("   {} [{}]{}", video.channel, duration, views);
        println!("   {}", video.url);
    }
}

async fn download(
    config: &AppConfig,
    input: &str,
    format: &str,
    output_dir: PathBuf,
    as_id: bool,
    pick: usize,
    with_lyrics: bool,
) -> anyhow::Result<()> {
    let (locator, title) = if as_id || SourceLocator::looks_like_url(input) {
        (SourceLocator::parse(input)?, None)
    } else {
        let results = search(config, input, pick.max(DEFAULT_RESULTS)).await?;
        print_results(&results);
        let chosen = match pick.checked_sub(1).and_then(|i| results.get(i)) {
            Some(chosen) => chosen,
            None => bail!("--pick {} is out of range (1-{})", pick, results.len()),
        };
        println!("\nDownloading #{}: {}", pick, chosen.title);
        (SourceLocator::parse(&chosen.id)?, Some(chosen.title.clone()))
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<DownloadProgress>();
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            eprint!("\r\x1b[2K{}", progress.status);
            let _ = std::io::stderr().flush();
        }
        eprintln!();
    });

    let runner = YtDlpRunner::locate(config.ytdlp.path.as_deref()).with_progress(ProgressEmitter::new(tx));
    let downloader = Downloader::new(Arc::new(runner))
        .with_network(config.network())
        .with_auto_update(config.ytdlp.auto_update);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_ctrl_c.cancel();
        }
    });

    let kind = OutputKind::from_format(format);
    let result = downloader
        .download_locator(&locator, kind, &output_dir, &cancel)
        .await;
    // The runner owns the last sender; dropping it ends the printer
    drop(downloader);
    let _ = printer.await;

    let artifact = match result {
        Ok(artifact) => artifact,
        Err(e) => {
            if let Some(reason) =
                visualizer_downloader_lib::downloader::diagnostics::diagnose_error(&e.diagnostic_text())
            {
                eprintln!("Hint: {} ({})", reason.description(), reason.suggestion());
            }
            return Err(e.into());
        }
    };
    println!("Saved {}", artifact.path.display());

    if with_lyrics {
        let title = title.unwrap_or_else(|| {
            visualizer_downloader_lib::api::title_from_file_name(&artifact.file_name(), locator.video_id())
        });
        let client = LrcLibClient::new(config.lyrics.url.clone(), config.ytdlp.proxy.as_deref())?;
        match client.lookup_title(&title).await {
            Ok(Some(found)) => print_lyrics(&found),
            Ok(None) => println!("No lyrics found"),
            Err(e) => eprintln!("Lyrics lookup failed: {}", e),
        }
    }

    Ok(())
}

fn print_lyrics(lyrics: &Lyrics) {
    println!("{} - {}", lyrics.artist, lyrics.song);
    if let Some(album) = &lyrics.album {
        println!("Album: {}", album);
    }
    println!();
    let text = if lyrics.has_timestamps {
        lyrics.synced_lyrics.as_deref()
    } else {
        lyrics.plain_lyrics.as_deref()
    };
    println!("{}", text.unwrap_or("(no lyric text)"));
}

async fn doctor(config: &AppConfig) {
    let program = tools::find_ytdlp(config.ytdlp.path.as_deref());
    let info = tools::tool_info(&program).await;

    println!("yt-dlp:        {}", program.display());
    match (info.available, info.version.as_deref()) {
        (true, Some(version)) => println!("version:       {}", version),
        (true, None) => println!("version:       unknown"),
        (false, _) => println!("status:        NOT AVAILABLE (install with `brew install yt-dlp` or `pip install yt-dlp`)"),
    }
    println!("download dir:  {}", config.server.download_dir.display());
    println!("proxy:         {}", config.ytdlp.proxy.as_deref().unwrap_or("none"));
    println!(
        "cookies:       {}",
        config
            .ytdlp
            .cookies
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("auto update:   {}", config.ytdlp.auto_update);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_defaults() {
        let cli = Cli::try_parse_from(["ytdl", "download", "daft", "punk"]).unwrap();
        match cli.command {
            Command::Download {
                input,
                format,
                output_dir,
                id,
                pick,
                lyrics,
            } => {
                assert_eq!(input.join(" "), "daft punk");
                assert_eq!(format, "mp3");
                assert!(output_dir.is_none());
                assert!(!id);
                assert_eq!(pick, 1);
                assert!(!lyrics);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn download_flags() {
        let cli = Cli::try_parse_from([
            "ytdl", "-v", "download", "abc123", "--id", "-f", "mp4", "-o", "/tmp/media", "--lyrics",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Download {
                format,
                output_dir,
                id,
                lyrics,
                ..
            } => {
                assert_eq!(format, "mp4");
                assert_eq!(output_dir, Some(PathBuf::from("/tmp/media")));
                assert!(id);
                assert!(lyrics);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["ytdl", "download", "x", "--format", "flac"]).is_err());
    }

    #[test]
    fn search_limit() {
        let cli = Cli::try_parse_from(["ytdl", "search", "lofi", "--limit", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Search { limit: 10, .. }));
    }
}
