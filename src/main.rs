//! mediagrab - video and audio downloader for a remote conversion service
//!
//! Fetches metadata for a video page, asks the service for a converted file
//! and streams it into the download directory with live progress.

use anyhow::Result;
use clap::Parser;
use mediagrab::downloader::{format_bytes, DownloadConfig, DownloadEngine, TransferOutcome};
use mediagrab::service::{HttpMediaService, MediaFormat, TransferRequest, VideoInfo};
use mediagrab::utils::AppSettings;
use mediagrab::DirectorySink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Video page URL
    url: String,

    /// What to download: video or audio
    #[arg(long, short, default_value = "video")]
    format: MediaFormat,

    /// Quality token (video: 2160, 1080, 720; audio: 320, 128, 64)
    #[arg(long, short)]
    quality: Option<String>,

    /// Directory the file is saved into
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Base address of the conversion service
    #[arg(long)]
    api: Option<String>,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up when no data arrives for this many seconds
    #[arg(long)]
    stall_timeout: Option<u64>,

    /// Only show video details
    #[arg(long)]
    info_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut settings = AppSettings::load(args.config.as_deref())?;
    if let Some(api) = args.api {
        settings.api_base_url = api;
    }
    if let Some(dir) = args.output {
        settings.download_location = dir;
    }
    if args.stall_timeout.is_some() {
        settings.stall_timeout_secs = args.stall_timeout;
    }

    // Validate locally before anything goes over the wire
    let quality = args
        .quality
        .unwrap_or_else(|| args.format.default_quality().token().to_string());
    let request = TransferRequest::new(&args.url, args.format, &quality)?;

    let service = Arc::new(HttpMediaService::new(&settings.api_base_url)?);
    let sink = Arc::new(DirectorySink::new(&settings.download_location));
    let engine = Arc::new(DownloadEngine::new(
        service,
        sink,
        DownloadConfig {
            stall_timeout: settings.stall_timeout(),
        },
    ));

    let info = match engine.fetch_info(request.url()).await {
        Ok(info) => {
            print_info(&info);
            Some(info)
        }
        Err(e) if args.info_only => return Err(e.into()),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    };
    if args.info_only {
        return Ok(());
    }

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            // A second press, or one with no transfer running, quits outright
            if !cancel.cancel() {
                eprintln!();
                std::process::exit(130);
            }
        }
    });

    let reporter_engine = Arc::clone(&engine);
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            ticker.tick().await;
            let snapshot = reporter_engine.snapshot();
            if snapshot.phase.is_active() {
                eprint!("\r\x1b[2K{}", snapshot);
            }
        }
    });

    println!(
        "Downloading {} ({})...",
        request.format(),
        request.quality().label()
    );
    let outcome = engine
        .start_transfer(&request, info.as_ref().map(|i| i.title.as_str()))
        .await;
    reporter.abort();
    eprintln!();

    match outcome {
        Ok(TransferOutcome::Completed { artifact, path }) => {
            println!(
                "Saved {} ({})",
                path.display(),
                format_bytes(artifact.len() as u64)
            );
            Ok(())
        }
        Ok(TransferOutcome::Cancelled) => {
            println!("Download cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_info(info: &VideoInfo) {
    println!("Title:    {}", info.title);
    if let Some(uploader) = &info.uploader {
        println!("Uploader: {}", uploader);
    }
    if let Some(duration) = &info.duration {
        println!("Duration: {}", duration);
    }
    if let Some(thumbnail) = &info.thumbnail {
        println!("Thumb:    {}", thumbnail);
    }
}
