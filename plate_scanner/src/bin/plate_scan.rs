use std::path::PathBuf;

use clap::Parser;
use plate_common::results::{video_stem, ResultStore};
use plate_common::uploader::{crop_key, result_key, ArtifactUploader};
use plate_common::Config;
use plate_scanner::pipeline::{log_counters, scan_video};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plate_scan", about = "Detect and read licence plates in a video file")]
struct Cli {
    /// Video to scan.
    video: PathBuf,

    /// TOML configuration file.
    #[arg(long, env = "PLATE_WATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_thread_ids(true)
        .init();

    let config = Config::load_or_default(cli.config.as_deref())?;
    let file_name = cli
        .video
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("not a video file: {}", cli.video.display()))?
        .to_string();
    let stem = video_stem(&file_name)?.to_string();
    info!(video = %stem, "processing video");

    let scan_config = config.clone();
    let video = cli.video.clone();
    let report = tokio::task::spawn_blocking(move || scan_video(&scan_config, &video)).await??;

    if report.plates.is_empty() {
        warn!(video = %stem, "no plates detected");
    } else {
        info!(video = %stem, plates = ?report.plates, "detected plates");
    }

    let store = ResultStore::new(&config.paths.results_dir);
    let result_path = store.save_plates(&stem, &report.plates)?;
    info!(path = %result_path.display(), "result stored");

    let uploader = ArtifactUploader::from_config(&config.storage).await;
    for crop in &report.crops {
        if let Some(crop_file) = crop.file_name().and_then(|name| name.to_str()) {
            uploader
                .upload_best_effort(crop, &crop_key(&stem, crop_file))
                .await;
        }
    }
    uploader
        .upload_best_effort(&result_path, &result_key(&format!("{stem}.json")))
        .await;

    log_counters();
    Ok(())
}
