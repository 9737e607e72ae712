//! Orchestration: download, upload through the strategy ladder, cleanup.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, bail};
use futures_util::FutureExt;
use tracing::{info, warn};

use vidship_config::{Config, Destination};
use vidship_downloader::Downloader;
use vidship_peertube::PeerTubeClient;
use vidship_transfer::{Strategy, StrategyLadder};
use vidship_yandex::YandexClient;

use crate::cli::Args;

pub async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let dest = config.effective_destination(args.dest)?;
    let delete_after = config.should_delete(args.keep);
    info!(
        destination = %dest,
        delete_after_upload = delete_after,
        "configuration loaded"
    );

    let video_name = args.name.as_deref().unwrap_or_default();
    if dest == Destination::Peertube && video_name.is_empty() {
        bail!("PeerTube uploads require a video name; pass --name");
    }

    let downloader = Downloader::from_config(&config.downloader)?;
    let file_path = downloader.download(&args.video_id).await?;

    let start = Instant::now();
    match dest {
        Destination::Yandex => upload_to_yandex(&config, &file_path).await?,
        Destination::Peertube => {
            let video_desc = args.desc.as_deref().unwrap_or_default();
            upload_to_peertube(&config, &file_path, video_name, video_desc).await?
        }
    }
    info!(
        destination = %dest,
        elapsed_secs = format_args!("{:.1}", start.elapsed().as_secs_f64()),
        "upload complete"
    );

    if delete_after {
        remove_local_file(&file_path);
    } else {
        info!(file = %file_path.display(), "local file kept");
    }
    Ok(())
}

async fn upload_to_yandex(config: &Config, file_path: &Path) -> anyhow::Result<()> {
    let yandex_config = config
        .yandex
        .as_ref()
        .context("config has no [yandex] section")?;
    let client = YandexClient::from_config(yandex_config)?;

    let remote_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video.mp4".to_string());
    info!(
        title = %extract_video_name(&remote_name),
        remote = %remote_name,
        "uploading to Yandex Disk"
    );
    log_file_info(file_path);

    StrategyLadder::new(vec![
        Strategy::new("Standard Upload", || {
            client.upload(file_path, &remote_name).boxed()
        }),
        Strategy::new("Chunked Upload", || {
            client.chunked_upload(file_path, &remote_name).boxed()
        }),
    ])
    .run()
    .await?;
    Ok(())
}

async fn upload_to_peertube(
    config: &Config,
    file_path: &Path,
    video_name: &str,
    video_desc: &str,
) -> anyhow::Result<()> {
    let peertube_config = config
        .peertube
        .as_ref()
        .context("config has no [peertube] section")?;
    let client = PeerTubeClient::from_config(peertube_config)?;

    info!(name = video_name, "uploading to PeerTube");
    log_file_info(file_path);

    StrategyLadder::new(vec![
        Strategy::new("Standard Upload", || {
            client.upload(file_path, video_name, video_desc).boxed()
        }),
        Strategy::new("Retry Upload", || {
            client
                .chunked_upload(file_path, video_name, video_desc)
                .boxed()
        }),
    ])
    .run()
    .await?;
    Ok(())
}

fn log_file_info(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        info!(
            file = %path.display(),
            size_mb = format_args!("{:.2}", meta.len() as f64 / 1024.0 / 1024.0),
            "upload source"
        );
    }
}

/// Derives a display title from a `Title [video_id].ext` filename.
fn extract_video_name(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let title = match stem.rfind(" [") {
        Some(idx) => &stem[..idx],
        None => stem,
    };
    let title = title.trim();
    if title.is_empty() {
        "Downloaded Video".to_string()
    } else {
        title.to_string()
    }
}

/// Deletes the uploaded file and prunes the download directory if that
/// leaves it empty.
fn remove_local_file(path: &Path) {
    match std::fs::remove_file(path) {
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to delete local file");
        }
        Ok(()) => {
            info!(file = %path.display(), "local file deleted");
            if let Some(dir) = path.parent()
                && dir_is_empty(dir)
            {
                info!(dir = %dir.display(), "removing empty download directory");
                let _ = std::fs::remove_dir(dir);
            }
        }
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
