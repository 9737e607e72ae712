//! yt-dlp subprocess wrapper.
//!
//! Downloads one video by id into the configured output directory and
//! returns the path of the produced file. The tool's own output streams
//! are inherited so its progress display reaches the terminal unchanged.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use vidship_config::DownloaderConfig;

/// Format selector: H.264 video plus m4a audio, merged into mp4.
/// Keeps the output playable everywhere without transcoding.
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]";

/// Output template producing `Title [video_id].ext` filenames, with the
/// title capped so restricted filesystems don't reject the name.
const OUTPUT_TEMPLATE: &str = "%(title).200B [%(id)s].%(ext)s";

/// Errors from the download step.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cookies file not found: {0}")]
    CookiesNotFound(String),

    #[error("yt-dlp exited with {0}")]
    ToolFailed(std::process::ExitStatus),

    #[error("downloaded file not found for video id {0}")]
    FileNotFound(String),
}

/// Invokes yt-dlp and locates the file it produced.
pub struct Downloader {
    cookies_path: PathBuf,
    output_dir: PathBuf,
}

impl Downloader {
    /// Creates a downloader, ensuring the output directory exists.
    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let output_dir = PathBuf::from(&config.output_dir);
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            cookies_path: PathBuf::from(&config.cookies_path),
            output_dir,
        })
    }

    /// Downloads `video_id` and returns the path of the resulting file.
    pub async fn download(&self, video_id: &str) -> Result<PathBuf, DownloadError> {
        if !self.cookies_path.exists() {
            return Err(DownloadError::CookiesNotFound(
                self.cookies_path.display().to_string(),
            ));
        }

        let url = format!("https://www.youtube.com/watch?v={video_id}");
        info!(video_id, output_dir = %self.output_dir.display(), "starting download");

        let status = Command::new("yt-dlp")
            .arg("--cookies")
            .arg(&self.cookies_path)
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--embed-chapters")
            .arg("--restrict-filenames")
            .arg("--windows-filenames")
            .arg("--no-write-info-json")
            .arg("--paths")
            .arg(&self.output_dir)
            .arg("-o")
            .arg(OUTPUT_TEMPLATE)
            .arg(&url)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(DownloadError::ToolFailed(status));
        }

        let path = self.find_downloaded(video_id)?;
        info!(file = %path.display(), "download finished");
        Ok(path)
    }

    /// Locates the produced file by scanning for the video id in the
    /// name. The output template embeds the id in square brackets, so a
    /// plain substring match is enough.
    fn find_downloaded(&self, video_id: &str) -> Result<PathBuf, DownloadError> {
        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().contains(video_id) {
                return Ok(entry.path());
            }
        }
        Err(DownloadError::FileNotFound(video_id.to_string()))
    }
}
