//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use vidship_config::Destination;

/// Download a video with yt-dlp and upload it to remote storage.
#[derive(Debug, Parser)]
#[command(name = "vidship", version, about)]
pub struct Args {
    /// Video id to download and upload.
    pub video_id: String,

    /// Keep the local file after a successful upload (overrides config).
    #[arg(long)]
    pub keep: bool,

    /// Override the upload destination: "yandex" or "peertube".
    #[arg(long, value_name = "DEST")]
    pub dest: Option<Destination>,

    /// Video name (required for PeerTube uploads).
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Video description (PeerTube only; defaults to the configured one).
    #[arg(long, value_name = "TEXT")]
    pub desc: Option<String>,

    /// Path to the configuration file.
    #[arg(long, value_name = "FILE", default_value = "vidship.toml")]
    pub config: PathBuf,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let args = Args::parse_from(["vidship", "R6kU-N6GBz8"]);
        assert_eq!(args.video_id, "R6kU-N6GBz8");
        assert!(!args.keep);
        assert!(args.dest.is_none());
        assert_eq!(args.config, PathBuf::from("vidship.toml"));
    }

    #[test]
    fn parses_full_invocation() {
        let args = Args::parse_from([
            "vidship",
            "--keep",
            "--dest",
            "peertube",
            "--name",
            "My Video",
            "--desc",
            "Great content",
            "--config",
            "custom.toml",
            "-v",
            "R6kU-N6GBz8",
        ]);
        assert!(args.keep);
        assert_eq!(args.dest, Some(Destination::Peertube));
        assert_eq!(args.name.as_deref(), Some("My Video"));
        assert_eq!(args.desc.as_deref(), Some("Great content"));
        assert_eq!(args.config, PathBuf::from("custom.toml"));
        assert!(args.verbose);
    }

    #[test]
    fn destination_override_is_case_insensitive() {
        let args = Args::parse_from(["vidship", "--dest", "Yandex", "abc"]);
        assert_eq!(args.dest, Some(Destination::Yandex));
    }

    #[test]
    fn rejects_unknown_destination() {
        assert!(Args::try_parse_from(["vidship", "--dest", "dropbox", "abc"]).is_err());
    }

    #[test]
    fn video_id_is_required() {
        assert!(Args::try_parse_from(["vidship"]).is_err());
    }
}
