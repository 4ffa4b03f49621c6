use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use unarc_pipeline::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_DISK_LIMIT, DEFAULT_WORKERS, GzipPolicy,
    PipelineConfig,
};
use unarc_store::ObjectLocation;

use crate::bytes::{format_bytes, parse_bytes};

/// Unpack an archive held in an object store into the same store.
#[derive(Debug, Parser)]
#[command(name = "unarc", version, about)]
pub struct Cli {
    /// Archive to unpack, e.g. gs://bucket/path/data.zip
    pub src: String,

    /// Destination prefix, e.g. gs://bucket/extracted/
    pub dest: String,

    /// Concurrent uploads
    #[arg(short = 'n', long = "workers", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Show progress and a timing summary
    #[arg(short, long)]
    pub verbose: bool,

    /// Copy buffer size
    #[arg(
        long = "buf",
        value_parser = parse_bytes,
        default_value = format_bytes(DEFAULT_BUFFER_SIZE as u64)
    )]
    pub buffer_size: u64,

    /// Upload chunk size
    #[arg(
        long = "chunk",
        value_parser = parse_bytes,
        default_value = format_bytes(DEFAULT_CHUNK_SIZE as u64)
    )]
    pub chunk_size: u64,

    /// Most bytes staged on local disk at once
    #[arg(long, value_parser = parse_bytes, default_value = format_bytes(DEFAULT_DISK_LIMIT))]
    pub disk_limit: u64,

    /// Directory for the run's scratch space
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,

    /// Comma-separated extensions to gzip while uploading
    #[arg(long, value_delimiter = ',')]
    pub gzip_ext: Vec<String>,

    /// Also upload OS metadata entries (__MACOSX, .DS_Store, Thumbs.db)
    #[arg(long)]
    pub with_meta: bool,

    /// Drop a top directory named like the archive instead of nesting it
    #[arg(long)]
    pub skip_top: bool,

    /// Treat backslashes in entry names as separators
    #[arg(long)]
    pub old_windows: bool,

    /// Comma-separated key=value metadata for every uploaded object
    #[arg(long = "meta", value_delimiter = ',')]
    pub meta: Vec<String>,

    /// Local directory backing non-HTTP object stores
    #[arg(long, default_value = ".")]
    pub store_root: PathBuf,
}

impl Cli {
    pub fn source(&self) -> Result<ObjectLocation> {
        ObjectLocation::parse(&self.src).context("parse src")
    }

    pub fn destination(&self) -> Result<ObjectLocation> {
        let dest = ObjectLocation::parse(&self.dest).context("parse dest")?;
        if matches!(dest.scheme(), "http" | "https") {
            bail!("destination {dest} is read-only; use an object-store locator");
        }
        Ok(dest)
    }

    pub fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default()
            .workers(self.workers)
            .buffer_size(usize::try_from(self.buffer_size).context("--buf does not fit in memory")?)
            .chunk_size(usize::try_from(self.chunk_size).context("--chunk does not fit in memory")?)
            .disk_limit(self.disk_limit)
            .gzip(GzipPolicy::new(&self.gzip_ext))
            .metadata(parse_metadata(&self.meta))
            .include_junk(self.with_meta)
            .skip_top(self.skip_top)
            .legacy_separators(self.old_windows);
        if let Some(dir) = &self.tmp_dir {
            config = config.staging_dir(dir);
        }
        Ok(config)
    }
}

/// `k=v` pairs; a pair without `=` maps the key to an empty value.
fn parse_metadata(pairs: &[String]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.clone(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("unarc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_pipeline() {
        let cli = parse(&["gs://b/data.zip", "gs://b/out/"]);
        let config = cli.config().unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(!cli.verbose);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "-n",
            "4",
            "-v",
            "--buf",
            "64k",
            "--chunk",
            "8MB",
            "--disk-limit",
            "1g",
            "--tmp-dir",
            "/scratch",
            "--gzip-ext",
            "html,JS",
            "--with-meta",
            "--skip-top",
            "--old-windows",
            "--meta",
            "owner=ops,flag",
            "gs://b/data.7z",
            "gs://b/out/",
        ]);
        let config = cli.config().unwrap();

        assert!(cli.verbose);
        assert_eq!(config.workers, 4);
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.chunk_size, 8 << 20);
        assert_eq!(config.disk_limit, 1 << 30);
        assert_eq!(config.staging_dir, Some(PathBuf::from("/scratch")));
        assert!(config.gzip.applies("index.html"));
        assert!(config.gzip.applies("app.js"));
        assert!(config.entries.include_junk);
        assert!(config.entries.skip_top);
        assert!(config.open.legacy_separators);
        assert_eq!(config.metadata.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(config.metadata.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn bad_sizes_are_rejected() {
        let result = Cli::try_parse_from(["unarc", "--buf", "lots", "gs://b/a.zip", "gs://b/"]);
        assert!(result.is_err());
    }

    #[test]
    fn http_destination_is_rejected() {
        let cli = parse(&["https://host/data.zip", "https://host/out/"]);
        assert!(cli.source().is_ok());
        assert!(cli.destination().is_err());
    }
}
