use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::source::DEFAULT_MEDIA_HOST;

pub const DEFAULT_CHUNKS: usize = 4;
const MAX_CHUNKS: usize = 16;

#[derive(Parser)]
#[command(name = "chantui", version, about = "Browse an imageboard thread, hide and restore posts, download images")]
pub struct Cli {
    /// Thread JSON as a local file or an http(s) URL
    #[arg(long)]
    pub thread: Option<String>,
    /// Board the thread belongs to
    #[arg(long, default_value = "g")]
    pub board: String,
    /// Base URL serving thumbnails and images
    #[arg(long, default_value = DEFAULT_MEDIA_HOST)]
    pub media_host: String,
    /// Theme name, e.g. Yotsuba, Tomorrow, Black
    #[arg(long)]
    pub theme: Option<String>,
    /// Number of parallel range requests per image download
    #[arg(long)]
    pub chunks: Option<usize>,
    /// Directory downloaded images are saved to
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    /// Log file location
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Forget the saved configuration and removed posts
    #[arg(long)]
    pub reset: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this system")]
    NoConfigDir,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConfig {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default = "default_chunks")]
    pub chunks: usize,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Removed post numbers per thread, keyed by `board/thread`
    #[serde(default)]
    pub hidden_posts: BTreeMap<String, Vec<u64>>,
}

impl Default for SavedConfig {
    fn default() -> Self {
        SavedConfig {
            theme: None,
            chunks: DEFAULT_CHUNKS,
            download_dir: None,
            hidden_posts: BTreeMap::new(),
        }
    }
}

impl SavedConfig {
    /// Command line values win over saved ones
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(theme) = &cli.theme {
            self.theme = Some(theme.clone());
        }
        if let Some(chunks) = cli.chunks {
            self.chunks = chunks;
        }
        if let Some(dir) = &cli.download_dir {
            self.download_dir = Some(dir.clone());
        }
        self.chunks = self.chunks.clamp(1, MAX_CHUNKS);
    }

    pub fn hidden_for(&self, thread_key: &str) -> &[u64] {
        self.hidden_posts.get(thread_key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_hidden(&mut self, thread_key: &str, hidden: Vec<u64>) {
        if hidden.is_empty() {
            self.hidden_posts.remove(thread_key);
        } else {
            self.hidden_posts.insert(thread_key.to_string(), hidden);
        }
    }
}

fn default_chunks() -> usize {
    DEFAULT_CHUNKS
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chantui").join("config.json"))
}

pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chantui")
}

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("chantui")
        .join("chantui.log")
}

/// Load the saved configuration, if there is a readable one
pub fn load_config() -> Option<SavedConfig> {
    let path = config_path()?;
    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable configuration");
            None
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<Option<SavedConfig>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn save_config_to(path: &Path, config: &SavedConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

/// Delete the saved configuration. Returns whether there was one.
pub fn reset_config() -> Result<bool, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    reset_config_at(&path)
}

pub fn reset_config_at(path: &Path) -> Result<bool, ConfigError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
