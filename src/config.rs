use std::path::{Path, PathBuf};

use color_eyre::eyre::{OptionExt, Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};

use crate::entities::song::breaks_record;

const SNAPSHOT_FILE: &str = "library.txt";
const FAILURE_REPORT_FILE: &str = "failed.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    music_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    playlist_dir: Option<String>,
    /// Playlist names never collected.
    pub exclude_playlists: Vec<String>,
    pub only_my_playlists: bool,
    /// Playlist names whose members are re-sorted by album release date.
    pub sort_by_release_date: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spotify: Option<SpotifyCredentials>,
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Skips the refresh when set.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub workers: usize,
    pub audio_format: String,
    pub search_results: u32,
    pub searches_per_minute: u32,
    pub track_page_size: u32,
    pub playlist_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: "~/Music/music-mirror".to_string(),
            playlist_dir: None,
            exclude_playlists: Vec::new(),
            only_my_playlists: false,
            sort_by_release_date: Vec::new(),
            spotify: None,
            download: DownloadConfig::default(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            audio_format: "mp3".to_string(),
            search_results: 10,
            searches_per_minute: 30,
            track_page_size: 20,
            playlist_page_size: 50,
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err(format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .wrap_err(format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if config.download.workers == 0 {
            return Err(eyre!("download.workers must be at least 1"));
        }
        // Asset paths under these dirs are written into snapshot records.
        if breaks_record(&config.music_dir) {
            return Err(eyre!("music_dir must not contain '|' or line breaks"));
        }
        if config.playlist_dir.as_deref().is_some_and(breaks_record) {
            return Err(eyre!("playlist_dir must not contain '|' or line breaks"));
        }
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("music-mirror").join("config.toml"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or_eyre("Config file not found")?;

        Self::from_file(&config_path)
    }

    /// Write the default config, leaving an existing file alone.
    pub fn create_default() -> Result<PathBuf> {
        let config_path = Self::config_path().ok_or_eyre("No config directory on this system")?;
        if config_path.exists() {
            tracing::info!("Config already exists at {}", config_path.display());
            return Ok(config_path);
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err(format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Config::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .wrap_err(format!("Failed to write {}", config_path.display()))?;

        Ok(config_path)
    }

    /// Root of the mirrored tracks, the snapshot and the failure report.
    pub fn music_dir(&self) -> PathBuf {
        expand_path(&self.music_dir)
    }

    pub fn playlist_dir(&self) -> PathBuf {
        match &self.playlist_dir {
            Some(dir) => expand_path(dir),
            None => self.music_dir(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.music_dir().join(SNAPSHOT_FILE)
    }

    pub fn failure_report_path(&self) -> PathBuf {
        self.music_dir().join(FAILURE_REPORT_FILE)
    }

    /// Spotify credentials, with environment variables filling in whatever
    /// the config file leaves out.
    pub fn spotify_credentials(&self) -> SpotifyCredentials {
        self.spotify_credentials_with(|name| std::env::var(name).ok())
    }

    fn spotify_credentials_with(&self, env: impl Fn(&str) -> Option<String>) -> SpotifyCredentials {
        let configured = self.spotify.clone().unwrap_or_default();
        SpotifyCredentials {
            client_id: configured.client_id.or_else(|| env("SPOTIFY_CLIENT_ID")),
            client_secret: configured
                .client_secret
                .or_else(|| env("SPOTIFY_CLIENT_SECRET")),
            refresh_token: configured
                .refresh_token
                .or_else(|| env("SPOTIFY_REFRESH_TOKEN")),
            access_token: configured
                .access_token
                .or_else(|| env("SPOTIFY_ACCESS_TOKEN")),
        }
    }
}
