//! Configuration file parser for podmerge.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which carries the paths and URLs of the davanac podcast publishing setup.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::ChannelPolicy;
use crate::util::validate_http_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

const DEFAULT_DESCRIPTION: &str = "Veille quotidienne sur la liberté numérique

2-3 épisodes par jour :
→ Analyses tech/politique/surveillance
→ Des pistes d'action concrètes et des trajectoires possibles à expérimenter
→ Ce que j'explore en coulisses (projets, échecs, apprentissages)

Philosophie : Comprendre les systèmes avant de s'en libérer.
Pas de panique. Pas de défaitisme. De la lucidité. De l'action.

Newsletter hebdo + Discord : https://da.van.ac";

/// Everything a merge run needs to know.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Relative paths are resolved against the working directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the legacy feed is downloaded from.
    pub legacy_feed_url: String,

    /// Local copy of the legacy feed; overwritten by each download.
    pub legacy_path: PathBuf,

    /// The current feed, generated elsewhere.
    pub current_path: PathBuf,

    /// The merged feed written by the run.
    pub output_path: PathBuf,

    /// Public URL of the merged feed, written into `atom:link rel="self"`.
    pub self_link_url: String,

    /// Canonical channel description.
    pub description: String,

    /// `itunes:author` used when the legacy channel has none.
    pub default_author: String,

    /// Timeout for the legacy feed download, in seconds.
    pub fetch_timeout_secs: u64,

    /// Skip the download and merge the existing local legacy file.
    pub skip_fetch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            legacy_feed_url: "https://anchor.fm/s/9090b10/podcast/rss".to_string(),
            legacy_path: PathBuf::from("anchor_rss_backup.xml"),
            current_path: PathBuf::from("podcast.rss"),
            output_path: PathBuf::from("podcast_merged.rss"),
            self_link_url: "https://davanac.github.io/podcast-rss/podcast_merged.rss"
                .to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            default_author: "Damien Van Achter (davanac)".to_string(),
            fetch_timeout_secs: 30,
            skip_fetch: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "legacy_feed_url",
        "legacy_path",
        "current_path",
        "output_path",
        "self_link_url",
        "description",
        "default_author",
        "fetch_timeout_secs",
        "skip_fetch",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// The loaded values are not checked here; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), output = %config.output_path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Rejects values a run cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.skip_fetch {
            validate_http_url(&self.legacy_feed_url).map_err(|e| ConfigError::Invalid {
                key: "legacy_feed_url",
                reason: e.to_string(),
            })?;
        }
        validate_http_url(&self.self_link_url).map_err(|e| ConfigError::Invalid {
            key: "self_link_url",
            reason: e.to_string(),
        })?;
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// The fixed channel values this configuration writes.
    pub fn channel_policy(&self) -> ChannelPolicy {
        ChannelPolicy {
            description: self.description.clone(),
            self_link_url: self.self_link_url.clone(),
            default_author: self.default_author.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
