//! Persistent client configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Spectrum display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Number of frequency bands drawn
    pub bars: usize,
    /// Delay between frames in milliseconds
    pub frame_ms: u64,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            bars: 32,
            frame_ms: 33,
        }
    }
}

/// Upper bound on drawn bands
pub const MAX_BARS: usize = 256;

impl VisualizerConfig {
    /// `bars` clamped to 1..=MAX_BARS
    pub fn bar_count(&self) -> usize {
        self.bars.clamp(1, MAX_BARS)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the processing backend
    pub server_url: String,
    /// Seconds between background task refreshes (0 disables polling)
    pub poll_interval_secs: u64,
    /// Per-request timeout for the task API
    pub request_timeout_secs: u64,
    /// Input device name; the host default is used when unset
    pub input_device: Option<String>,
    pub visualizer: VisualizerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            poll_interval_secs: 30,
            request_timeout_secs: 30,
            input_device: None,
            visualizer: VisualizerConfig::default(),
        }
    }
}

impl Config {
    /// ~/.config/voice-tasks/config.json (platform equivalent elsewhere)
    pub fn default_path() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("voice-tasks");
        p.push("config.json");
        p
    }

    /// Load from disk, falling back to defaults if the file is missing or invalid.
    pub fn load(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("No config at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Persist to disk, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Server URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json"));
        assert_eq!(config.server_url, "http://127.0.0.1:5000");
        assert_eq!(config.visualizer.bars, 32);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            server_url: "http://tasks.local:8080/".to_string(),
            poll_interval_secs: 0,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path);
        assert_eq!(loaded.base_url(), "http://tasks.local:8080");
        assert!(loaded.poll_interval().is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"visualizer":{"bars":8}}"#).unwrap();

        let config = Config::load(&path);
        assert_eq!(config.visualizer.bars, 8);
        assert_eq!(config.visualizer.frame_ms, 33);
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_visualizer_limits() {
        let huge = VisualizerConfig {
            bars: 65_536,
            frame_ms: 0,
        };
        assert_eq!(huge.bar_count(), MAX_BARS);
        assert_eq!(huge.frame_interval(), Duration::from_millis(1));

        let none = VisualizerConfig {
            bars: 0,
            ..Default::default()
        };
        assert_eq!(none.bar_count(), 1);
    }

    #[test]
    fn test_invalid_json_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let config = Config::load(&path);
        assert_eq!(config.request_timeout_secs, 30);
    }
}
