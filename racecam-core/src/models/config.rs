use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Configuration for an [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Root directory for race recordings (`<root>/<race_id>/...`).
    pub recordings_dir: PathBuf,

    /// Minimum delay before a failed device is retried (default: 5000 ms).
    pub retry_delay_ms: u64,

    /// Worker wait between cycles while idle (default: 1000 ms).
    pub idle_wait_ms: u64,

    /// Worker wait while a recording is finalizing (default: 50 ms).
    pub finalizing_wait_ms: u64,

    /// Restart disconnected sources automatically (default: true).
    pub maintain_connections: bool,

    /// Pause sources nobody is looking at (default: true).
    pub auto_pause: bool,

    /// Maximum number of recorded video files kept on disk (default: 200).
    pub max_recordings: usize,

    /// How long shutdown waits for the worker thread (default: 10000 ms).
    pub shutdown_timeout_ms: u64,

    /// Extensions counted as video files by retention cleanup.
    pub video_extensions: Vec<String>,
}

impl OrchestratorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::StorageError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.retry_delay_ms == 0 {
            return Err("retry delay must be positive".into());
        }
        if self.idle_wait_ms == 0 || self.finalizing_wait_ms == 0 {
            return Err("worker wait intervals must be positive".into());
        }
        if self.max_recordings == 0 {
            return Err("max recordings must be at least 1".into());
        }
        if self.video_extensions.is_empty() {
            return Err("at least one video extension is required".into());
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    pub fn finalizing_wait(&self) -> Duration {
        Duration::from_millis(self.finalizing_wait_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recordings_dir: PathBuf::from("videos"),
            retry_delay_ms: 5000,
            idle_wait_ms: 1000,
            finalizing_wait_ms: 50,
            maintain_connections: true,
            auto_pause: true,
            max_recordings: 200,
            shutdown_timeout_ms: 10_000,
            video_extensions: ["mp4", "mkv", "avi", "wmv", "ts", "raw"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_retention() {
        let config = OrchestratorConfig {
            max_recordings: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.json");
        fs::write(&path, r#"{ "max_recordings": 12, "auto_pause": false }"#).unwrap();

        let config = OrchestratorConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_recordings, 12);
        assert!(!config.auto_pause);
        assert_eq!(config.retry_delay_ms, 5000);
    }

    #[test]
    fn invalid_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.json");
        fs::write(&path, r#"{ "retry_delay_ms": 0 }"#).unwrap();

        assert!(matches!(
            OrchestratorConfig::from_json_file(&path),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }
}
