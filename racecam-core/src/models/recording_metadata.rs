use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::device_config::DeviceConfig;
use super::frame::FrameTime;

/// Sidecar metadata written next to every recorded video file.
///
/// Read back to reconstruct the replays available for a race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub race_id: String,
    pub device: DeviceConfig,
    pub video_path: PathBuf,
    pub created_at: String,
    pub frame_times: Vec<FrameTime>,
}

impl RecordingMetadata {
    pub fn new(
        race_id: &str,
        device: DeviceConfig,
        video_path: PathBuf,
        frame_times: Vec<FrameTime>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            race_id: race_id.to_string(),
            device,
            video_path,
            created_at: chrono::Utc::now().to_rfc3339(),
            frame_times,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_times.last().map(|t| t.seconds).unwrap_or(0.0)
    }
}
