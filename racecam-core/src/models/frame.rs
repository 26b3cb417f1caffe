use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_config::PixelFormat;

/// One captured image, shared with the presentation layer without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Arc<[u8]>,
}

/// Timestamp of one recorded frame, relative to the start of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    pub frame: u64,
    pub time: DateTime<Utc>,
    pub seconds: f64,
}

impl FrameTime {
    pub fn relative_to(frame: u64, time: DateTime<Utc>, started: DateTime<Utc>) -> Self {
        let seconds = (time - started)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            frame,
            time,
            seconds,
        }
    }
}
