use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Device framework that reported (and can open) a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkType {
    DirectShow,
    MediaFoundation,
    V4l2,
    AvFoundation,
    MediaFile,
    StillImage,
    TestPattern,
}

/// Pixel layout delivered by a capture mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Nv12,
    Yuy2,
    Rgb24,
    Rgba,
    Mjpeg,
    H264,
    Unknown,
}

impl PixelFormat {
    /// Preference when choosing between otherwise equal modes. Higher wins.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Nv12 => 5,
            Self::Yuy2 => 4,
            Self::Rgba | Self::Rgb24 => 3,
            Self::Mjpeg => 2,
            Self::H264 => 1,
            Self::Unknown => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A capture mode supported by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,
    pub pixel_format: PixelFormat,
    pub framework: FrameworkType,
}

impl Mode {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// What a region of the raw frame shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewRole {
    /// A competitor's FPV video feed, mapped to a timing channel.
    Fpv { channel: u16 },
    Launch,
    FinishLine,
    Commentator,
    Other,
}

/// A sub-region of the raw frame mapped to a logical channel or camera role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewBounds {
    pub role: ViewRole,
    pub region: Rect,
}

/// Desired state of one capture device, as edited by the configuration layer.
///
/// Compared by value when a new device list is submitted: an unchanged
/// config keeps its live source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,

    /// Set for file-backed sources (video files, still images).
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Set for network streams.
    #[serde(default)]
    pub stream_id: Option<String>,

    /// Platform device path (e.g. a `/dev/video*` node or a DirectShow
    /// moniker).
    #[serde(default)]
    pub platform_path: Option<String>,

    pub mode: Mode,

    #[serde(default)]
    pub record_for_replay: bool,

    #[serde(default)]
    pub record_resolution: Option<Resolution>,

    #[serde(default)]
    pub record_frame_rate: Option<f32>,

    /// Allow auto-pause while no view of this source is on screen.
    #[serde(default = "default_true")]
    pub pause_when_hidden: bool,

    #[serde(default)]
    pub views: Vec<ViewBounds>,
}

fn default_true() -> bool {
    true
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            file_path: None,
            stream_id: None,
            platform_path: None,
            mode,
            record_for_replay: false,
            record_resolution: None,
            record_frame_rate: None,
            pause_when_hidden: true,
            views: Vec::new(),
        }
    }

    /// True when every view of this source is a competitor FPV feed.
    pub fn is_fpv_only(&self) -> bool {
        !self.views.is_empty()
            && self
                .views
                .iter()
                .all(|v| matches!(v.role, ViewRole::Fpv { .. }))
    }

    pub fn framework(&self) -> FrameworkType {
        self.mode.framework
    }
}
