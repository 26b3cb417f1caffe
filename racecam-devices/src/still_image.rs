//! Static images shown as frame sources (start grids, sponsor slides).
//!
//! The image is decoded once per start and re-emitted as RGB frames at the
//! mode's frame rate. Pausing saves nothing and a still cannot be recorded
//! for replay.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use image::{ImageError, ImageReader};

use racecam_core::models::device_config::{DeviceConfig, FrameworkType, Mode, PixelFormat};
use racecam_core::models::error::CaptureError;
use racecam_core::models::frame::Frame;
use racecam_core::traits::capture_device::CaptureDevice;
use racecam_core::traits::framework::DeviceFramework;

use crate::library;
use crate::playback::{FrameGenerator, PlaybackDevice, PlaybackSource};

pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct StillImageFramework {
    library_dir: Option<PathBuf>,
    extensions: Vec<String>,
}

impl Default for StillImageFramework {
    fn default() -> Self {
        Self {
            library_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl StillImageFramework {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn default_mode() -> Mode {
        Mode {
            width: 1920,
            height: 1080,
            frame_rate: 1.0,
            pixel_format: PixelFormat::Rgb24,
            framework: FrameworkType::StillImage,
        }
    }

    fn image_path(&self, config: &DeviceConfig) -> Result<PathBuf, CaptureError> {
        let path = config.file_path.clone().ok_or_else(|| {
            CaptureError::ConfigurationFailed(format!("{} has no file path", config.name))
        })?;
        if !library::has_extension(&path, &self.extensions) {
            return Err(CaptureError::InvalidMedia(format!(
                "{} is not a supported image",
                path.display()
            )));
        }
        if !path.is_file() {
            return Err(CaptureError::InvalidMedia(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }
}

impl DeviceFramework for StillImageFramework {
    fn framework_type(&self) -> FrameworkType {
        FrameworkType::StillImage
    }

    fn is_available(&self) -> bool {
        true
    }

    fn enumerate(&self) -> Result<Vec<DeviceConfig>, CaptureError> {
        let Some(dir) = &self.library_dir else {
            return Ok(Vec::new());
        };
        Ok(library::scan(dir, &self.extensions)?
            .into_iter()
            .map(|path| library::file_config(path, Self::default_mode()))
            .collect())
    }

    fn create_device(&self, config: &DeviceConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let path = self.image_path(config)?;
        let source = StillImage { path };
        Ok(Box::new(PlaybackDevice::new(source, "racecam-still", &config.mode)))
    }

    /// The image's own size, read from its header.
    fn modes(&self, config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError> {
        let path = self.image_path(config)?;
        let (width, height) = open_reader(&path)?
            .into_dimensions()
            .map_err(|e| invalid(&path, e))?;
        Ok(vec![Mode {
            width,
            height,
            frame_rate: config.mode.frame_rate,
            pixel_format: PixelFormat::Rgb24,
            framework: FrameworkType::StillImage,
        }])
    }
}

pub struct StillImage {
    path: PathBuf,
}

impl PlaybackSource for StillImage {
    fn open(&self) -> Result<Box<dyn FrameGenerator>, CaptureError> {
        let rgb = open_reader(&self.path)?
            .decode()
            .map_err(|e| invalid(&self.path, e))?
            .into_rgb8();
        let (width, height) = rgb.dimensions();
        log::info!("showing {} ({}x{})", self.path.display(), width, height);
        Ok(Box::new(Repeat {
            data: Arc::from(rgb.into_raw()),
            width,
            height,
        }))
    }

    fn can_pause(&self) -> bool {
        false
    }

    fn can_record(&self) -> bool {
        false
    }
}

/// Reader with the format taken from the file contents, not the extension.
fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, CaptureError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| {
            CaptureError::InvalidMedia(format!("failed to read {}: {}", path.display(), e))
        })
}

fn invalid(path: &Path, e: ImageError) -> CaptureError {
    CaptureError::InvalidMedia(format!("{}: {}", path.display(), e))
}

struct Repeat {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl FrameGenerator for Repeat {
    fn next_frame(&mut self, index: u64) -> Option<Frame> {
        Some(Frame {
            index,
            captured_at: Utc::now(),
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::Rgb24,
            data: Arc::clone(&self.data),
        })
    }
}
