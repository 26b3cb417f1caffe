//! Video files played back as frame sources.
//!
//! Files are not decoded: the container is split into fixed-size packets
//! that are delivered at the configured frame rate, looping at the end.
//! Enough to rehearse an event with pre-recorded footage.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use racecam_core::models::device_config::{DeviceConfig, FrameworkType, Mode, PixelFormat};
use racecam_core::models::error::CaptureError;
use racecam_core::models::frame::Frame;
use racecam_core::traits::capture_device::CaptureDevice;
use racecam_core::traits::framework::DeviceFramework;

use crate::library;
use crate::playback::{FrameGenerator, PlaybackDevice, PlaybackSource};

pub const DEFAULT_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "wmv", "ts", "mov"];

/// Packet size for files played back without a known frame size.
pub const DEFAULT_PACKET_SIZE: usize = 64 * 1024;

/// Framework for video files on disk.
pub struct MediaFileFramework {
    library_dir: Option<PathBuf>,
    extensions: Vec<String>,
    packet_size: usize,
    looping: bool,
}

impl Default for MediaFileFramework {
    fn default() -> Self {
        Self {
            library_dir: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            packet_size: DEFAULT_PACKET_SIZE,
            looping: true,
        }
    }
}

impl MediaFileFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate the video files in `dir`.
    pub fn with_library(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size.max(1);
        self
    }

    /// Stop at end of file instead of starting over. The source then
    /// reports itself disconnected.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn default_mode() -> Mode {
        Mode {
            width: 1920,
            height: 1080,
            frame_rate: 30.0,
            pixel_format: PixelFormat::H264,
            framework: FrameworkType::MediaFile,
        }
    }

    fn media_path(&self, config: &DeviceConfig) -> Result<PathBuf, CaptureError> {
        let path = config.file_path.clone().ok_or_else(|| {
            CaptureError::ConfigurationFailed(format!("{} has no file path", config.name))
        })?;
        if !library::has_extension(&path, &self.extensions) {
            return Err(CaptureError::InvalidMedia(format!(
                "{} is not a supported video file",
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

impl DeviceFramework for MediaFileFramework {
    fn framework_type(&self) -> FrameworkType {
        FrameworkType::MediaFile
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
        let path = self.media_path(config)?;
        let source = MediaFile {
            path,
            mode: config.mode.clone(),
            packet_size: self.packet_size,
            looping: self.looping,
        };
        Ok(Box::new(PlaybackDevice::new(source, "racecam-media", &config.mode)))
    }

    fn modes(&self, config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError> {
        self.media_path(config)?;
        let mut mode = config.mode.clone();
        mode.framework = FrameworkType::MediaFile;
        Ok(vec![mode])
    }
}

/// One video file.
pub struct MediaFile {
    path: PathBuf,
    mode: Mode,
    packet_size: usize,
    looping: bool,
}

impl MediaFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlaybackSource for MediaFile {
    fn open(&self) -> Result<Box<dyn FrameGenerator>, CaptureError> {
        let packets = Packets::open(&self.path, self.packet_size, self.looping, self.mode.clone())?;
        log::info!(
            "playing {} ({} bytes, {} fps)",
            self.path.display(),
            packets.len,
            self.mode.frame_rate
        );
        Ok(Box::new(packets))
    }
}

/// Fixed-size packets streamed from the file, one per frame.
struct Packets {
    path: PathBuf,
    reader: BufReader<File>,
    len: u64,
    packet_size: usize,
    looping: bool,
    mode: Mode,
}

impl Packets {
    fn open(path: &Path, packet_size: usize, looping: bool, mode: Mode) -> Result<Self, CaptureError> {
        let invalid = |e: io::Error| {
            CaptureError::InvalidMedia(format!("failed to read {}: {}", path.display(), e))
        };
        let file = File::open(path).map_err(invalid)?;
        let len = file.metadata().map_err(invalid)?.len();
        if len == 0 {
            return Err(CaptureError::InvalidMedia(format!("{} is empty", path.display())));
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            len,
            packet_size,
            looping,
            mode,
        })
    }

    /// Up to `packet_size` bytes; empty at end of file.
    fn read_packet(&mut self) -> io::Result<Vec<u8>> {
        let mut packet = Vec::with_capacity(self.packet_size);
        (&mut self.reader)
            .take(self.packet_size as u64)
            .read_to_end(&mut packet)?;
        Ok(packet)
    }

    fn next_packet(&mut self) -> io::Result<Vec<u8>> {
        let packet = self.read_packet()?;
        if !packet.is_empty() || !self.looping {
            return Ok(packet);
        }
        self.reader.seek(SeekFrom::Start(0))?;
        self.read_packet()
    }
}

impl FrameGenerator for Packets {
    fn next_frame(&mut self, index: u64) -> Option<Frame> {
        let packet = match self.next_packet() {
            Ok(packet) if !packet.is_empty() => packet,
            Ok(_) => return None,
            Err(e) => {
                log::warn!("{}: read failed: {}", self.path.display(), e);
                return None;
            }
        };
        Some(Frame {
            index,
            captured_at: Utc::now(),
            width: self.mode.width,
            height: self.mode.height,
            pixel_format: self.mode.pixel_format,
            data: Arc::from(packet),
        })
    }
}
