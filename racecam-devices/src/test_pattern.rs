//! Synthetic cameras for rehearsing an event without hardware.
//!
//! `TestPatternFramework::new(n)` exposes `n` numbered virtual devices at
//! `testpattern://1` .. `testpattern://n`, each drawing scrolling colour
//! bars. Devices can be unplugged and plugged back in at runtime to
//! exercise recovery.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use racecam_core::models::device_config::{DeviceConfig, FrameworkType, Mode, PixelFormat};
use racecam_core::models::error::CaptureError;
use racecam_core::models::frame::Frame;
use racecam_core::traits::capture_device::CaptureDevice;
use racecam_core::traits::framework::DeviceFramework;

use crate::playback::{FrameGenerator, PlaybackDevice, PlaybackSource};

pub const SCHEME: &str = "testpattern://";

const BARS: [[u8; 3]; 7] = [
    [192, 192, 192],
    [192, 192, 0],
    [0, 192, 192],
    [0, 192, 0],
    [192, 0, 192],
    [192, 0, 0],
    [0, 0, 192],
];

const SUPPORTED: [(u32, u32, f32); 5] = [
    (640, 480, 30.0),
    (1280, 720, 30.0),
    (1280, 720, 60.0),
    (1920, 1080, 30.0),
    (3840, 2160, 30.0),
];

/// Which virtual devices are currently plugged in.
#[derive(Default)]
struct Ports {
    unplugged: RwLock<HashSet<u32>>,
}

impl Ports {
    fn is_plugged(&self, number: u32) -> bool {
        !self.unplugged.read().contains(&number)
    }
}

pub struct TestPatternFramework {
    count: u32,
    ports: Arc<Ports>,
}

impl TestPatternFramework {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            ports: Arc::new(Ports::default()),
        }
    }

    pub fn device_path(number: u32) -> String {
        format!("{}{}", SCHEME, number)
    }

    /// Simulate pulling the cable: running devices stop delivering and new
    /// opens fail with `DeviceNotAvailable`.
    pub fn unplug(&self, number: u32) {
        log::info!("unplugging {}", Self::device_path(number));
        self.ports.unplugged.write().insert(number);
    }

    pub fn plug(&self, number: u32) {
        log::info!("plugging in {}", Self::device_path(number));
        self.ports.unplugged.write().remove(&number);
    }

    pub fn supported_modes() -> Vec<Mode> {
        SUPPORTED
            .iter()
            .map(|&(width, height, frame_rate)| Mode {
                width,
                height,
                frame_rate,
                pixel_format: PixelFormat::Rgb24,
                framework: FrameworkType::TestPattern,
            })
            .collect()
    }

    pub fn default_mode() -> Mode {
        Mode {
            width: 640,
            height: 480,
            frame_rate: 30.0,
            pixel_format: PixelFormat::Rgb24,
            framework: FrameworkType::TestPattern,
        }
    }

    fn device_number(&self, config: &DeviceConfig) -> Result<u32, CaptureError> {
        let number = config
            .platform_path
            .as_deref()
            .and_then(|p| p.strip_prefix(SCHEME))
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| {
                CaptureError::ConfigurationFailed(format!(
                    "{} is not a test pattern device",
                    config.name
                ))
            })?;
        if number == 0 || number > self.count {
            return Err(CaptureError::DeviceNotAvailable);
        }
        Ok(number)
    }
}

impl DeviceFramework for TestPatternFramework {
    fn framework_type(&self) -> FrameworkType {
        FrameworkType::TestPattern
    }

    fn is_available(&self) -> bool {
        self.count > 0
    }

    fn enumerate(&self) -> Result<Vec<DeviceConfig>, CaptureError> {
        Ok((1..=self.count)
            .filter(|&n| self.ports.is_plugged(n))
            .map(|n| {
                let mut config = DeviceConfig::new(format!("Test Pattern {}", n), Self::default_mode());
                config.platform_path = Some(Self::device_path(n));
                config
            })
            .collect())
    }

    fn create_device(&self, config: &DeviceConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        let number = self.device_number(config)?;
        let supported = Self::supported_modes().iter().any(|m| {
            m.width == config.mode.width
                && m.height == config.mode.height
                && m.frame_rate == config.mode.frame_rate
        });
        if !supported {
            return Err(CaptureError::UnsupportedMode(format!(
                "{}x{}@{}",
                config.mode.width, config.mode.height, config.mode.frame_rate
            )));
        }

        let source = TestPattern {
            number,
            width: config.mode.width,
            height: config.mode.height,
            ports: Arc::clone(&self.ports),
        };
        Ok(Box::new(PlaybackDevice::new(
            source,
            format!("racecam-pattern-{}", number),
            &config.mode,
        )))
    }

    fn modes(&self, config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError> {
        self.device_number(config)?;
        Ok(Self::supported_modes())
    }
}

pub struct TestPattern {
    number: u32,
    width: u32,
    height: u32,
    ports: Arc<Ports>,
}

impl PlaybackSource for TestPattern {
    fn open(&self) -> Result<Box<dyn FrameGenerator>, CaptureError> {
        if !self.ports.is_plugged(self.number) {
            return Err(CaptureError::DeviceNotAvailable);
        }
        Ok(Box::new(Bars {
            number: self.number,
            width: self.width,
            height: self.height,
            ports: Arc::clone(&self.ports),
        }))
    }
}

struct Bars {
    number: u32,
    width: u32,
    height: u32,
    ports: Arc<Ports>,
}

impl Bars {
    /// One row of bars, scrolled left by `shift` pixels.
    fn row(&self, shift: usize) -> Vec<u8> {
        let width = self.width as usize;
        let bar_width = (width / BARS.len()).max(1);
        let mut row = Vec::with_capacity(width * 3);
        for x in 0..width {
            let bar = ((x + shift) / bar_width) % BARS.len();
            row.extend_from_slice(&BARS[bar]);
        }
        row
    }
}

impl FrameGenerator for Bars {
    fn next_frame(&mut self, index: u64) -> Option<Frame> {
        if !self.ports.is_plugged(self.number) {
            return None;
        }
        let row = self.row(index as usize);
        let data = row.repeat(self.height as usize);
        Some(Frame {
            index,
            captured_at: Utc::now(),
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::Rgb24,
            data: Arc::from(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use racecam_core::enumeration::mode_select::pick_best_mode;

    use super::*;
    use crate::playback::testing::Sink;

    fn camera(number: u32) -> DeviceConfig {
        let mut config = DeviceConfig::new(format!("Cam {}", number), TestPatternFramework::default_mode());
        config.platform_path = Some(TestPatternFramework::device_path(number));
        config
    }

    fn wait_disconnected(device: &dyn CaptureDevice) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while device.is_connected() {
            assert!(Instant::now() < deadline, "device never disconnected");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn enumerates_numbered_devices() {
        let framework = TestPatternFramework::new(3);
        let configs = framework.enumerate().unwrap();
        let paths: Vec<_> = configs.iter().filter_map(|c| c.platform_path.clone()).collect();
        assert_eq!(
            paths,
            vec!["testpattern://1", "testpattern://2", "testpattern://3"]
        );

        framework.unplug(2);
        assert_eq!(framework.enumerate().unwrap().len(), 2);
        assert!(!TestPatternFramework::new(0).is_available());
    }

    #[test]
    fn out_of_range_device_is_not_available() {
        let framework = TestPatternFramework::new(2);
        let err = framework.create_device(&camera(3)).err().unwrap();
        assert_eq!(err, CaptureError::DeviceNotAvailable);
        assert!(err.is_transient());

        let mut foreign = camera(1);
        foreign.platform_path = Some("/dev/video0".into());
        assert!(matches!(
            framework.create_device(&foreign).err(),
            Some(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let mut config = camera(1);
        config.mode.width = 1000;
        assert!(matches!(
            TestPatternFramework::new(1).create_device(&config).err(),
            Some(CaptureError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn best_mode_is_full_hd() {
        let framework = TestPatternFramework::new(1);
        let best = pick_best_mode(&framework.modes(&camera(1)).unwrap()).unwrap();
        assert_eq!((best.width, best.height), (1920, 1080));
    }

    #[test]
    fn draws_rgb_frames() {
        let framework = TestPatternFramework::new(1);
        let mut device = framework.create_device(&camera(1)).unwrap();
        let sink = Arc::new(Sink::default());
        device.start(sink.callback()).unwrap();
        sink.wait_for(2);
        device.stop().unwrap();

        let frame = sink.last.lock().clone().unwrap();
        assert_eq!(frame.pixel_format, PixelFormat::Rgb24);
        assert_eq!(frame.data.len(), 640 * 480 * 3);
    }

    #[test]
    fn bars_scroll_with_frame_index() {
        let bars = Bars {
            number: 1,
            width: 14,
            height: 1,
            ports: Arc::new(Ports::default()),
        };
        assert_eq!(&bars.row(0)[..3], &BARS[0]);
        assert_eq!(&bars.row(2)[..3], &BARS[1]);
        assert_eq!(bars.row(0).len(), 14 * 3);
    }

    #[test]
    fn unplug_disconnects_and_replug_recovers() {
        let framework = TestPatternFramework::new(1);
        let mut device = framework.create_device(&camera(1)).unwrap();
        let sink = Arc::new(Sink::default());
        device.start(sink.callback()).unwrap();
        sink.wait_for(1);

        framework.unplug(1);
        wait_disconnected(device.as_ref());
        assert_eq!(
            device.start(sink.callback()).err(),
            Some(CaptureError::DeviceNotAvailable)
        );

        framework.plug(1);
        device.start(sink.callback()).unwrap();
        assert!(device.is_connected());
        device.stop().unwrap();
    }

    #[test]
    fn records_pattern_frames() {
        let dir = tempfile::tempdir().unwrap();
        let framework = TestPatternFramework::new(1);
        let mut device = framework.create_device(&camera(1)).unwrap();
        let sink = Arc::new(Sink::default());
        device.start(sink.callback()).unwrap();

        let output = dir.path().join("heat-1").join("Cam_1.raw");
        device.start_recording(&output).unwrap();
        let target = sink.count() + 3;
        sink.wait_for(target);
        device.stop_recording().unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while device.is_recording() {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(device.frame_times().len() >= 2);
        assert_eq!(device.recording_extension(), "raw");
        assert!(output.metadata().unwrap().len() > 0);
        device.stop().unwrap();
    }
}
