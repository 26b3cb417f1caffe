use std::fmt;

use serde::{Deserialize, Serialize};

use super::device_config::DeviceConfig;

/// Stable identity of a physical or virtual device.
///
/// Derived from a [`DeviceConfig`] in priority order: file path, stream id,
/// platform path, device name. Used for de-duplication and failure tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn resolve(config: &DeviceConfig) -> Self {
        if let Some(path) = config.file_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            return Self(format!("file:{}", path.to_string_lossy()));
        }
        if let Some(id) = non_blank(config.stream_id.as_deref()) {
            return Self(format!("stream:{}", id));
        }
        if let Some(path) = non_blank(config.platform_path.as_deref()) {
            return Self(format!("dev:{}", path));
        }
        Self(format!("name:{}", config.name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::models::device_config::{FrameworkType, Mode, PixelFormat};

    fn config(name: &str) -> DeviceConfig {
        DeviceConfig::new(
            name,
            Mode {
                width: 640,
                height: 480,
                frame_rate: 30.0,
                pixel_format: PixelFormat::Yuy2,
                framework: FrameworkType::V4l2,
            },
        )
    }

    #[test]
    fn priority_order() {
        let mut c = config("CamA");
        assert_eq!(DeviceKey::resolve(&c).as_str(), "name:CamA");

        c.platform_path = Some("/dev/camA".into());
        assert_eq!(DeviceKey::resolve(&c).as_str(), "dev:/dev/camA");

        c.stream_id = Some("rtsp-7".into());
        assert_eq!(DeviceKey::resolve(&c).as_str(), "stream:rtsp-7");

        c.file_path = Some(PathBuf::from("/videos/heat1.mp4"));
        assert_eq!(DeviceKey::resolve(&c).as_str(), "file:/videos/heat1.mp4");
    }

    #[test]
    fn blank_fields_are_skipped() {
        let mut c = config("CamB");
        c.stream_id = Some("  ".into());
        c.platform_path = Some(String::new());
        c.file_path = Some(PathBuf::new());
        assert_eq!(DeviceKey::resolve(&c).as_str(), "name:CamB");
    }

    #[test]
    fn stable_across_edits_to_other_fields() {
        let mut c = config("CamA");
        c.platform_path = Some("/dev/camA".into());
        let before = DeviceKey::resolve(&c);

        c.name = "Renamed".into();
        c.record_for_replay = true;
        c.mode.frame_rate = 60.0;
        assert_eq!(DeviceKey::resolve(&c), before);
    }
}
