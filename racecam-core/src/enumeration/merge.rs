use std::sync::Arc;

use crate::enumeration::matcher::HardwareMatcher;
use crate::enumeration::validator::DeviceValidator;
use crate::models::available::{AvailableDevice, Validity};
use crate::models::device_config::{DeviceConfig, FrameworkType};
use crate::traits::framework::DeviceFramework;

/// Merge the devices reported by every available framework.
///
/// Entries from different frameworks sharing a hardware token are one
/// physical device. The first framework to report a device supplies its
/// config; frameworks are consulted in the order given. A device keeps
/// `exclusive_usb_port` only while a single framework reports it.
pub fn merge_available(
    frameworks: &[Arc<dyn DeviceFramework>],
    matcher: &dyn HardwareMatcher,
    validator: &dyn DeviceValidator,
) -> Vec<AvailableDevice> {
    let mut merged: Vec<AvailableDevice> = Vec::new();

    for framework in frameworks {
        if !framework.is_available() {
            continue;
        }
        let framework_type = framework.framework_type();
        let configs = match framework.enumerate() {
            Ok(configs) => configs,
            Err(e) => {
                log::warn!("{:?} enumeration failed: {}", framework_type, e);
                continue;
            }
        };

        for config in configs {
            let token = matcher.hardware_token(&config);
            let existing = token.as_ref().and_then(|t| {
                merged.iter_mut().find(|d| {
                    d.hardware_token.as_ref() == Some(t) && !d.frameworks.contains(&framework_type)
                })
            });

            match existing {
                Some(device) => {
                    if device.config.name != config.name {
                        log::warn!(
                            "ambiguous match on {}: \"{}\" vs \"{}\"",
                            token.as_deref().unwrap_or_default(),
                            device.config.name,
                            config.name
                        );
                    }
                    device.frameworks.push(framework_type);
                    device.exclusive_usb_port = false;
                }
                None => merged.push(new_entry(config, framework_type, token)),
            }
        }
    }

    for device in &mut merged {
        device.validity = validator.validate(&device.config);
    }
    merged
}

fn new_entry(
    config: DeviceConfig,
    framework: FrameworkType,
    token: Option<String>,
) -> AvailableDevice {
    AvailableDevice {
        config,
        frameworks: vec![framework],
        exclusive_usb_port: token.is_some(),
        hardware_token: token,
        validity: Validity::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumeration::matcher::BracketTokenMatcher;
    use crate::enumeration::validator::{AllowDenyList, DenyRule};
    use crate::models::device_config::{Mode, PixelFormat};
    use crate::models::error::CaptureError;
    use crate::traits::capture_device::CaptureDevice;

    struct Listed {
        kind: FrameworkType,
        available: bool,
        devices: Result<Vec<(&'static str, &'static str)>, CaptureError>,
    }

    impl DeviceFramework for Listed {
        fn framework_type(&self) -> FrameworkType {
            self.kind
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn enumerate(&self) -> Result<Vec<DeviceConfig>, CaptureError> {
            let devices = self.devices.clone()?;
            Ok(devices
                .into_iter()
                .map(|(name, path)| {
                    let mut config = DeviceConfig::new(
                        name,
                        Mode {
                            width: 640,
                            height: 480,
                            frame_rate: 30.0,
                            pixel_format: PixelFormat::Yuy2,
                            framework: self.kind,
                        },
                    );
                    config.platform_path = Some(path.into());
                    config
                })
                .collect())
        }

        fn create_device(&self, _config: &DeviceConfig) -> Result<Box<dyn CaptureDevice>, CaptureError> {
            Err(CaptureError::DeviceNotAvailable)
        }

        fn modes(&self, _config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError> {
            Ok(Vec::new())
        }
    }

    fn framework(
        kind: FrameworkType,
        devices: Vec<(&'static str, &'static str)>,
    ) -> Arc<dyn DeviceFramework> {
        Arc::new(Listed {
            kind,
            available: true,
            devices: Ok(devices),
        })
    }

    #[test]
    fn same_device_from_two_frameworks_is_merged() {
        let frameworks = vec![
            framework(FrameworkType::DirectShow, vec![("USB Cam", "ds (port-3)")]),
            framework(FrameworkType::MediaFoundation, vec![("USB Cam", "mf [PORT-3]")]),
        ];
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &AllowDenyList::default());

        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].frameworks,
            vec![FrameworkType::DirectShow, FrameworkType::MediaFoundation]
        );
        assert_eq!(merged[0].config.mode.framework, FrameworkType::DirectShow);
        assert!(!merged[0].exclusive_usb_port);
    }

    #[test]
    fn single_framework_device_is_exclusive() {
        let frameworks = vec![
            framework(FrameworkType::DirectShow, vec![("Cam A", "ds (port-1)")]),
            framework(FrameworkType::MediaFoundation, vec![("Cam B", "mf (port-2)")]),
        ];
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &AllowDenyList::default());

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|d| d.exclusive_usb_port));
    }

    #[test]
    fn tokenless_devices_never_merge() {
        let frameworks = vec![
            framework(FrameworkType::V4l2, vec![("Cam", "/dev/video0")]),
            framework(FrameworkType::MediaFile, vec![("Cam", "/dev/video0")]),
        ];
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &AllowDenyList::default());

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|d| !d.exclusive_usb_port));
    }

    #[test]
    fn same_framework_twice_stays_separate() {
        let frameworks = vec![framework(
            FrameworkType::DirectShow,
            vec![("Cam 1", "a (port-1)"), ("Cam 2", "b (port-1)")],
        )];
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &AllowDenyList::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn unavailable_and_failing_frameworks_are_skipped() {
        let frameworks: Vec<Arc<dyn DeviceFramework>> = vec![
            Arc::new(Listed {
                kind: FrameworkType::AvFoundation,
                available: false,
                devices: Ok(vec![("Hidden", "x (1)")]),
            }),
            Arc::new(Listed {
                kind: FrameworkType::V4l2,
                available: true,
                devices: Err(CaptureError::Platform("sysfs".into())),
            }),
            framework(FrameworkType::DirectShow, vec![("Cam", "ds (port-9)")]),
        ];
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &AllowDenyList::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].config.name, "Cam");
    }

    #[test]
    fn denied_device_is_listed_but_not_selectable() {
        let frameworks = vec![framework(
            FrameworkType::DirectShow,
            vec![("Bad Grabber", "ds (port-4)"), ("Good Cam", "ds (port-5)")],
        )];
        let validator = AllowDenyList {
            allow: vec![],
            deny: vec![DenyRule {
                pattern: "bad grabber".into(),
                reason: "known faulty driver".into(),
            }],
        };
        let merged = merge_available(&frameworks, &BracketTokenMatcher, &validator);

        assert_eq!(merged.len(), 2);
        assert!(!merged[0].is_selectable());
        assert!(matches!(merged[0].validity, Validity::Denied { .. }));
        assert!(merged[1].is_selectable());
    }
}
