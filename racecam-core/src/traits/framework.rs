use crate::models::device_config::{DeviceConfig, FrameworkType, Mode};
use crate::models::error::CaptureError;
use crate::traits::capture_device::CaptureDevice;

/// A platform device framework: enumerates devices and opens them.
///
/// Treated as a pluggable capability. Implemented by:
/// - `MediaFileFramework`, `StillImageFramework`, `TestPatternFramework`
///   (racecam-devices)
/// - Future: DirectShow, Media Foundation, V4L2 backends
pub trait DeviceFramework: Send + Sync {
    fn framework_type(&self) -> FrameworkType;

    /// Whether the framework can be used on this machine.
    fn is_available(&self) -> bool;

    /// Devices currently visible to this framework.
    fn enumerate(&self) -> Result<Vec<DeviceConfig>, CaptureError>;

    /// Instantiate a backend for `config`.
    ///
    /// Returns a non-transient error (see [`CaptureError::is_transient`])
    /// when the media or mode can never work.
    fn create_device(&self, config: &DeviceConfig) -> Result<Box<dyn CaptureDevice>, CaptureError>;

    /// Capture modes supported by the device behind `config`.
    fn modes(&self, config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError>;
}
