use super::device_config::{DeviceConfig, FrameworkType};

/// Outcome of checking a device against the hardware/driver allow/deny list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Allowed,
    Denied { reason: String },
}

/// A device offered for selection in the device editor.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableDevice {
    /// Config as reported by the first framework that found the device.
    pub config: DeviceConfig,

    /// Every framework that reported this physical device.
    pub frameworks: Vec<FrameworkType>,

    /// Hardware path fragment used to match the device across frameworks.
    pub hardware_token: Option<String>,

    /// Set when only one framework claims the device's USB port. Cleared
    /// when the match across frameworks is ambiguous.
    pub exclusive_usb_port: bool,

    pub validity: Validity,
}

impl AvailableDevice {
    /// Denied devices are listed but cannot be selected.
    pub fn is_selectable(&self) -> bool {
        matches!(self.validity, Validity::Allowed)
    }
}
