use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Errors that can occur while discovering, starting or recording from
/// capture devices.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device busy: {0}")]
    DeviceBusy(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid media: {0}")]
    InvalidMedia(String),

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("timeout")]
    Timeout,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether retrying the same device later may succeed.
    ///
    /// Transient failures put the device key into cooldown. Invalid media
    /// and unsupported modes fail the same way every time and are not
    /// retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::DeviceNotAvailable
            | Self::DeviceBusy(_)
            | Self::PermissionDenied
            | Self::Platform(_)
            | Self::Timeout
            | Self::Unknown(_) => true,
            Self::InvalidMedia(_)
            | Self::UnsupportedMode(_)
            | Self::ConfigurationFailed(_)
            | Self::InvalidState(_)
            | Self::StorageError(_) => false,
        }
    }
}

/// Run backend code, reporting a panic as a transient platform error.
pub(crate) fn isolate<T, F>(what: &str, f: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> Result<T, CaptureError>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("{} panicked", what);
        Err(CaptureError::Platform(format!("{} panicked", what)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_failures_are_transient() {
        assert!(CaptureError::DeviceBusy("in use".into()).is_transient());
        assert!(CaptureError::DeviceNotAvailable.is_transient());
        assert!(CaptureError::Platform("driver".into()).is_transient());
    }

    #[test]
    fn format_failures_are_not_retried() {
        assert!(!CaptureError::InvalidMedia("truncated".into()).is_transient());
        assert!(!CaptureError::UnsupportedMode("8K".into()).is_transient());
    }

    #[test]
    fn panic_becomes_transient_platform_error() {
        let result: Result<(), _> = isolate("driver open", || panic!("driver blew up"));
        let err = result.unwrap_err();
        assert_eq!(err, CaptureError::Platform("driver open panicked".into()));
        assert!(err.is_transient());

        assert_eq!(isolate("driver open", || Ok(3)), Ok(3));
    }
}
