use std::path::Path;
use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::frame::{Frame, FrameTime};

/// Callback invoked for every captured frame.
///
/// Fires on the device's own capture thread. Keep processing minimal.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync + 'static>;

/// Framework-specific backend for one capture device.
///
/// Implemented by each device framework. The orchestrator wraps every
/// device in a [`FrameSource`](crate::FrameSource) that owns the state
/// machine and only ever calls these methods from its worker thread.
pub trait CaptureDevice: Send {
    /// Acquire the device and start delivering frames via `callback`.
    fn start(&mut self, callback: FrameCallback) -> Result<(), CaptureError>;

    /// Stop capturing. Must not return until the capture thread is gone.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Release device-level handles kept across stop/start.
    fn release(&mut self) {}

    /// Suspend decoding while keeping the device open.
    fn pause(&mut self) -> Result<(), CaptureError>;

    fn unpause(&mut self) -> Result<(), CaptureError>;

    /// Whether this device can be paused without losing it.
    fn can_pause(&self) -> bool;

    /// Whether the device is actively producing frames (or would be, if
    /// it were not paused).
    fn is_connected(&self) -> bool;

    /// Begin writing captured frames to `output`.
    fn start_recording(&mut self, output: &Path) -> Result<(), CaptureError>;

    /// Ask the device to stop writing. The output may keep finalizing;
    /// [`is_recording`](Self::is_recording) stays true until it is closed.
    fn stop_recording(&mut self) -> Result<(), CaptureError>;

    fn is_recording(&self) -> bool;

    /// Timestamps of the frames written by the current (or last) recording.
    fn frame_times(&self) -> Vec<FrameTime>;

    /// File extension of the recorded output, without the dot.
    fn recording_extension(&self) -> &str;
}
