use crate::models::error::CaptureError;
use crate::registry::frame_source::FrameSource;

/// Event delegate for orchestrator notifications.
///
/// All methods are called from the worker thread, not the UI thread.
/// Implementations should marshal to the UI thread if needed and must not
/// block.
pub trait OrchestratorDelegate: Send + Sync {
    /// A source (re)started successfully and is producing frames.
    fn on_source_activated(&self, source: &FrameSource);

    /// Starting a source failed.
    fn on_source_failed(&self, source: &FrameSource, error: &CaptureError);

    /// Every source stopped by the last `stop_recording` has closed its
    /// output. Fired once per stop.
    fn on_finalizing_completed(&self);
}
