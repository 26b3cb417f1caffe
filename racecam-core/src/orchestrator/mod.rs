//! Capture device orchestrator.
//!
//! One background worker owns every frame source lifecycle transition.
//! Callers on other threads only queue requests and wake the worker:
//!
//! ```text
//! set_device_configs ─┐
//! reinitialize/dispose├→ [request queues] → signal → [worker cycle] → FrameSource
//! start/stop_recording┘                                  │
//!                                                        └→ OrchestratorDelegate
//! ```

pub mod recording;
pub mod signal;
pub mod worker;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::enumeration::matcher::{BracketTokenMatcher, HardwareMatcher};
use crate::enumeration::merge::merge_available;
use crate::enumeration::mode_select::pick_best_mode;
use crate::enumeration::validator::{AllowDenyList, DeviceValidator};
use crate::models::available::AvailableDevice;
use crate::models::config::OrchestratorConfig;
use crate::models::device_config::{DeviceConfig, Mode};
use crate::models::device_key::DeviceKey;
use crate::models::error::CaptureError;
use crate::models::recording_metadata::RecordingMetadata;
use crate::registry::frame_source::FrameSource;
use crate::storage::metadata;
use crate::traits::delegate::OrchestratorDelegate;
use crate::traits::framework::DeviceFramework;

use self::worker::{CycleReport, Shared};

/// Supervises the frame sources for a set of desired device configs.
pub struct Orchestrator {
    shared: Arc<Shared>,
    matcher: Box<dyn HardwareMatcher>,
    validator: Box<dyn DeviceValidator>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        frameworks: Vec<Arc<dyn DeviceFramework>>,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            shared: Arc::new(Shared::new(config, frameworks)),
            matcher: Box::new(BracketTokenMatcher),
            validator: Box::new(AllowDenyList::default()),
            worker: Mutex::new(None),
        })
    }

    pub fn with_matcher(mut self, matcher: Box<dyn HardwareMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn DeviceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Spawn the worker thread.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(CaptureError::InvalidState("worker already started".into()));
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("racecam-worker".into())
            .spawn(move || shared.run())
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                CaptureError::Platform(format!("failed to spawn worker thread: {}", e))
            })?;

        *worker = Some(handle);
        Ok(())
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Run one reconciliation pass on the calling thread.
    ///
    /// Refused while the worker thread is running, so there is always a
    /// single writer.
    pub fn run_cycle(&self) -> Result<CycleReport, CaptureError> {
        if self.is_worker_running() {
            return Err(CaptureError::InvalidState(
                "reconciliation is owned by the worker thread".into(),
            ));
        }
        Ok(self.shared.run_cycle())
    }

    /// Stop the worker, dispose every source and wait for the thread.
    ///
    /// A driver that never returns from stop cannot be interrupted; after
    /// `shutdown_timeout` the thread is detached and an error is logged.
    pub fn shutdown(&self) {
        let Some(handle) = self.worker.lock().take() else {
            self.shared.teardown();
            return;
        };

        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.signal.notify();

        let deadline = Instant::now() + self.shared.config.shutdown_timeout();
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                log::error!("capture worker panicked");
            }
        } else {
            log::error!(
                "capture worker did not stop within {} ms, detaching it",
                self.shared.config.shutdown_timeout_ms
            );
        }
    }

    pub fn add_delegate(&self, delegate: Arc<dyn OrchestratorDelegate>) {
        self.shared.delegates.write().push(delegate);
    }

    // --- Configuration ---

    /// Replace the desired device list. Unchanged configs keep their
    /// sources; the diff is applied on the worker.
    pub fn set_device_configs(&self, configs: Vec<DeviceConfig>) {
        *self.shared.desired.lock() = Some(configs);
        self.shared.signal.notify();
    }

    pub fn sources(&self) -> Vec<Arc<FrameSource>> {
        self.shared.registry.sources()
    }

    pub fn source(&self, id: Uuid) -> Option<Arc<FrameSource>> {
        self.shared.registry.get(id)
    }

    pub fn find_existing(&self, key: &DeviceKey) -> Option<Arc<FrameSource>> {
        self.shared.registry.find_existing(key)
    }

    pub fn in_cooldown(&self, key: &DeviceKey) -> bool {
        self.shared.cooldown.in_cooldown(key)
    }

    // --- Requests ---

    pub fn set_visible(&self, source: &FrameSource, visible: bool) {
        if source.is_visible() != visible {
            source.set_visible(visible);
            self.shared.signal.notify();
        }
    }

    /// Queue an explicit restart, bypassing cooldown.
    pub fn reinitialize(&self, source: &Arc<FrameSource>) {
        self.shared.pending_initialize.lock().push(Arc::clone(source));
        self.shared.signal.notify();
    }

    /// Queue `source` for disposal on the worker.
    pub fn dispose(&self, source: &Arc<FrameSource>) {
        self.shared.pending_dispose.lock().push(Arc::clone(source));
        self.shared.signal.notify();
    }

    /// Run `action` on the worker at the end of its next cycle.
    pub fn defer<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.deferred.lock().push(Box::new(action));
        self.shared.signal.notify();
    }

    // --- Recording ---

    /// Flag the record-for-replay sources to record `race_id` from the
    /// next cycle. Returns how many sources were selected.
    pub fn start_recording(&self, race_id: &str) -> Result<usize, CaptureError> {
        let sources = self.shared.registry.sources();
        let count = self.shared.recording.start(race_id, &sources)?;
        self.shared.signal.notify();
        Ok(count)
    }

    pub fn stop_recording(&self) {
        if self.shared.recording.stop() {
            self.shared.signal.notify();
        }
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.is_active()
    }

    /// True from `stop_recording` until every stopped source has closed
    /// its output.
    pub fn is_finalizing(&self) -> bool {
        self.shared.recording.is_finalizing()
    }

    /// Keep `source` recording regardless of race start/stop.
    pub fn set_manual_recording(&self, source: &FrameSource, manual: bool) {
        source.set_manual_recording(manual);
        self.shared.signal.notify();
    }

    /// Replays recorded for `race_id`, oldest first.
    pub fn recordings_for_race(&self, race_id: &str) -> Vec<RecordingMetadata> {
        metadata::recordings_for_race(&self.shared.config.recordings_dir, race_id)
    }

    // --- Enumeration ---

    /// Devices offered for selection, merged across frameworks.
    pub fn available_sources(&self) -> Vec<AvailableDevice> {
        merge_available(&self.shared.frameworks, self.matcher.as_ref(), self.validator.as_ref())
    }

    pub fn modes(&self, config: &DeviceConfig) -> Result<Vec<Mode>, CaptureError> {
        let framework = self.shared.framework_for(config).ok_or_else(|| {
            CaptureError::ConfigurationFailed(format!("no {:?} framework", config.framework()))
        })?;
        framework.modes(config)
    }

    pub fn best_mode(&self, config: &DeviceConfig) -> Result<Option<Mode>, CaptureError> {
        Ok(pick_best_mode(&self.modes(config)?))
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
