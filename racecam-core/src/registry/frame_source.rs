use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::device_config::DeviceConfig;
use crate::models::device_key::DeviceKey;
use crate::models::error::{isolate, CaptureError};
use crate::models::frame::{Frame, FrameTime};
use crate::models::state::SourceState;
use crate::traits::capture_device::{CaptureDevice, FrameCallback};

/// Latest frame, written from the device's capture thread.
#[derive(Default)]
struct FrameSlot {
    latest: Mutex<Option<Frame>>,
    count: AtomicU64,
}

/// Runtime handle bound to exactly one [`DeviceConfig`].
///
/// Owned by the orchestrator's registry; the presentation layer only reads
/// from it (state, frames) and sets visibility. Every lifecycle method is
/// `pub(crate)` and called from the worker thread alone.
pub struct FrameSource {
    id: Uuid,
    key: DeviceKey,
    config: DeviceConfig,
    device: Mutex<Box<dyn CaptureDevice>>,
    state: Mutex<SourceState>,
    frames: Arc<FrameSlot>,
    recording_path: Mutex<Option<PathBuf>>,

    // Mirrors of device status, refreshed by the worker so readers never
    // contend for the device lock.
    connected: AtomicBool,
    recording: AtomicBool,

    visible: AtomicBool,
    manual_recording: AtomicBool,
    start_failed_permanently: AtomicBool,
    disposed: AtomicBool,
}

impl FrameSource {
    pub(crate) fn new(config: DeviceConfig, device: Box<dyn CaptureDevice>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: DeviceKey::resolve(&config),
            config,
            device: Mutex::new(device),
            state: Mutex::new(SourceState::Stopped),
            frames: Arc::new(FrameSlot::default()),
            recording_path: Mutex::new(None),
            connected: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            visible: AtomicBool::new(false),
            manual_recording: AtomicBool::new(false),
            start_failed_permanently: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> SourceState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    /// Set by the presentation layer whenever a view of this source is
    /// shown or hidden. Read by the auto-pause policy.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_manual_recording(&self) -> bool {
        self.manual_recording.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.frames.latest.lock().clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.count.load(Ordering::SeqCst)
    }

    /// Output file of the current or last recording.
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.recording_path.lock().clone()
    }

    // --- Worker-only operations ---

    pub(crate) fn set_manual_recording(&self, manual: bool) {
        self.manual_recording.store(manual, Ordering::SeqCst);
    }

    pub(crate) fn has_failed_permanently(&self) -> bool {
        self.start_failed_permanently.load(Ordering::SeqCst)
    }

    pub(crate) fn can_pause(&self) -> bool {
        self.config.pause_when_hidden && self.device.lock().can_pause()
    }

    pub(crate) fn recording_extension(&self) -> String {
        self.device.lock().recording_extension().to_string()
    }

    pub(crate) fn frame_times(&self) -> Vec<FrameTime> {
        self.device.lock().frame_times()
    }

    /// Re-read connected/recording status from the device.
    pub(crate) fn refresh(&self) {
        let device = self.device.lock();
        self.connected.store(device.is_connected(), Ordering::SeqCst);
        self.recording.store(device.is_recording(), Ordering::SeqCst);
    }

    /// Stop (if needed), release and start the device again.
    ///
    /// On failure the source is left `Stopped`.
    pub(crate) fn initialize(&self) -> Result<(), CaptureError> {
        let mut device = self.device.lock();
        if !self.state().is_stopped() {
            if let Err(e) = device.stop() {
                log::warn!("{}: stop before restart failed: {}", self.key, e);
            }
            self.set_state(SourceState::Stopped)?;
        }
        device.release();

        self.set_state(SourceState::Starting)?;
        let frames = Arc::clone(&self.frames);
        let callback: FrameCallback = Arc::new(move |frame: Frame| {
            frames.count.fetch_add(1, Ordering::SeqCst);
            *frames.latest.lock() = Some(frame);
        });

        match isolate("device start", || device.start(callback)) {
            Ok(()) => {
                self.set_state(SourceState::Running)?;
                self.start_failed_permanently.store(false, Ordering::SeqCst);
                self.connected.store(device.is_connected(), Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                device.release();
                self.set_state(SourceState::Stopped)?;
                self.connected.store(false, Ordering::SeqCst);
                if !e.is_transient() {
                    self.start_failed_permanently.store(true, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    pub(crate) fn pause(&self) -> Result<(), CaptureError> {
        if self.is_recording() {
            return Err(CaptureError::InvalidState(
                "cannot pause while recording".into(),
            ));
        }
        if !self.state().is_running() {
            return Err(CaptureError::InvalidState(
                "can only pause from running state".into(),
            ));
        }
        self.device.lock().pause()?;
        self.set_state(SourceState::Paused)
    }

    pub(crate) fn unpause(&self) -> Result<(), CaptureError> {
        if !self.state().is_paused() {
            return Err(CaptureError::InvalidState(
                "can only resume from paused state".into(),
            ));
        }
        self.device.lock().unpause()?;
        self.set_state(SourceState::Running)
    }

    pub(crate) fn start_recording(&self, output: &Path) -> Result<(), CaptureError> {
        if self.state().is_paused() {
            self.unpause()?;
        }
        if !self.state().is_running() {
            return Err(CaptureError::InvalidState(
                "can only record from running state".into(),
            ));
        }
        let mut device = self.device.lock();
        device.start_recording(output)?;
        *self.recording_path.lock() = Some(output.to_path_buf());
        self.recording.store(device.is_recording(), Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn stop_recording(&self) -> Result<(), CaptureError> {
        let mut device = self.device.lock();
        let result = device.stop_recording();
        self.recording.store(device.is_recording(), Ordering::SeqCst);
        result
    }

    /// Release everything. The handle stays readable but is `Stopped` for good.
    pub(crate) fn dispose(&self) {
        let mut device = self.device.lock();
        if device.is_recording() {
            if let Err(e) = device.stop_recording() {
                log::warn!("{}: stop recording during dispose failed: {}", self.key, e);
            }
        }
        if !self.state().is_stopped() {
            if let Err(e) = device.stop() {
                log::warn!("{}: stop during dispose failed: {}", self.key, e);
            }
        }
        device.release();
        *self.state.lock() = SourceState::Stopped;
        self.connected.store(false, Ordering::SeqCst);
        self.recording.store(device.is_recording(), Ordering::SeqCst);
        self.disposed.store(true, Ordering::SeqCst);
    }

    fn set_state(&self, next: SourceState) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(CaptureError::InvalidState(format!(
                "{:?} -> {:?} not allowed",
                *state, next
            )));
        }
        log::debug!("{}: {:?} -> {:?}", self.key, *state, next);
        *state = next;
        Ok(())
    }
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .field("recording", &self.is_recording())
            .finish()
    }
}
