use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::config::OrchestratorConfig;
use crate::models::device_config::DeviceConfig;
use crate::models::device_key::DeviceKey;
use crate::models::error::isolate;
use crate::orchestrator::recording::{RecordingCoordinator, MANUAL_RACE_ID};
use crate::orchestrator::signal::WakeSignal;
use crate::registry::cooldown::CooldownTracker;
use crate::registry::device_registry::{Claim, DeviceRegistry};
use crate::registry::frame_source::FrameSource;
use crate::storage::retention;
use crate::traits::delegate::OrchestratorDelegate;
use crate::traits::framework::DeviceFramework;

pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub created: usize,
    pub disposed: usize,
    pub initialized: usize,
    pub failed: usize,
    pub paused: usize,
    pub resumed: usize,
    pub recordings_started: usize,
    pub recordings_stopped: usize,
    pub metadata_written: usize,
    pub recordings_deleted: usize,
    pub finalizing_completed: bool,
}

/// State shared between the orchestrator handle and its worker thread.
///
/// Each collection has its own lock. Only the worker changes frame source
/// lifecycles; everything else queues requests here and signals.
pub(crate) struct Shared {
    pub config: OrchestratorConfig,
    pub frameworks: Vec<Arc<dyn DeviceFramework>>,
    pub registry: DeviceRegistry,
    pub cooldown: CooldownTracker,
    pub recording: RecordingCoordinator,
    pub desired: Mutex<Option<Vec<DeviceConfig>>>,
    pub pending_create: Mutex<Vec<DeviceConfig>>,
    pub pending_initialize: Mutex<Vec<Arc<FrameSource>>>,
    pub pending_dispose: Mutex<Vec<Arc<FrameSource>>>,
    pub deferred: Mutex<Vec<DeferredAction>>,
    pub delegates: RwLock<Vec<Arc<dyn OrchestratorDelegate>>>,
    pub signal: WakeSignal,
    pub running: AtomicBool,
}

impl Shared {
    pub fn new(config: OrchestratorConfig, frameworks: Vec<Arc<dyn DeviceFramework>>) -> Self {
        Self {
            cooldown: CooldownTracker::new(config.retry_delay()),
            config,
            frameworks,
            registry: DeviceRegistry::new(),
            recording: RecordingCoordinator::new(),
            desired: Mutex::new(None),
            pending_create: Mutex::new(Vec::new()),
            pending_initialize: Mutex::new(Vec::new()),
            pending_dispose: Mutex::new(Vec::new()),
            deferred: Mutex::new(Vec::new()),
            delegates: RwLock::new(Vec::new()),
            signal: WakeSignal::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn framework_for(&self, config: &DeviceConfig) -> Option<&Arc<dyn DeviceFramework>> {
        self.frameworks
            .iter()
            .find(|f| f.framework_type() == config.framework())
    }

    /// Worker main loop. Exits once `running` is cleared, after a final
    /// teardown.
    pub fn run(&self) {
        log::info!("capture worker started");
        while self.running.load(Ordering::SeqCst) {
            let report = self.run_cycle();
            if report != CycleReport::default() {
                log::debug!("cycle: {:?}", report);
            }
            let wait = if self.recording.is_finalizing() {
                self.config.finalizing_wait()
            } else {
                self.config.idle_wait()
            };
            self.signal.wait_timeout(wait);
        }
        self.teardown();
        log::info!("capture worker stopped");
    }

    /// One reconciliation pass.
    pub fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        self.apply_desired_configs(&mut report);
        self.retry_pending_creates(&mut report);

        let sources = self.registry.sources();
        for source in &sources {
            source.refresh();
        }

        self.start_flagged_recordings(&sources, &mut report);
        self.stop_unflagged_recordings(&sources, &mut report);
        report.metadata_written += self.recording.flush_metadata();

        // After the flush, so final sidecars exist when delegates hear of it.
        if self.recording.poll_finalized() {
            log::info!("recording finalized");
            report.finalizing_completed = true;
            self.notify(|d| d.on_finalizing_completed());
        }

        self.initialize_sources(&sources, &mut report);
        if report.initialized == 0 && report.failed == 0 && self.config.auto_pause {
            self.apply_auto_pause(&sources, &mut report);
        }

        if report.recordings_started > 0 {
            let open: HashSet<PathBuf> = self.recording.open_paths().into_iter().collect();
            report.recordings_deleted = retention::enforce_retention(
                &self.config.recordings_dir,
                self.config.max_recordings,
                &self.config.video_extensions,
                &open,
            );
        }

        self.run_deferred(&mut report);
        report
    }

    /// Dispose every live source and run whatever is still queued.
    pub fn teardown(&self) {
        let mut report = CycleReport::default();
        self.run_deferred(&mut report);
        for source in self.registry.drain() {
            source.dispose();
            report.disposed += 1;
        }
        self.recording.flush_metadata();
        log::info!("teardown disposed {} source(s)", report.disposed);
    }

    // --- Config reconciliation ---

    fn apply_desired_configs(&self, report: &mut CycleReport) {
        let Some(configs) = self.desired.lock().take() else {
            return;
        };

        let mut wanted: Vec<DeviceConfig> = Vec::with_capacity(configs.len());
        let mut keys = HashSet::new();
        for config in configs {
            let key = DeviceKey::resolve(&config);
            if keys.insert(key.clone()) {
                wanted.push(config);
            } else {
                log::warn!("{} requested twice, keeping the first", key);
            }
        }

        for source in self.registry.sources() {
            let unchanged = wanted
                .iter()
                .any(|c| DeviceKey::resolve(c) == *source.key() && c == source.config());
            if !unchanged {
                self.retire(&source);
                report.disposed += 1;
            }
        }

        self.pending_create.lock().clear();
        for config in wanted {
            if self.registry.find_existing(&DeviceKey::resolve(&config)).is_none() {
                self.create(config, report);
            }
        }
    }

    fn retry_pending_creates(&self, report: &mut CycleReport) {
        let pending = std::mem::take(&mut *self.pending_create.lock());
        for config in pending {
            self.create(config, report);
        }
    }

    /// Instantiate a source. Transient failures are retried after cooldown.
    fn create(&self, config: DeviceConfig, report: &mut CycleReport) {
        let key = DeviceKey::resolve(&config);
        if self.cooldown.in_cooldown(&key) {
            self.pending_create.lock().push(config);
            return;
        }
        let Some(framework) = self.framework_for(&config) else {
            log::error!("{}: no {:?} framework registered", key, config.framework());
            return;
        };

        let result = self.registry.claim(&config, |c| {
            isolate("create_device", || framework.create_device(c))
                .map(|device| FrameSource::new(c.clone(), device))
        });
        match result {
            Ok(Claim::Created(source)) => {
                log::info!("{}: created source {}", key, source.id());
                report.created += 1;
                self.pending_initialize.lock().push(source);
            }
            Ok(Claim::Existing(_)) => {}
            Err(e) if e.is_transient() => {
                self.cooldown.record_failure(&key);
                self.pending_create.lock().push(config);
            }
            Err(e) => log::error!("{}: cannot be opened: {}", key, e),
        }
    }

    fn retire(&self, source: &Arc<FrameSource>) {
        log::info!("{}: disposing source {}", source.key(), source.id());
        source.dispose();
        self.registry.remove(source);
    }

    // --- Recording ---

    fn start_flagged_recordings(&self, sources: &[Arc<FrameSource>], report: &mut CycleReport) {
        let session = self.recording.session();
        let flagged = session
            .iter()
            .flat_map(|s| s.sources.iter().map(move |src| (s.race_id.as_str(), src)));
        let manual = sources
            .iter()
            .filter(|s| s.is_manual_recording())
            .map(|src| (MANUAL_RACE_ID, src));

        for (race_id, source) in flagged.chain(manual) {
            if source.is_recording() || source.is_disposed() {
                continue;
            }
            if source.state().is_stopped() || !source.is_connected() {
                continue;
            }
            report.metadata_written += self.recording.flush_source(source);
            let path = RecordingCoordinator::output_path(&self.config.recordings_dir, race_id, source);
            match source.start_recording(&path) {
                Ok(()) => {
                    log::info!("{}: recording to {}", source.key(), path.display());
                    self.recording.track(Arc::clone(source), race_id, path);
                    report.recordings_started += 1;
                }
                Err(e) => log::warn!("{}: could not start recording: {}", source.key(), e),
            }
        }
    }

    fn stop_unflagged_recordings(&self, sources: &[Arc<FrameSource>], report: &mut CycleReport) {
        let session = self.recording.session();
        for source in sources {
            if !source.is_recording() || source.is_manual_recording() {
                continue;
            }
            if session.as_ref().is_some_and(|s| s.contains(source)) {
                continue;
            }
            match source.stop_recording() {
                Ok(()) => report.recordings_stopped += 1,
                Err(e) => log::warn!("{}: could not stop recording: {}", source.key(), e),
            }
        }
    }

    // --- Lifecycle ---

    fn initialize_sources(&self, sources: &[Arc<FrameSource>], report: &mut CycleReport) {
        let mut queued = std::mem::take(&mut *self.pending_initialize.lock());
        if self.config.maintain_connections {
            queued.extend(
                sources
                    .iter()
                    .filter(|s| !s.is_connected() && !s.is_disposed())
                    .filter(|s| !s.has_failed_permanently())
                    .filter(|s| !self.cooldown.in_cooldown(s.key()))
                    .cloned(),
            );
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        for source in queued {
            if !seen.insert(source.id()) || source.is_disposed() {
                continue;
            }
            match isolate("initialize", || source.initialize()) {
                Ok(()) => {
                    self.cooldown.clear(source.key());
                    report.initialized += 1;
                    log::info!("{}: running", source.key());
                    self.notify(|d| d.on_source_activated(&source));
                }
                Err(e) => {
                    report.failed += 1;
                    if e.is_transient() {
                        self.cooldown.record_failure(source.key());
                    } else {
                        log::error!("{}: start failed permanently: {}", source.key(), e);
                    }
                    self.notify(|d| d.on_source_failed(&source, &e));
                }
            }
        }
    }

    fn apply_auto_pause(&self, sources: &[Arc<FrameSource>], report: &mut CycleReport) {
        let session = self.recording.session();
        for source in sources {
            let wanted = source.is_visible()
                || source.is_manual_recording()
                || session.as_ref().is_some_and(|s| s.contains(source));
            let state = source.state();

            let result = if state.is_running() && !wanted && !source.is_recording() && source.can_pause() {
                source.pause().map(|()| report.paused += 1)
            } else if state.is_paused() && wanted {
                source.unpause().map(|()| report.resumed += 1)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                log::warn!("{}: auto-pause: {}", source.key(), e);
            }
        }
    }

    // --- Deferred work ---

    fn run_deferred(&self, report: &mut CycleReport) {
        let disposals = std::mem::take(&mut *self.pending_dispose.lock());
        for source in disposals {
            if self.registry.get(source.id()).is_some() || !source.is_disposed() {
                self.retire(&source);
                report.disposed += 1;
            }
        }

        let actions = std::mem::take(&mut *self.deferred.lock());
        for action in actions {
            if panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
                log::error!("deferred action panicked");
            }
        }
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn OrchestratorDelegate),
    {
        let delegates = self.delegates.read().clone();
        for delegate in &delegates {
            f(delegate.as_ref());
        }
    }
}

