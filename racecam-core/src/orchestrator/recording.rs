use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::recording_metadata::RecordingMetadata;
use crate::registry::frame_source::FrameSource;
use crate::storage::metadata::{self, race_dir, sanitize};

/// Race id used for manual recordings.
pub const MANUAL_RACE_ID: &str = "manual";

/// Sources flagged to record for one race.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub race_id: String,
    pub sources: Vec<Arc<FrameSource>>,
}

impl RecordingSession {
    pub fn contains(&self, source: &FrameSource) -> bool {
        self.sources.iter().any(|s| s.id() == source.id())
    }
}

#[derive(Default)]
struct SessionState {
    session: Option<RecordingSession>,
    /// Sources stopped by the last `stop` whose output may still be open.
    finalizing: Vec<Arc<FrameSource>>,
    finalize_pending: bool,
}

/// An output file whose sidecar still needs writing.
struct OpenRecording {
    source: Arc<FrameSource>,
    race_id: String,
    video_path: PathBuf,
    written: bool,
}

/// Decides which sources record for the active race and tracks the
/// sidecar metadata of every open recording.
#[derive(Default)]
pub struct RecordingCoordinator {
    state: Mutex<SessionState>,
    open: Mutex<Vec<OpenRecording>>,
}

impl RecordingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag every record-for-replay source to record `race_id`.
    ///
    /// FPV-only sources that are not visible are skipped. Fails while a
    /// race is recording or the previous one is still finalizing.
    pub fn start(&self, race_id: &str, sources: &[Arc<FrameSource>]) -> Result<usize, CaptureError> {
        let mut state = self.state.lock();
        if let Some(active) = &state.session {
            return Err(CaptureError::InvalidState(format!(
                "race {} is still recording",
                active.race_id
            )));
        }
        if state.finalize_pending {
            return Err(CaptureError::InvalidState(
                "previous recording is still finalizing".into(),
            ));
        }

        let selected: Vec<Arc<FrameSource>> = sources
            .iter()
            .filter(|s| !s.is_disposed())
            .filter(|s| s.config().record_for_replay)
            .filter(|s| !(s.config().is_fpv_only() && !s.is_visible()))
            .cloned()
            .collect();

        log::info!(
            "recording race {} on {} source(s)",
            race_id,
            selected.len()
        );
        let count = selected.len();
        state.session = Some(RecordingSession {
            race_id: race_id.to_string(),
            sources: selected,
        });
        Ok(count)
    }

    /// Clear the flagged set and enter the finalizing phase. Returns false
    /// when no race was recording.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let Some(session) = state.session.take() else {
            return false;
        };
        log::info!("stopping recording of race {}", session.race_id);
        state.finalizing.extend(session.sources);
        state.finalize_pending = true;
        true
    }

    pub fn session(&self) -> Option<RecordingSession> {
        self.state.lock().session.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().session.is_some()
    }

    pub fn is_finalizing(&self) -> bool {
        self.state.lock().finalize_pending
    }

    /// Edge-triggered: true exactly once after every source stopped by
    /// [`stop`](Self::stop) has closed its output. Manual recordings do
    /// not hold finalizing open.
    pub fn poll_finalized(&self) -> bool {
        let mut state = self.state.lock();
        if !state.finalize_pending {
            return false;
        }
        state
            .finalizing
            .retain(|s| s.is_recording() && !s.is_manual_recording() && !s.is_disposed());
        if !state.finalizing.is_empty() {
            return false;
        }
        state.finalize_pending = false;
        true
    }

    /// Output path for a new recording, never overwriting an existing file.
    pub fn output_path(recordings_dir: &Path, race_id: &str, source: &FrameSource) -> PathBuf {
        let dir = race_dir(recordings_dir, race_id);
        let stem = sanitize(&source.config().name);
        let ext = source.recording_extension();
        let mut path = dir.join(format!("{}.{}", stem, ext));
        let mut n = 2;
        while path.exists() {
            path = dir.join(format!("{}_{}.{}", stem, n, ext));
            n += 1;
        }
        path
    }

    /// Start tracking the sidecar of a new output. Entries are keyed by
    /// `video_path`, so an earlier segment of the same source is kept until
    /// its final write.
    pub fn track(&self, source: Arc<FrameSource>, race_id: &str, video_path: PathBuf) {
        let mut open = self.open.lock();
        open.retain(|r| r.video_path != video_path);
        open.push(OpenRecording {
            source,
            race_id: race_id.to_string(),
            video_path,
            written: false,
        });
    }

    /// Write pending sidecars. Each open recording is written once as soon
    /// as it has a frame, and once more after it stops; an entry is dropped
    /// only after its final write succeeds.
    ///
    /// Returns the number of sidecars written.
    pub fn flush_metadata(&self) -> usize {
        self.flush(|_| true)
    }

    /// Final writes for `source`'s closed outputs. Must run before the
    /// source opens a new output, which resets its frame times.
    pub fn flush_source(&self, source: &FrameSource) -> usize {
        self.flush(|r| r.source.id() == source.id())
    }

    fn flush<P>(&self, selected: P) -> usize
    where
        P: Fn(&OpenRecording) -> bool,
    {
        let mut open = self.open.lock();
        let mut written = 0;

        open.retain_mut(|recording| {
            if !selected(recording) {
                return true;
            }
            let current = recording.source.recording_path();
            if current.as_deref() != Some(recording.video_path.as_path()) {
                // Frame times now belong to a newer output.
                log::warn!(
                    "{} superseded before its final sidecar",
                    recording.video_path.display()
                );
                return false;
            }

            let finished = !recording.source.is_recording();
            if recording.written && !finished {
                return true;
            }
            let frame_times = recording.source.frame_times();
            if frame_times.is_empty() {
                if finished {
                    log::warn!("{} recorded no frames", recording.video_path.display());
                }
                return !finished;
            }

            let metadata = RecordingMetadata::new(
                &recording.race_id,
                recording.source.config().clone(),
                recording.video_path.clone(),
                frame_times,
            );
            match metadata::write_metadata(&metadata) {
                Ok(()) => {
                    written += 1;
                    recording.written = true;
                    !finished
                }
                Err(e) => {
                    log::warn!("{}: {}", recording.video_path.display(), e);
                    true
                }
            }
        });
        written
    }

    /// Outputs still being written or awaiting their final sidecar.
    pub fn open_paths(&self) -> Vec<PathBuf> {
        self.open.lock().iter().map(|r| r.video_path.clone()).collect()
    }

    pub fn open_recordings(&self) -> usize {
        self.open.lock().len()
    }
}
