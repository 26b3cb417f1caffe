//! Timed frame delivery shared by every backend in this crate.
//!
//! A [`Playback`] owns one capture thread that pulls frames from a
//! [`FrameGenerator`] at the mode's frame rate, hands them to the
//! orchestrator callback and, while a recording is open, to the
//! [`Recorder`]. [`PlaybackDevice`] adapts that to `CaptureDevice`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use racecam_core::models::device_config::Mode;
use racecam_core::models::error::CaptureError;
use racecam_core::models::frame::{Frame, FrameTime};
use racecam_core::traits::capture_device::{CaptureDevice, FrameCallback};

/// Extension of the frame streams written by [`Recorder`].
pub const RAW_EXTENSION: &str = "raw";

/// Longest sleep between pause checks.
const PAUSE_POLL: Duration = Duration::from_millis(10);

/// Produces the frames of one playback run.
pub trait FrameGenerator: Send + 'static {
    /// The frame at `index`, or `None` at end of stream.
    fn next_frame(&mut self, index: u64) -> Option<Frame>;
}

/// Backend-specific half of a [`PlaybackDevice`].
pub trait PlaybackSource: Send {
    /// Open a fresh generator. Called on every start, so missing or
    /// damaged media is reported each time the device is initialized.
    fn open(&self) -> Result<Box<dyn FrameGenerator>, CaptureError>;

    fn can_pause(&self) -> bool {
        true
    }

    fn can_record(&self) -> bool {
        true
    }
}

/// Frame interval for `frame_rate`, clamped to at least one frame per
/// second.
pub fn frame_interval(frame_rate: f32) -> Duration {
    if frame_rate.is_finite() && frame_rate >= 1.0 {
        Duration::from_secs_f64(1.0 / frame_rate as f64)
    } else {
        Duration::from_secs(1)
    }
}

/// State of one open output file.
struct OpenOutput {
    writer: BufWriter<File>,
    started: DateTime<Utc>,
}

#[derive(Default)]
struct RecorderState {
    output: Option<OpenOutput>,
    frame_times: Vec<FrameTime>,
}

/// Writes captured frames to a raw frame stream.
///
/// Each record is `index: u64`, `width: u32`, `height: u32`, `len: u32`
/// (little-endian) followed by `len` payload bytes. Closing happens on a
/// separate thread; [`is_open`](Self::is_open) stays true until the file
/// is flushed and synced.
#[derive(Default)]
pub struct Recorder {
    state: Mutex<RecorderState>,
    open: Arc<AtomicBool>,
    finalizer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, path: &Path) -> Result<(), CaptureError> {
        if self.is_open() {
            return Err(CaptureError::InvalidState("already recording".into()));
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                CaptureError::StorageError(format!("failed to create {}: {}", dir.display(), e))
            })?;
        }
        let file = File::create(path).map_err(|e| {
            CaptureError::StorageError(format!("failed to create {}: {}", path.display(), e))
        })?;

        let mut state = self.state.lock();
        state.frame_times.clear();
        state.output = Some(OpenOutput {
            writer: BufWriter::new(file),
            started: Utc::now(),
        });
        self.open.store(true, Ordering::SeqCst);
        log::debug!("recording to {}", path.display());
        Ok(())
    }

    /// Append `frame` if a recording is open. Write errors end the
    /// recording early.
    pub fn write(&self, frame: &Frame) {
        let mut state = self.state.lock();
        let Some(output) = state.output.as_mut() else {
            return;
        };
        let started = output.started;
        if let Err(e) = write_record(&mut output.writer, frame) {
            log::error!("frame {} write failed, closing recording: {}", frame.index, e);
            let output = state.output.take();
            drop(state);
            self.finalize(output);
            return;
        }
        let number = state.frame_times.len() as u64;
        state
            .frame_times
            .push(FrameTime::relative_to(number, frame.captured_at, started));
    }

    /// Stop accepting frames and close the file in the background.
    pub fn stop(&self) {
        let output = self.state.lock().output.take();
        self.finalize(output);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn frame_times(&self) -> Vec<FrameTime> {
        self.state.lock().frame_times.clone()
    }

    /// Block until a pending close has finished.
    pub fn wait_closed(&self) {
        if let Some(handle) = self.finalizer.lock().take() {
            if handle.join().is_err() {
                log::error!("recording finalizer panicked");
                self.open.store(false, Ordering::SeqCst);
            }
        }
    }

    fn finalize(&self, output: Option<OpenOutput>) {
        let Some(output) = output else {
            return;
        };
        let open = Arc::clone(&self.open);
        let spawned = thread::Builder::new()
            .name("racecam-finalize".into())
            .spawn(move || {
                close_output(output);
                open.store(false, Ordering::SeqCst);
            });
        match spawned {
            Ok(handle) => {
                // Any earlier finalizer has already flushed its own file.
                if let Some(previous) = self.finalizer.lock().replace(handle) {
                    if previous.join().is_err() {
                        log::error!("recording finalizer panicked");
                    }
                }
            }
            Err(e) => {
                log::warn!("could not spawn finalizer, output left unsynced: {}", e);
                self.open.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(output) = self.state.get_mut().output.take() {
            close_output(output);
        }
        self.wait_closed();
    }
}

fn write_record(writer: &mut impl Write, frame: &Frame) -> std::io::Result<()> {
    writer.write_all(&frame.index.to_le_bytes())?;
    writer.write_all(&frame.width.to_le_bytes())?;
    writer.write_all(&frame.height.to_le_bytes())?;
    writer.write_all(&(frame.data.len() as u32).to_le_bytes())?;
    writer.write_all(&frame.data)
}

fn close_output(output: OpenOutput) {
    let result = output
        .writer
        .into_inner()
        .map_err(|e| e.into_error())
        .and_then(|file| file.sync_all());
    if let Err(e) = result {
        log::warn!("closing recording failed: {}", e);
    }
}

/// One capture thread delivering frames at a fixed rate.
pub struct Playback {
    thread_name: String,
    interval: Duration,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    recorder: Arc<Recorder>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Playback {
    pub fn new(thread_name: impl Into<String>, frame_rate: f32) -> Self {
        Self {
            thread_name: thread_name.into(),
            interval: frame_interval(frame_rate),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            recorder: Arc::new(Recorder::new()),
            handle: None,
        }
    }

    pub fn start(
        &mut self,
        mut generator: Box<dyn FrameGenerator>,
        callback: FrameCallback,
    ) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::InvalidState(format!(
                "{} already running",
                self.thread_name
            )));
        }
        // Reap a thread that already reached end of stream.
        self.join();

        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let paused = Arc::clone(&self.paused);
        let recorder = Arc::clone(&self.recorder);
        let interval = self.interval;
        let name = self.thread_name.clone();

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let mut index = 0u64;
                let mut next_tick = Instant::now();
                while running.load(Ordering::SeqCst) {
                    if paused.load(Ordering::SeqCst) {
                        thread::sleep(PAUSE_POLL.min(interval));
                        next_tick = Instant::now();
                        continue;
                    }
                    let Some(frame) = generator.next_frame(index) else {
                        log::info!("{}: end of stream after {} frame(s)", name, index);
                        break;
                    };
                    recorder.write(&frame);
                    callback(frame);
                    index += 1;

                    next_tick += interval;
                    let now = Instant::now();
                    if next_tick > now {
                        thread::sleep(next_tick - now);
                    } else {
                        next_tick = now;
                    }
                }
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::Platform(format!("failed to spawn capture thread: {}", e))
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn unpause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// True while the capture thread is alive, including while paused.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{}: capture thread panicked", self.thread_name);
            }
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `CaptureDevice` over a [`PlaybackSource`].
pub struct PlaybackDevice<S: PlaybackSource> {
    source: S,
    playback: Playback,
}

impl<S: PlaybackSource> PlaybackDevice<S> {
    pub fn new(source: S, thread_name: impl Into<String>, mode: &Mode) -> Self {
        Self {
            source,
            playback: Playback::new(thread_name, mode.frame_rate),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        self.playback.recorder()
    }
}

impl<S: PlaybackSource> CaptureDevice for PlaybackDevice<S> {
    fn start(&mut self, callback: FrameCallback) -> Result<(), CaptureError> {
        let generator = self.source.open()?;
        self.playback.start(generator, callback)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.playback.recorder().stop();
        self.playback.stop();
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        if !self.source.can_pause() {
            return Err(CaptureError::UnsupportedMode("source cannot pause".into()));
        }
        self.playback.pause();
        Ok(())
    }

    fn unpause(&mut self) -> Result<(), CaptureError> {
        self.playback.unpause();
        Ok(())
    }

    fn can_pause(&self) -> bool {
        self.source.can_pause()
    }

    fn is_connected(&self) -> bool {
        self.playback.is_running()
    }

    fn start_recording(&mut self, output: &Path) -> Result<(), CaptureError> {
        if !self.source.can_record() {
            return Err(CaptureError::UnsupportedMode("source cannot record".into()));
        }
        if !self.playback.is_running() {
            return Err(CaptureError::DeviceNotAvailable);
        }
        self.playback.recorder().start(output)
    }

    fn stop_recording(&mut self) -> Result<(), CaptureError> {
        self.playback.recorder().stop();
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.playback.recorder().is_open()
    }

    fn frame_times(&self) -> Vec<FrameTime> {
        self.playback.recorder().frame_times()
    }

    fn recording_extension(&self) -> &str {
        RAW_EXTENSION
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::AtomicU64;

    use super::*;

    /// Frame callback that counts deliveries and keeps the last frame.
    #[derive(Default)]
    pub struct Sink {
        pub count: AtomicU64,
        pub last: Mutex<Option<Frame>>,
    }

    impl Sink {
        pub fn callback(self: &Arc<Self>) -> FrameCallback {
            let sink = Arc::clone(self);
            Arc::new(move |frame: Frame| {
                sink.count.fetch_add(1, Ordering::SeqCst);
                *sink.last.lock() = Some(frame);
            })
        }

        pub fn count(&self) -> u64 {
            self.count.load(Ordering::SeqCst)
        }

        pub fn wait_for(&self, frames: u64) {
            let deadline = Instant::now() + Duration::from_secs(3);
            while self.count() < frames {
                assert!(Instant::now() < deadline, "timed out waiting for {} frames", frames);
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
}
