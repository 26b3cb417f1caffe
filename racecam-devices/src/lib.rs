//! # racecam-devices
//!
//! Portable frame source backends for racecam.
//!
//! Provides:
//! - `MediaFileFramework` — video files played back as cameras
//! - `StillImageFramework` — static images re-emitted at a fixed rate
//! - `TestPatternFramework` — numbered virtual cameras for rehearsal
//! - `playback` — the shared capture thread and raw frame recorder
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use racecam_core::{Orchestrator, OrchestratorConfig};
//! use racecam_devices::{MediaFileFramework, TestPatternFramework};
//!
//! let orchestrator = Orchestrator::new(
//!     OrchestratorConfig::default(),
//!     vec![Arc::new(TestPatternFramework::new(4)), Arc::new(MediaFileFramework::new())],
//! )?;
//! orchestrator.start()?;
//! ```

pub mod library;
pub mod media_file;
pub mod playback;
pub mod still_image;
pub mod test_pattern;

pub use media_file::MediaFileFramework;
pub use playback::{FrameGenerator, Playback, PlaybackDevice, PlaybackSource, Recorder};
pub use still_image::StillImageFramework;
pub use test_pattern::TestPatternFramework;
