//! # racecam-core
//!
//! Platform-agnostic capture device orchestration for race event software.
//!
//! Keeps one live frame source per configured camera, video file or image,
//! recovers devices that fail or disconnect, pauses sources nobody is
//! watching, and records race replays with per-frame timing sidecars.
//! Platform backends implement [`DeviceFramework`] and [`CaptureDevice`]
//! and plug into the generic [`Orchestrator`].
//!
//! ## Architecture
//!
//! ```text
//! racecam-core (this crate)
//! ├── traits/        ← DeviceFramework, CaptureDevice, OrchestratorDelegate
//! ├── models/        ← DeviceConfig, DeviceKey, CaptureError, SourceState, etc.
//! ├── registry/      ← FrameSource, DeviceRegistry, CooldownTracker
//! ├── enumeration/   ← cross-framework merge, allow/deny validation, mode selection
//! ├── orchestrator/  ← Orchestrator, worker cycle, recording coordinator
//! └── storage/       ← sidecar metadata, retention cleanup
//! ```

pub mod enumeration;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use enumeration::matcher::{BracketTokenMatcher, HardwareMatcher};
pub use enumeration::mode_select::pick_best_mode;
pub use enumeration::validator::{AllowDenyList, DenyRule, DeviceValidator};
pub use models::available::{AvailableDevice, Validity};
pub use models::config::OrchestratorConfig;
pub use models::device_config::{
    DeviceConfig, FrameworkType, Mode, PixelFormat, Rect, Resolution, ViewBounds, ViewRole,
};
pub use models::device_key::DeviceKey;
pub use models::error::CaptureError;
pub use models::frame::{Frame, FrameTime};
pub use models::recording_metadata::RecordingMetadata;
pub use models::state::SourceState;
pub use orchestrator::worker::CycleReport;
pub use orchestrator::Orchestrator;
pub use registry::frame_source::FrameSource;
pub use traits::capture_device::{CaptureDevice, FrameCallback};
pub use traits::delegate::OrchestratorDelegate;
pub use traits::framework::DeviceFramework;
