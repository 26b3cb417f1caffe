use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording_metadata::RecordingMetadata;

pub const SIDECAR_SUFFIX: &str = ".metadata.json";

/// Path of the sidecar metadata file for a recording.
///
/// `{dir}/{stem}.metadata.json` alongside `{dir}/{stem}.{ext}`.
pub fn sidecar_path(video_path: &Path) -> PathBuf {
    video_path.with_extension("metadata.json")
}

pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(SIDECAR_SUFFIX))
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata) -> Result<(), CaptureError> {
    let metadata_path = sidecar_path(&metadata.video_path);
    if let Some(parent) = metadata_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
    }
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    // Replaced by rename so readers never see a half-written sidecar.
    let tmp_path = metadata_path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    fs::rename(&tmp_path, &metadata_path)
        .map_err(|e| CaptureError::StorageError(format!("failed to replace metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from the sidecar of `video_path`.
pub fn read_metadata(video_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    read_sidecar(&sidecar_path(video_path))
}

pub fn read_sidecar(metadata_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let json = fs::read_to_string(metadata_path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

/// Directory holding the recordings of one race.
pub fn race_dir(recordings_dir: &Path, race_id: &str) -> PathBuf {
    recordings_dir.join(sanitize(race_id))
}

/// Replays recorded for `race_id`, oldest first.
///
/// Unreadable sidecars are logged and skipped. A race that was never
/// recorded has no replays.
pub fn recordings_for_race(recordings_dir: &Path, race_id: &str) -> Vec<RecordingMetadata> {
    let dir = race_dir(recordings_dir, race_id);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut recordings: Vec<RecordingMetadata> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| is_sidecar(p))
        .filter_map(|p| match read_sidecar(&p) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                log::warn!("skipping {}: {}", p.display(), e);
                None
            }
        })
        .collect();
    recordings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    recordings
}

/// Replace characters that are unsafe in file names.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}
