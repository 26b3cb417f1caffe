use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::storage::metadata::{is_sidecar, sidecar_path};

/// Delete the oldest recordings until at most `max_retained` completed
/// video files remain under `recordings_dir`.
///
/// Paths in `open` are still being written and are neither counted nor
/// deleted.
///
/// Scans every race directory one level below the root. Files are ordered
/// by last-write time and removed together with their sidecar. Best
/// effort: I/O errors are logged and skipped, never returned.
///
/// Returns the number of video files deleted.
pub fn enforce_retention(
    recordings_dir: &Path,
    max_retained: usize,
    extensions: &[String],
    open: &HashSet<PathBuf>,
) -> usize {
    let mut videos = collect_videos(recordings_dir, extensions);
    videos.retain(|(path, _)| !open.contains(path));
    if videos.len() <= max_retained {
        return 0;
    }

    videos.sort_by_key(|(_, modified)| *modified);
    let excess = videos.len() - max_retained;
    let mut deleted = 0;

    for (path, _) in videos.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => {
                deleted += 1;
                log::info!("retention: deleted {}", path.display());
            }
            Err(e) => {
                log::debug!("retention: could not delete {}: {}", path.display(), e);
                continue;
            }
        }
        let sidecar = sidecar_path(&path);
        if sidecar.exists() {
            if let Err(e) = fs::remove_file(&sidecar) {
                log::debug!("retention: could not delete {}: {}", sidecar.display(), e);
            }
        }
    }
    deleted
}

fn collect_videos(recordings_dir: &Path, extensions: &[String]) -> Vec<(PathBuf, SystemTime)> {
    let Ok(race_dirs) = fs::read_dir(recordings_dir) else {
        return Vec::new();
    };

    let mut videos = Vec::new();
    for dir in race_dirs.filter_map(Result::ok).map(|e| e.path()).filter(|p| p.is_dir()) {
        let Ok(files) = fs::read_dir(&dir) else {
            continue;
        };
        for file in files.filter_map(Result::ok) {
            let path = file.path();
            if !is_video(&path, extensions) {
                continue;
            }
            let modified = file
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            videos.push((path, modified));
        }
    }
    videos
}

fn is_video(path: &Path, extensions: &[String]) -> bool {
    if is_sidecar(path) || !path.is_file() {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::Duration;

    use super::*;

    fn exts() -> Vec<String> {
        vec!["mp4".into(), "raw".into()]
    }

    /// Create `{race}/{name}` with a sidecar and an explicit mtime.
    fn video(root: &Path, race: &str, name: &str, age_secs: u64) -> PathBuf {
        let dir = root.join(race);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, b"frames").unwrap();
        fs::write(sidecar_path(&path), b"{}").unwrap();

        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn within_budget_deletes_nothing() {
        let root = tempfile::tempdir().unwrap();
        video(root.path(), "heat-1", "a.mp4", 30);
        video(root.path(), "heat-1", "b.mp4", 20);

        assert_eq!(enforce_retention(root.path(), 2, &exts(), &HashSet::new()), 0);
    }

    #[test]
    fn deletes_oldest_across_races() {
        let root = tempfile::tempdir().unwrap();
        let oldest = video(root.path(), "heat-1", "a.mp4", 300);
        let second = video(root.path(), "heat-2", "b.raw", 200);
        let kept_1 = video(root.path(), "heat-1", "c.mp4", 100);
        let kept_2 = video(root.path(), "heat-3", "d.mp4", 10);

        assert_eq!(enforce_retention(root.path(), 2, &exts(), &HashSet::new()), 2);

        assert!(!oldest.exists());
        assert!(!sidecar_path(&oldest).exists());
        assert!(!second.exists());
        assert!(kept_1.exists());
        assert!(sidecar_path(&kept_1).exists());
        assert!(kept_2.exists());
    }

    #[test]
    fn never_deletes_more_than_excess() {
        let root = tempfile::tempdir().unwrap();
        for i in 0..7 {
            video(root.path(), "heat-1", &format!("{}.mp4", i), 100 - i);
        }

        assert_eq!(enforce_retention(root.path(), 4, &exts(), &HashSet::new()), 3);
        assert_eq!(collect_videos(root.path(), &exts()).len(), 4);
    }

    #[test]
    fn ignores_other_files() {
        let root = tempfile::tempdir().unwrap();
        video(root.path(), "heat-1", "a.mp4", 100);
        fs::write(root.path().join("heat-1").join("notes.txt"), b"x").unwrap();
        fs::write(root.path().join("loose.mp4"), b"x").unwrap();

        assert_eq!(collect_videos(root.path(), &exts()).len(), 1);
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(enforce_retention(&root.path().join("absent"), 1, &exts(), &HashSet::new()), 0);
    }

    #[test]
    fn open_recordings_are_never_deleted() {
        let root = tempfile::tempdir().unwrap();
        let active = video(root.path(), "manual", "pits.raw", 500);
        let oldest = video(root.path(), "heat-1", "a.mp4", 300);
        let newest = video(root.path(), "heat-2", "b.mp4", 100);
        let open = HashSet::from([active.clone()]);

        assert_eq!(enforce_retention(root.path(), 1, &exts(), &open), 1);
        assert!(active.exists());
        assert!(sidecar_path(&active).exists());
        assert!(!oldest.exists());
        assert!(newest.exists());
    }
}
