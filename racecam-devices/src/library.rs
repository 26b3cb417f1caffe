//! Media directory helpers for the file-backed frameworks.

use std::fs;
use std::path::{Path, PathBuf};

use racecam_core::models::device_config::{DeviceConfig, Mode};
use racecam_core::models::error::CaptureError;
use racecam_core::storage::metadata::is_sidecar;

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
}

/// Files directly inside `dir` with one of `extensions`, sorted by path.
pub fn scan(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CaptureError::StorageError(format!("failed to list {}: {}", dir.display(), e))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && !is_sidecar(p) && has_extension(p, extensions))
        .collect();
    files.sort();
    Ok(files)
}

/// Config for a file-backed source, named after the file stem.
pub fn file_config(path: PathBuf, mode: Mode) -> DeviceConfig {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut config = DeviceConfig::new(name, mode);
    config.file_path = Some(path);
    config
}

#[cfg(test)]
mod tests {
    use racecam_core::models::device_config::{FrameworkType, PixelFormat};
    use racecam_core::models::device_key::DeviceKey;

    use super::*;

    fn exts() -> Vec<String> {
        vec!["png".into(), "JPG".into()]
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_extension(Path::new("/a/start.PNG"), &exts()));
        assert!(has_extension(Path::new("/a/start.jpg"), &exts()));
        assert!(!has_extension(Path::new("/a/start.gif"), &exts()));
        assert!(!has_extension(Path::new("/a/start"), &exts()));
    }

    #[test]
    fn scan_skips_directories_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("z.png"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = scan(dir.path(), &exts()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.jpg"), dir.path().join("z.png")]);
    }

    #[test]
    fn scan_of_missing_dir_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan(&dir.path().join("absent"), &exts()),
            Err(CaptureError::StorageError(_))
        ));
    }

    #[test]
    fn file_config_keys_by_path() {
        let mode = Mode {
            width: 1280,
            height: 720,
            frame_rate: 1.0,
            pixel_format: PixelFormat::Rgba,
            framework: FrameworkType::StillImage,
        };
        let config = file_config(PathBuf::from("/media/Start Grid.png"), mode);
        assert_eq!(config.name, "Start Grid");
        assert_eq!(DeviceKey::resolve(&config).as_str(), "file:/media/Start Grid.png");
    }
}
