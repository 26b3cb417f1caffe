use crate::models::device_config::DeviceConfig;

/// Strategy for recognising the same physical device across frameworks.
///
/// Matching is heuristic; implementations return `None` when they cannot
/// tell, and the device is then never merged with another.
pub trait HardwareMatcher: Send + Sync {
    fn hardware_token(&self, config: &DeviceConfig) -> Option<String>;
}

/// Uses the last parenthesized, bracketed or braced token of the platform
/// path, lower-cased.
///
/// e.g. `"HD USB Camera (usb-0000:00:14.0-3)"` and
/// `"/dev/video2 [usb-0000:00:14.0-3]"` both yield `usb-0000:00:14.0-3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketTokenMatcher;

impl HardwareMatcher for BracketTokenMatcher {
    fn hardware_token(&self, config: &DeviceConfig) -> Option<String> {
        let path = config.platform_path.as_deref()?;
        last_bracketed(path)
    }
}

fn last_bracketed(s: &str) -> Option<String> {
    let mut best: Option<(usize, &str)> = None;
    for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
        let Some(end) = s.rfind(close) else {
            continue;
        };
        let Some(start) = s[..end].rfind(open) else {
            continue;
        };
        let token = s[start + 1..end].trim();
        if token.is_empty() {
            continue;
        }
        if best.map_or(true, |(pos, _)| end > pos) {
            best = Some((end, token));
        }
    }
    best.map(|(_, token)| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device_config::{FrameworkType, Mode, PixelFormat};

    fn with_path(path: Option<&str>) -> DeviceConfig {
        let mut config = DeviceConfig::new(
            "HD USB Camera",
            Mode {
                width: 640,
                height: 480,
                frame_rate: 30.0,
                pixel_format: PixelFormat::Yuy2,
                framework: FrameworkType::DirectShow,
            },
        );
        config.platform_path = path.map(str::to_string);
        config
    }

    #[test]
    fn same_token_across_bracket_styles() {
        let m = BracketTokenMatcher;
        let a = m.hardware_token(&with_path(Some("HD USB Camera (USB-0000:00:14.0-3)")));
        let b = m.hardware_token(&with_path(Some("/dev/video2 [usb-0000:00:14.0-3]")));
        assert_eq!(a.as_deref(), Some("usb-0000:00:14.0-3"));
        assert_eq!(a, b);
    }

    #[test]
    fn picks_last_token() {
        let m = BracketTokenMatcher;
        let token = m.hardware_token(&with_path(Some(
            r"\\?\usb#vid_046d&pid_0825 (mi_00) {6&2f2e0e5&0&0000}",
        )));
        assert_eq!(token.as_deref(), Some("6&2f2e0e5&0&0000"));
    }

    #[test]
    fn no_token() {
        let m = BracketTokenMatcher;
        assert_eq!(m.hardware_token(&with_path(None)), None);
        assert_eq!(m.hardware_token(&with_path(Some("/dev/video0"))), None);
        assert_eq!(m.hardware_token(&with_path(Some("cam ()"))), None);
    }
}
