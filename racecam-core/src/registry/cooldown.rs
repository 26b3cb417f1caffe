use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::device_key::DeviceKey;

/// Per-device record of the last failure, suppressing retries until the
/// retry delay has elapsed.
///
/// Entries older than the delay count as absent and are purged on read.
pub struct CooldownTracker {
    retry_delay: Duration,
    failures: Mutex<HashMap<DeviceKey, Instant>>,
}

impl CooldownTracker {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn record_failure(&self, key: &DeviceKey) {
        self.record_failure_at(key, Instant::now());
    }

    pub fn record_failure_at(&self, key: &DeviceKey, at: Instant) {
        log::warn!(
            "{} failed, retry suppressed for {} ms",
            key,
            self.retry_delay.as_millis()
        );
        self.failures.lock().insert(key.clone(), at);
    }

    pub fn in_cooldown(&self, key: &DeviceKey) -> bool {
        self.in_cooldown_at(key, Instant::now())
    }

    pub fn in_cooldown_at(&self, key: &DeviceKey, now: Instant) -> bool {
        let mut failures = self.failures.lock();
        let Some(failed_at) = failures.get(key).copied() else {
            return false;
        };
        if now.saturating_duration_since(failed_at) < self.retry_delay {
            return true;
        }
        failures.remove(key);
        false
    }

    /// Forget a failure, e.g. after the device started successfully.
    pub fn clear(&self, key: &DeviceKey) {
        self.failures.lock().remove(key);
    }

    /// Number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device_config::{DeviceConfig, FrameworkType, Mode, PixelFormat};

    fn key(path: &str) -> DeviceKey {
        let mut config = DeviceConfig::new(
            "CamA",
            Mode {
                width: 640,
                height: 480,
                frame_rate: 30.0,
                pixel_format: PixelFormat::Yuy2,
                framework: FrameworkType::V4l2,
            },
        );
        config.platform_path = Some(path.into());
        DeviceKey::resolve(&config)
    }

    #[test]
    fn cooldown_starts_immediately() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let k = key("/dev/camA");
        let t0 = Instant::now();

        tracker.record_failure_at(&k, t0);
        assert!(tracker.in_cooldown_at(&k, t0));
        assert!(tracker.in_cooldown_at(&k, t0 + Duration::from_millis(4999)));
    }

    #[test]
    fn expires_without_reset() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let k = key("/dev/camA");
        let t0 = Instant::now();

        tracker.record_failure_at(&k, t0);
        assert!(!tracker.in_cooldown_at(&k, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn expired_entries_are_purged_on_read() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let k = key("/dev/camA");
        let t0 = Instant::now();

        tracker.record_failure_at(&k, t0);
        assert_eq!(tracker.len(), 1);

        tracker.in_cooldown_at(&k, t0 + Duration::from_secs(6));
        assert!(tracker.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let a = key("/dev/camA");
        let b = key("/dev/camB");

        tracker.record_failure(&a);
        assert!(tracker.in_cooldown(&a));
        assert!(!tracker.in_cooldown(&b));
    }

    #[test]
    fn later_failure_extends_cooldown() {
        let tracker = CooldownTracker::new(Duration::from_secs(5));
        let k = key("/dev/camA");
        let t0 = Instant::now();

        tracker.record_failure_at(&k, t0);
        tracker.record_failure_at(&k, t0 + Duration::from_secs(3));
        assert!(tracker.in_cooldown_at(&k, t0 + Duration::from_secs(6)));
    }
}
