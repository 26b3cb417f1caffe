use serde::{Deserialize, Serialize};

use crate::models::available::Validity;
use crate::models::device_config::DeviceConfig;

/// Decides whether an enumerated device may be selected.
pub trait DeviceValidator: Send + Sync {
    fn validate(&self, config: &DeviceConfig) -> Validity;
}

/// A deny rule: case-insensitive substring of the device name or platform
/// path, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRule {
    pub pattern: String,
    pub reason: String,
}

/// Hardware/driver allow and deny lists.
///
/// Deny rules win. A non-empty allow list denies every device it does not
/// match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowDenyList {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<DenyRule>,
}

impl AllowDenyList {
    fn matches(config: &DeviceConfig, pattern: &str) -> bool {
        let pattern = pattern.to_lowercase();
        if config.name.to_lowercase().contains(&pattern) {
            return true;
        }
        config
            .platform_path
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains(&pattern))
    }
}

impl DeviceValidator for AllowDenyList {
    fn validate(&self, config: &DeviceConfig) -> Validity {
        if let Some(rule) = self.deny.iter().find(|r| Self::matches(config, &r.pattern)) {
            return Validity::Denied {
                reason: rule.reason.clone(),
            };
        }
        if !self.allow.is_empty() && !self.allow.iter().any(|p| Self::matches(config, p)) {
            return Validity::Denied {
                reason: "not on the supported hardware list".into(),
            };
        }
        Validity::Allowed
    }
}
