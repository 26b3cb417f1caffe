use serde::{Deserialize, Serialize};

/// Frame source state machine.
///
/// State transitions:
/// ```text
/// stopped → starting → running ↔ paused
///    ↑         │          │        │
///    └─────────┴──────────┴────────┘
/// ```
/// `Stopped` holds no OS resources. Recording is an orthogonal flag on top
/// of `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    #[default]
    Stopped,
    Starting,
    Running,
    Paused,
}

impl SourceState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn can_transition_to(&self, next: SourceState) -> bool {
        use SourceState::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopped)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopped)
                | (Paused, Stopped)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_path() {
        assert!(SourceState::Stopped.can_transition_to(SourceState::Starting));
        assert!(SourceState::Starting.can_transition_to(SourceState::Running));
        assert!(SourceState::Starting.can_transition_to(SourceState::Stopped));
    }

    #[test]
    fn pause_only_from_running() {
        assert!(SourceState::Running.can_transition_to(SourceState::Paused));
        assert!(SourceState::Paused.can_transition_to(SourceState::Running));
        assert!(!SourceState::Stopped.can_transition_to(SourceState::Paused));
        assert!(!SourceState::Starting.can_transition_to(SourceState::Paused));
    }

    #[test]
    fn no_skipping_starting() {
        assert!(!SourceState::Stopped.can_transition_to(SourceState::Running));
    }
}
