use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracking session.
///
/// Stopped is terminal until the next start; there is never more than one
/// active session at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    Idle,
    Tracking,
    Stopped,
}

impl TrackingState {
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }

    /// A new session may begin from Idle or from a finished session.
    pub fn can_start(&self) -> bool {
        matches!(self, TrackingState::Idle | TrackingState::Stopped)
    }
}

#[test]
fn start_allowed_from_idle_and_stopped_only() {
    assert!(TrackingState::Idle.can_start());
    assert!(TrackingState::Stopped.can_start());
    assert!(!TrackingState::Tracking.can_start());
}
