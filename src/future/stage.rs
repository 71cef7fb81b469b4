use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle position of a [`Future`](crate::Future).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    NotStarted = 0,
    Submitted = 1,
    Running = 2,
    TargetInvoked = 3,
    Completed = 4,
    Aborted = 5,
    TimedOut = 6,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Aborted | Stage::TimedOut)
    }

    fn from_u8(raw: u8) -> Stage {
        match raw {
            0 => Stage::NotStarted,
            1 => Stage::Submitted,
            2 => Stage::Running,
            3 => Stage::TargetInvoked,
            4 => Stage::Completed,
            5 => Stage::Aborted,
            _ => Stage::TimedOut,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::NotStarted => "NOT_STARTED",
            Stage::Submitted => "SUBMITTED",
            Stage::Running => "RUNNING",
            Stage::TargetInvoked => "TARGET_INVOKED",
            Stage::Completed => "COMPLETED",
            Stage::Aborted => "ABORTED",
            Stage::TimedOut => "TIMEDOUT",
        };
        f.write_str(label)
    }
}

/// Stage cell shared between the owner, pool workers and waiters.
///
/// Transitions only move forward and a terminal stage is never left.
pub(crate) struct AtomicStage(AtomicU8);

impl AtomicStage {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Stage::NotStarted as u8))
    }

    pub(crate) fn load(&self) -> Stage {
        Stage::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `to` unless the current stage is terminal or already past it.
    /// `Completed` is only reachable from `TargetInvoked`.
    pub(crate) fn advance(&self, to: Stage) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                let current = Stage::from_u8(raw);
                let allowed = match to {
                    Stage::Completed => current == Stage::TargetInvoked,
                    Stage::Aborted | Stage::TimedOut => !current.is_terminal(),
                    _ => !current.is_terminal() && to > current,
                };
                allowed.then_some(to as u8)
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let stage = AtomicStage::new();
        assert!(stage.advance(Stage::Submitted));
        assert!(stage.advance(Stage::Running));
        assert!(!stage.advance(Stage::Submitted));
        assert!(!stage.advance(Stage::Completed));
        assert!(stage.advance(Stage::TargetInvoked));
        assert!(stage.advance(Stage::Completed));
        assert_eq!(stage.load(), Stage::Completed);
    }

    #[test]
    fn test_terminal_stage_is_sticky() {
        let stage = AtomicStage::new();
        assert!(stage.advance(Stage::Aborted));
        assert!(!stage.advance(Stage::TimedOut));
        assert!(!stage.advance(Stage::Running));
        assert_eq!(stage.load(), Stage::Aborted);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(Stage::TargetInvoked.to_string(), "TARGET_INVOKED");
        assert_eq!(Stage::TimedOut.to_string(), "TIMEDOUT");
    }
}
