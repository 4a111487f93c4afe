//! Path execution states and the pure transition table

use serde::{Deserialize, Serialize};

/// Path execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionState {
    /// Popping the next path and commanding its first pose
    Starting,
    /// Waiting for the arm to settle on the first pose
    MovingToFirstPoint,
    /// Streaming the remaining poses with the tool active
    ExecutingPath,
    /// Deciding between the next path and completion
    TransitionBetweenPaths,
    /// All paths executed
    Completed,
    /// A command failed, timed out or was aborted
    Error,
}

impl MotionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MotionState::Completed | MotionState::Error)
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    /// Move to the first pose was accepted
    StartIssued,
    /// No path was queued
    QueueEmpty,
    /// Arm settled on the first pose and the tool is active
    FirstPointReached,
    /// Every pose of the path was streamed and reached
    PathFinished,
    /// More paths are queued
    NextPath,
    /// Queue exhausted
    AllPathsDone,
    /// Command rejected, settle timeout or tool failure
    Fault,
    /// Stop requested
    Abort,
}

/// Transition table. `None` means the event is not valid in `state`.
pub fn transition(state: MotionState, event: MotionEvent) -> Option<MotionState> {
    use MotionEvent::*;
    use MotionState::*;

    match (state, event) {
        (Starting, StartIssued) => Some(MovingToFirstPoint),
        (Starting, QueueEmpty) => Some(Completed),
        (MovingToFirstPoint, FirstPointReached) => Some(ExecutingPath),
        (ExecutingPath, PathFinished) => Some(TransitionBetweenPaths),
        (TransitionBetweenPaths, NextPath) => Some(Starting),
        (TransitionBetweenPaths, AllPathsDone) => Some(Completed),

        // Any live state can fail
        (s, Fault | Abort) if !s.is_terminal() => Some(Error),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_cycle() {
        let mut state = MotionState::Starting;
        for event in [
            MotionEvent::StartIssued,
            MotionEvent::FirstPointReached,
            MotionEvent::PathFinished,
            MotionEvent::NextPath,
        ] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, MotionState::Starting);
    }

    #[test]
    fn test_fault_from_every_live_state() {
        for state in [
            MotionState::Starting,
            MotionState::MovingToFirstPoint,
            MotionState::ExecutingPath,
            MotionState::TransitionBetweenPaths,
        ] {
            assert_eq!(
                transition(state, MotionEvent::Fault),
                Some(MotionState::Error)
            );
            assert_eq!(
                transition(state, MotionEvent::Abort),
                Some(MotionState::Error)
            );
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        for state in [MotionState::Completed, MotionState::Error] {
            assert_eq!(transition(state, MotionEvent::Fault), None);
            assert_eq!(transition(state, MotionEvent::NextPath), None);
        }
    }

    #[test]
    fn test_skipping_states_is_invalid() {
        assert_eq!(
            transition(MotionState::Starting, MotionEvent::PathFinished),
            None
        );
        assert_eq!(
            transition(MotionState::ExecutingPath, MotionEvent::AllPathsDone),
            None
        );
    }
}
