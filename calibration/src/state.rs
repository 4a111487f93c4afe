//! Calibration states and the pure transition table

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationState {
    Initializing,
    /// Searching for the chessboard to derive pixels per millimetre
    LookingForChessboard,
    ChessboardFound,
    /// Accumulating the required fiducial ids
    LookingForArucoMarkers,
    AllArucoFound,
    /// Converting fiducial pixels to robot corrections
    ComputeOffsets,
    /// Visual servo onto the current fiducial
    AlignRobot,
    /// Current fiducial recorded; terminal once every fiducial is done
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationEvent {
    Started,
    ChessboardDetected,
    ScaleComputed,
    AllMarkersSeen,
    MarkersLocked,
    OffsetsComputed,
    MarkerAligned,
    /// More fiducials remain to be servoed
    NextMarker,
}

/// Transition table. `None` means the event is not valid in `state`.
pub fn transition(state: CalibrationState, event: CalibrationEvent) -> Option<CalibrationState> {
    use CalibrationEvent::*;
    use CalibrationState::*;

    match (state, event) {
        (Initializing, Started) => Some(LookingForChessboard),
        (LookingForChessboard, ChessboardDetected) => Some(ChessboardFound),
        (ChessboardFound, ScaleComputed) => Some(LookingForArucoMarkers),
        (LookingForArucoMarkers, AllMarkersSeen) => Some(AllArucoFound),
        (AllArucoFound, MarkersLocked) => Some(ComputeOffsets),
        (ComputeOffsets, OffsetsComputed) => Some(AlignRobot),
        (AlignRobot, MarkerAligned) => Some(Done),
        (Done, NextMarker) => Some(AlignRobot),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence() {
        use CalibrationEvent::*;
        let mut state = CalibrationState::Initializing;
        for event in [
            Started,
            ChessboardDetected,
            ScaleComputed,
            AllMarkersSeen,
            MarkersLocked,
            OffsetsComputed,
            MarkerAligned,
            NextMarker,
            MarkerAligned,
        ] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, CalibrationState::Done);
    }

    #[test]
    fn test_cannot_skip_ahead() {
        assert_eq!(
            transition(CalibrationState::Initializing, CalibrationEvent::OffsetsComputed),
            None
        );
        assert_eq!(
            transition(CalibrationState::LookingForArucoMarkers, CalibrationEvent::MarkerAligned),
            None
        );
    }
}
