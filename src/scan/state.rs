use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{error::ScanFailure, models::RecognizedTextRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanStatus {
    Idle,
    Capturing,
    Recognizing,
}

impl Default for ScanStatus {
    fn default() -> Self {
        ScanStatus::Idle
    }
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Capturing => "capturing",
            ScanStatus::Recognizing => "recognizing",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub status: ScanStatus,
    pub cycle_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_cycles: u64,
    #[serde(skip)]
    pub cancel_token: Option<CancellationToken>,
}

impl ScanState {
    pub fn is_busy(&self) -> bool {
        self.status != ScanStatus::Idle
    }

    pub fn begin(&mut self, cycle_id: Uuid, cancel_token: CancellationToken, now: DateTime<Utc>) {
        self.status = ScanStatus::Capturing;
        self.cycle_id = Some(cycle_id);
        self.started_at = Some(now);
        self.cancel_token = Some(cancel_token);
    }

    pub fn enter_recognizing(&mut self) {
        if self.status == ScanStatus::Capturing {
            self.status = ScanStatus::Recognizing;
        }
    }

    /// Back to idle, whatever the cycle ended with.
    pub fn finish(&mut self) {
        if self.is_busy() {
            self.completed_cycles = self.completed_cycles.saturating_add(1);
        }
        self.status = ScanStatus::Idle;
        self.cycle_id = None;
        self.started_at = None;
        self.cancel_token = None;
    }
}

/// What one activation of the scan controller ended with.
#[derive(Debug)]
pub enum ScanOutcome {
    Saved(RecognizedTextRecord),
    NothingRecognized,
    /// Another cycle was already in flight.
    Ignored,
    PermissionDenied,
    Cancelled,
    Failed(ScanFailure),
}

impl ScanOutcome {
    pub fn saved(&self) -> Option<&RecognizedTextRecord> {
        match self {
            ScanOutcome::Saved(record) => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_counts_completed_cycles() {
        let mut state = ScanState::default();
        assert!(!state.is_busy());

        state.begin(Uuid::new_v4(), CancellationToken::new(), Utc::now());
        assert_eq!(state.status, ScanStatus::Capturing);
        state.enter_recognizing();
        assert_eq!(state.status, ScanStatus::Recognizing);
        assert!(state.is_busy());

        state.finish();
        assert_eq!(state.status, ScanStatus::Idle);
        assert!(state.cycle_id.is_none() && state.cancel_token.is_none());
        assert_eq!(state.completed_cycles, 1);

        state.finish();
        assert_eq!(state.completed_cycles, 1);
    }

    #[test]
    fn recognizing_requires_capturing() {
        let mut state = ScanState::default();
        state.enter_recognizing();
        assert_eq!(state.status, ScanStatus::Idle);
    }
}
