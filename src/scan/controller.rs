use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::watch, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{CaptureProvider, PermissionStatus, ScanOutcome, ScanState, TextRecognizer};
use crate::{
    error::{CaptureError, ScanFailure, ScanStage},
    texts::RecognizedTextStore,
};

// Set to true to enable per-cycle logging in this module
const ENABLE_LOGS: bool = true;

use crate::{cycle_debug, cycle_error, cycle_info, cycle_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTimeouts {
    pub capture: Duration,
    pub recognition: Duration,
}

impl Default for ScanTimeouts {
    fn default() -> Self {
        Self {
            capture: Duration::from_secs(10),
            recognition: Duration::from_secs(30),
        }
    }
}

/// Runs capture → recognize → save cycles, at most one at a time.
///
/// Activations that arrive while a cycle is in flight are dropped, not queued. The
/// state always returns to idle when a cycle ends, including when the
/// activating future is dropped halfway.
#[derive(Clone)]
pub struct ScanController {
    capture: Arc<dyn CaptureProvider>,
    recognizer: Arc<dyn TextRecognizer>,
    store: RecognizedTextStore,
    state: Arc<watch::Sender<ScanState>>,
    timeouts: ScanTimeouts,
}

struct IdleOnDrop<'a> {
    state: &'a watch::Sender<ScanState>,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.state.send_modify(ScanState::finish);
    }
}

impl ScanController {
    pub fn new(
        capture: Arc<dyn CaptureProvider>,
        recognizer: Arc<dyn TextRecognizer>,
        store: RecognizedTextStore,
    ) -> Self {
        let (state, _) = watch::channel(ScanState::default());
        Self {
            capture,
            recognizer,
            store,
            state: Arc::new(state),
            timeouts: ScanTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ScanTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn store(&self) -> &RecognizedTextStore {
        &self.store
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    pub async fn permission(&self) -> PermissionStatus {
        self.capture.permission().await
    }

    pub async fn request_permission(&self) -> PermissionStatus {
        self.capture.request_permission().await
    }

    /// Cancels the cycle in flight, if any. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        let token = self.state.borrow().cancel_token.clone();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn activate(&self) -> ScanOutcome {
        let cycle_id = Uuid::new_v4();
        let token = CancellationToken::new();

        let began = self.state.send_if_modified(|state| {
            if state.is_busy() {
                return false;
            }
            state.begin(cycle_id, token.clone(), Utc::now());
            true
        });

        if !began {
            log::debug!("Scan already in progress, ignoring activation");
            return ScanOutcome::Ignored;
        }

        let _idle = IdleOnDrop { state: &self.state };
        let outcome = self.run_cycle(cycle_id, &token).await;
        log_outcome(cycle_id, &outcome);
        outcome
    }

    async fn run_cycle(&self, cycle_id: Uuid, token: &CancellationToken) -> ScanOutcome {
        cycle_debug!(cycle_id, "capturing");
        let captured = tokio::select! {
            biased;
            _ = token.cancelled() => return ScanOutcome::Cancelled,
            result = time::timeout(self.timeouts.capture, self.capture.capture()) => result,
        };

        let image = match captured {
            Ok(Ok(image)) => image,
            Ok(Err(CaptureError::PermissionDenied)) => return ScanOutcome::PermissionDenied,
            Ok(Err(err)) => return ScanOutcome::Failed(err.into()),
            Err(_) => {
                return ScanOutcome::Failed(ScanFailure::TimedOut(
                    ScanStage::Capture,
                    self.timeouts.capture,
                ))
            }
        };

        self.state.send_modify(ScanState::enter_recognizing);
        cycle_debug!(
            cycle_id,
            "recognizing image {} from {} (captured {})",
            image.id,
            image.path.display(),
            image.captured_at.to_rfc3339()
        );

        let recognized = tokio::select! {
            biased;
            _ = token.cancelled() => return ScanOutcome::Cancelled,
            result = time::timeout(self.timeouts.recognition, self.recognizer.recognize(&image)) => result,
        };

        let result = match recognized {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => return ScanOutcome::Failed(err.into()),
            Err(_) => {
                return ScanOutcome::Failed(ScanFailure::TimedOut(
                    ScanStage::Recognition,
                    self.timeouts.recognition,
                ))
            }
        };

        cycle_debug!(cycle_id, "recognized {} word(s)", result.word_count);
        if result.text.trim().is_empty() {
            return ScanOutcome::NothingRecognized;
        }
        if token.is_cancelled() {
            return ScanOutcome::Cancelled;
        }

        match self.store.append(&result.text).await {
            Ok(Some(record)) => ScanOutcome::Saved(record),
            Ok(None) => ScanOutcome::NothingRecognized,
            Err(err) => ScanOutcome::Failed(err.into()),
        }
    }
}

fn log_outcome(cycle_id: Uuid, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Saved(record) => {
            cycle_info!(cycle_id, "saved {} char(s)", record.text.chars().count())
        }
        ScanOutcome::NothingRecognized => cycle_info!(cycle_id, "no text recognized"),
        ScanOutcome::PermissionDenied => cycle_warn!(cycle_id, "camera permission denied"),
        ScanOutcome::Cancelled => cycle_info!(cycle_id, "cancelled"),
        ScanOutcome::Failed(failure) => cycle_error!(cycle_id, "{failure}"),
        ScanOutcome::Ignored => {}
    }
}
