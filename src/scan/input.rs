//! Tap input fan-out.
//!
//! A tap on the preview both focuses the device at that point and starts a scan. The
//! two reactions subscribe to the same [`InputBus`] independently, so a failed focus
//! never blocks a scan and a busy scanner never swallows a focus hint.

use std::sync::Arc;

use log::{debug, warn};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use super::{CaptureProvider, FocusPoint, ScanController, ScanOutcome};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapEvent {
    pub point: FocusPoint,
}

impl TapEvent {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            point: FocusPoint { x, y },
        }
    }
}

#[derive(Clone)]
pub struct InputBus {
    sender: broadcast::Sender<TapEvent>,
}

impl InputBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers saw the tap.
    pub fn publish(&self, tap: TapEvent) -> usize {
        self.sender.send(tap).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TapEvent> {
        self.sender.subscribe()
    }
}

async fn next_tap(rx: &mut broadcast::Receiver<TapEvent>) -> Option<TapEvent> {
    loop {
        match rx.recv().await {
            Ok(tap) => return Some(tap),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Input subscriber lagged, dropped {skipped} tap(s)");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

pub fn spawn_focus_subscriber(bus: &InputBus, capture: Arc<dyn CaptureProvider>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Some(tap) = next_tap(&mut rx).await {
            if let Err(err) = capture.focus(tap.point).await {
                warn!("Focus at ({:.0}, {:.0}) failed: {err}", tap.point.x, tap.point.y);
            }
        }
        debug!("Focus subscriber stopped");
    })
}

/// Each tap activates the scanner on its own task; taps landing while a cycle is in
/// flight come back as [`ScanOutcome::Ignored`].
pub fn spawn_scan_subscriber(
    bus: &InputBus,
    controller: ScanController,
    outcomes: mpsc::UnboundedSender<ScanOutcome>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while next_tap(&mut rx).await.is_some() {
            let controller = controller.clone();
            let outcomes = outcomes.clone();
            tokio::spawn(async move {
                let outcome = controller.activate().await;
                let _ = outcomes.send(outcome);
            });
        }
        debug!("Scan subscriber stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CaptureError, RecognitionError},
        scan::{CapturedImage, OcrResult, PermissionStatus, TextRecognizer},
        storage::MemoryStore,
        texts::RecognizedTextStore,
    };
    use async_trait::async_trait;
    use std::{path::PathBuf, sync::Mutex};

    #[derive(Default)]
    struct RecordingCapture {
        focused: Mutex<Vec<FocusPoint>>,
        fail_focus: bool,
    }

    #[async_trait]
    impl CaptureProvider for RecordingCapture {
        async fn permission(&self) -> PermissionStatus {
            PermissionStatus::Granted
        }

        async fn focus(&self, point: FocusPoint) -> Result<(), CaptureError> {
            self.focused.lock().unwrap().push(point);
            if self.fail_focus {
                return Err(CaptureError::NoDevice("focus unsupported".into()));
            }
            Ok(())
        }

        async fn capture(&self) -> Result<CapturedImage, CaptureError> {
            Ok(CapturedImage::new(PathBuf::from("/photos/tap.jpg")))
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl TextRecognizer for Fixed {
        async fn recognize(&self, _image: &CapturedImage) -> Result<OcrResult, RecognitionError> {
            Ok(OcrResult::from_text(self.0))
        }
    }

    async fn run_taps(capture: Arc<RecordingCapture>, taps: &[TapEvent]) -> Vec<ScanOutcome> {
        let store = RecognizedTextStore::new(Arc::new(MemoryStore::new()));
        let controller = ScanController::new(capture.clone(), Arc::new(Fixed("Menu")), store);

        let bus = InputBus::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let focus = spawn_focus_subscriber(&bus, capture);
        let scan = spawn_scan_subscriber(&bus, controller, tx);

        for tap in taps {
            assert_eq!(bus.publish(*tap), 2);
        }
        drop(bus);
        focus.await.unwrap();
        scan.await.unwrap();

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    #[tokio::test]
    async fn tap_focuses_and_scans() {
        let capture = Arc::new(RecordingCapture::default());
        let outcomes = run_taps(capture.clone(), &[TapEvent::at(120.0, 340.0)]).await;

        assert_eq!(
            *capture.focused.lock().unwrap(),
            vec![FocusPoint { x: 120.0, y: 340.0 }]
        );
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].saved().unwrap().text, "Menu");
    }

    #[tokio::test]
    async fn focus_failure_does_not_block_scanning() {
        let capture = Arc::new(RecordingCapture {
            fail_focus: true,
            ..Default::default()
        });
        let outcomes = run_taps(capture.clone(), &[TapEvent::at(1.0, 2.0)]).await;

        assert_eq!(capture.focused.lock().unwrap().len(), 1);
        assert!(outcomes[0].saved().is_some());
    }

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = InputBus::new(4);
        assert_eq!(bus.publish(TapEvent::at(0.0, 0.0)), 0);
    }
}
