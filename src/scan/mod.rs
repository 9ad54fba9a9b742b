pub mod capture;
pub mod controller;
pub mod input;
pub mod recognizer;
pub mod state;

pub use capture::{CaptureProvider, CapturedImage, FocusPoint, PermissionStatus, StillImageCapture};
pub use controller::{ScanController, ScanTimeouts};
pub use input::{spawn_focus_subscriber, spawn_scan_subscriber, InputBus, TapEvent};
pub use recognizer::{CommandRecognizer, OcrResult, TextRecognizer};
pub use state::{ScanOutcome, ScanState, ScanStatus};
