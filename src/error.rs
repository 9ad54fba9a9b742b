use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures raised by a [`CaptureProvider`](crate::scan::CaptureProvider).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission has not been granted")]
    PermissionDenied,
    #[error("no capture device available: {0}")]
    NoDevice(String),
    #[error("capture I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised by a [`TextRecognizer`](crate::scan::TextRecognizer).
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("image {path} could not be decoded: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("recognition I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the persistent key-value layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value under '{key}' is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Capture,
    Recognition,
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStage::Capture => f.write_str("capture"),
            ScanStage::Recognition => f.write_str("recognition"),
        }
    }
}

/// Why a scan cycle produced no record.
#[derive(Debug, Error)]
pub enum ScanFailure {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("saving recognized text failed: {0}")]
    Storage(#[from] StorageError),
    #[error("{0} timed out after {1:?}")]
    TimedOut(ScanStage, Duration),
}
