use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CaptureError;

/// Screen coordinate of a tap, in the presenter's points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    NotDetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// An image produced by a capture provider, handed to the recognizer by path.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub id: Uuid,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            captured_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn permission(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus {
        self.permission().await
    }

    /// Hint the device to focus at `point`. Devices without focus control ignore it.
    async fn focus(&self, point: FocusPoint) -> Result<(), CaptureError> {
        let _ = point;
        Ok(())
    }

    async fn capture(&self) -> Result<CapturedImage, CaptureError>;
}

/// Captures from a still image on disk. `source` is either an image file or a drop
/// directory, in which case the most recently modified image is taken.
pub struct StillImageCapture {
    source: PathBuf,
}

impl StillImageCapture {
    pub fn new(source: PathBuf) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    async fn newest_image_in(&self, dir: &Path) -> Result<PathBuf, CaptureError> {
        let io_err = |source| CaptureError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if ImageFormat::from_path(&path).is_err() {
                continue;
            }
            let metadata = entry.metadata().await.map_err(io_err)?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
                newest = Some((modified, path));
            }
        }

        newest
            .map(|(_, path)| path)
            .ok_or_else(|| CaptureError::NoDevice(format!("no images in {}", dir.display())))
    }
}

#[async_trait]
impl CaptureProvider for StillImageCapture {
    async fn permission(&self) -> PermissionStatus {
        match tokio::fs::metadata(&self.source).await {
            Err(err) if err.kind() == ErrorKind::PermissionDenied => PermissionStatus::Denied,
            _ => PermissionStatus::Granted,
        }
    }

    async fn focus(&self, point: FocusPoint) -> Result<(), CaptureError> {
        debug!(
            "Still image source has fixed focus, ignoring ({:.0}, {:.0})",
            point.x, point.y
        );
        Ok(())
    }

    async fn capture(&self) -> Result<CapturedImage, CaptureError> {
        let metadata = match tokio::fs::metadata(&self.source).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(CaptureError::NoDevice(format!(
                    "capture source {} does not exist",
                    self.source.display()
                )))
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(CaptureError::PermissionDenied)
            }
            Err(source) => {
                return Err(CaptureError::Io {
                    path: self.source.clone(),
                    source,
                })
            }
        };

        let path = if metadata.is_dir() {
            self.newest_image_in(&self.source).await?
        } else {
            self.source.clone()
        };

        debug!("Captured still image {}", path.display());
        Ok(CapturedImage::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, thread, time::Duration};

    #[tokio::test]
    async fn file_source_is_captured_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        fs::write(&path, b"not decoded here").unwrap();

        let capture = StillImageCapture::new(path.clone());
        assert_eq!(capture.permission().await, PermissionStatus::Granted);
        assert_eq!(capture.capture().await.unwrap().path, path);
    }

    #[tokio::test]
    async fn directory_source_picks_newest_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.png"), b"a").unwrap();
        thread::sleep(Duration::from_millis(20));
        fs::write(dir.path().join("new.jpg"), b"b").unwrap();
        thread::sleep(Duration::from_millis(20));
        fs::write(dir.path().join("notes.txt"), b"c").unwrap();

        let capture = StillImageCapture::new(dir.path().to_path_buf());
        let image = capture.capture().await.unwrap();
        assert_eq!(image.path, dir.path().join("new.jpg"));
    }

    #[tokio::test]
    async fn missing_source_is_no_device() {
        let dir = tempfile::tempdir().unwrap();
        let capture = StillImageCapture::new(dir.path().join("absent"));

        assert!(matches!(
            capture.capture().await,
            Err(CaptureError::NoDevice(_))
        ));
    }

    #[tokio::test]
    async fn directory_without_images_is_no_device() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let capture = StillImageCapture::new(dir.path().to_path_buf());
        assert!(matches!(
            capture.capture().await,
            Err(CaptureError::NoDevice(_))
        ));
    }
}
