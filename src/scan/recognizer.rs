use std::path::Path;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use tokio::process::Command;

use super::CapturedImage;
use crate::error::RecognitionError;

pub const IMAGE_PLACEHOLDER: &str = "{image}";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub text: String,
    pub word_count: u64,
}

impl OcrResult {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count() as u64;
        Self { text, word_count }
    }
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Extracts whatever text the image holds. An image without text yields an empty
    /// string rather than an error.
    async fn recognize(&self, image: &CapturedImage) -> Result<OcrResult, RecognitionError>;
}

/// Runs an external OCR program and reads the recognized text from its stdout.
///
/// `{image}` in the arguments is replaced with the image path; when no argument
/// mentions it, the path is appended. The image is decoded before the program runs so
/// unreadable captures fail fast with [`RecognitionError::Decode`].
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn tesseract() -> Self {
        Self::new("tesseract", vec![IMAGE_PLACEHOLDER.into(), "stdout".into()])
    }

    fn command_args(&self, image: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(IMAGE_PLACEHOLDER, &image))
            .collect();

        if !self.args.iter().any(|arg| arg.contains(IMAGE_PLACEHOLDER)) {
            args.push(image.into_owned());
        }
        args
    }
}

#[async_trait]
impl TextRecognizer for CommandRecognizer {
    async fn recognize(&self, image: &CapturedImage) -> Result<OcrResult, RecognitionError> {
        let path = image.path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
            .await
            .map_err(|err| RecognitionError::Engine(format!("decode task failed: {err}")))?
            .map_err(|err| RecognitionError::Decode {
                path: image.path.clone(),
                reason: err.to_string(),
            })?;

        debug!(
            "Running {} on {} ({}x{})",
            self.program,
            image.path.display(),
            width,
            height
        );

        let output = Command::new(&self.program)
            .args(self.command_args(&image.path))
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(OcrResult::from_text(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}
