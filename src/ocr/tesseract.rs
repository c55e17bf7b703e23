//! Tesseract command-line engine
//!
//! Each recognize call runs one `tesseract` process, feeding the image as PNG
//! on stdin and reading plain text from stdout.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{OcrEngine, OcrEngineFactory, LABEL_WHITELIST};
use crate::error::OcrError;

/// Tesseract invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Program name or path
    pub binary: String,
    /// Traineddata language
    pub language: String,
    /// Page segmentation mode (6 = single uniform block of text)
    pub page_seg_mode: u8,
    /// Allowed output characters
    pub whitelist: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            page_seg_mode: 6,
            whitelist: LABEL_WHITELIST.to_string(),
        }
    }
}

impl TesseractConfig {
    fn args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            self.page_seg_mode.to_string(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={}", self.whitelist),
        ]
    }
}

/// One logical Tesseract worker
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        let mut child = Command::new(&self.config.binary)
            .args(self.config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("tesseract stdin unavailable".to_string()))?;

        let feed = async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        fed?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builds Tesseract engines after checking the program can be launched
#[derive(Debug, Clone, Default)]
pub struct TesseractFactory {
    config: TesseractConfig,
}

impl TesseractFactory {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OcrEngineFactory for TesseractFactory {
    async fn build(&self, worker: usize) -> Result<Box<dyn OcrEngine>, OcrError> {
        let output = Command::new(&self.config.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| OcrError::Construction {
                worker,
                message: format!("cannot launch {}: {}", self.config.binary, e),
            })?;

        if !output.status.success() {
            return Err(OcrError::Construction {
                worker,
                message: format!("{} --version exited with {}", self.config.binary, output.status),
            });
        }

        if worker == 0 {
            let banner = String::from_utf8_lossy(&output.stdout);
            info!(
                "Using {} ({})",
                self.config.binary,
                banner.lines().next().unwrap_or("unknown version")
            );
        }
        debug!("Tesseract worker {} ready", worker);

        Ok(Box::new(TesseractEngine::new(self.config.clone())))
    }
}
