//! External Advisor
//!
//! Optional second opinion from a vision-capable model. The consensus engine
//! treats every advisor failure exactly like having no advisor at all.

pub mod ollama;

pub use ollama::OllamaAdvisor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdvisorError;

/// Upper bound on known-model hints sent with a request
pub const MAX_KNOWN_MODEL_HINTS: usize = 15;

/// What the advisor is shown
#[derive(Debug, Clone)]
pub struct AdvisorRequest {
    /// Full frame, JPEG encoded
    pub image_jpeg: Vec<u8>,
    /// Whatever OCR managed to read
    pub ocr_text_hint: String,
    /// Known labels, e.g. `VOLTANA (60W)`
    pub known_models: Vec<String>,
}

/// The advisor's reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub model: Option<String>,
    pub power: Option<u32>,
    pub reasoning: String,
}

/// A vision-capable advisor service
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Identifier shown in reasoning trails
    fn name(&self) -> &str;

    /// Cheap reachability probe
    async fn is_available(&self) -> bool;

    async fn advise(&self, request: AdvisorRequest) -> Result<AdvisorResponse, AdvisorError>;
}

/// Advisor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub enabled: bool,
    /// Base URL of the Ollama server
    pub host: String,
    /// Vision model to query
    pub model: String,
    /// Hard deadline for one analysis request
    pub timeout_secs: u64,
    /// Deadline for the availability probe
    pub probe_timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            timeout_secs: 20,
            probe_timeout_secs: 3,
        }
    }
}
