//! Ollama-backed advisor

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Advisor, AdvisorConfig, AdvisorRequest, AdvisorResponse};
use crate::error::AdvisorError;

const USER_AGENT: &str = concat!("lumiscan/", env!("CARGO_PKG_VERSION"));
const TEMPERATURE: f32 = 0.1;
const MAX_RESPONSE_TOKENS: u32 = 300;

/// Envelope of a non-streaming `/api/generate` reply
#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

/// JSON object the model is asked to produce
#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    power: Option<serde_json::Value>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Client for a local Ollama server
pub struct OllamaAdvisor {
    http_client: reqwest::Client,
    host: String,
    model: String,
    probe_timeout: Duration,
}

impl OllamaAdvisor {
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http_client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs.max(1)),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

#[async_trait]
impl Advisor for OllamaAdvisor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        let probe = self
            .http_client
            .get(self.endpoint("/api/tags"))
            .timeout(self.probe_timeout)
            .send()
            .await;

        match probe {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama probe failed: {}", e);
                false
            }
        }
    }

    async fn advise(&self, request: AdvisorRequest) -> Result<AdvisorResponse, AdvisorError> {
        let body = json!({
            "model": self.model,
            "prompt": build_prompt(&request.ocr_text_hint, &request.known_models),
            "images": [STANDARD.encode(&request.image_jpeg)],
            "stream": false,
            "format": "json",
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": MAX_RESPONSE_TOKENS,
            },
        });

        let response = self
            .http_client
            .post(self.endpoint("/api/generate"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Ollama returned {}", status);
            return Err(AdvisorError::Status(status.as_u16()));
        }

        let reply: GenerateReply = response.json().await?;
        parse_verdict(&reply.response)
    }
}

fn build_prompt(ocr_text: &str, known_models: &[String]) -> String {
    format!(
        r#"ROLE: Street lighting inventory inspector.

INPUT:
1. OCR TEXT READ FROM THE NAMEPLATE: "{ocr_text}" (may contain misreads such as '06' for '60' or '0' for 'O').
2. IMAGE: attached.
3. KNOWN MODELS: [{known}]

TASK: Identify the luminaire model and its rated power in watts.

RULES:
1. Cross-check the OCR text against the image. Trust the image when they disagree.
2. Correct OCR noise (e.g. "V0LTANA" -> "VOLTANA") using the known models.
3. A two-digit code with a leading zero ("06", "08") means tens of watts (60 W, 80 W).
4. If the image does not show a luminaire, set model to null.

OUTPUT JSON ONLY:
{{"model": "NAME (UPPERCASE)", "power": NUMBER, "reasoning": "how OCR text and image were combined"}}"#,
        ocr_text = ocr_text,
        known = known_models.join(", ")
    )
}

/// Parse the model's JSON answer. Placeholder names count as no model.
fn parse_verdict(raw: &str) -> Result<AdvisorResponse, AdvisorError> {
    let verdict: Verdict =
        serde_json::from_str(raw.trim()).map_err(|e| AdvisorError::Malformed(e.to_string()))?;

    let model = verdict
        .model
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty() && m != "NAME" && m != "NULL" && m != "NAME (UPPERCASE)");

    let power = verdict.power.and_then(|value| match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|p| u32::try_from(p).ok()),
        _ => None,
    });

    Ok(AdvisorResponse {
        model,
        power,
        reasoning: verdict
            .reasoning
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "AI analysis".to_string()),
    })
}
