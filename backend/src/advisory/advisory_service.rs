use std::sync::Arc;

use log::{error, info};
use shared::{Advisory, Guidance};

use super::prompt::{build_prompt, format_percent};
use crate::llm::gemini_service::{CompletionClient, LlmError};
use crate::ml::ml_service::MlResult;

/// Predictions below this score never reach the LLM.
pub const CONFIDENCE_THRESHOLD: f64 = 0.60;

pub const LOW_CONFIDENCE_EXPLANATION: &str = "The AI model is not confident enough to provide a definitive diagnosis from the provided data. Please upload a clearer image of the leaf or verify your soil NPK values.";
pub const NOT_AVAILABLE: &str = "N/A";
pub const DEGRADED_EXPLANATION: &str =
    "ML analysis succeeded, but the LLM detailed advisory service is temporarily unavailable.";
pub const DEGRADED_ERROR: &str = "Advisory generation failed";

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("LLM output is not a valid advisory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strips a surrounding markdown code fence, if any.
pub fn sanitize_llm_output(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_guidance(raw: &str) -> Result<Guidance, serde_json::Error> {
    serde_json::from_str(sanitize_llm_output(raw))
}

pub fn low_confidence_guidance() -> Guidance {
    Guidance {
        explanation: LOW_CONFIDENCE_EXPLANATION.to_string(),
        recommended_fertilizer: NOT_AVAILABLE.to_string(),
        dosage_per_acre: NOT_AVAILABLE.to_string(),
        precautions: NOT_AVAILABLE.to_string(),
        organic_alternative: NOT_AVAILABLE.to_string(),
    }
}

#[derive(Clone)]
pub struct AdvisoryService {
    llm: Arc<dyn CompletionClient>,
}

impl AdvisoryService {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Never fails: low confidence and LLM trouble both come back as data.
    pub async fn generate_advisory(&self, result: &MlResult) -> Advisory {
        let confidence = result.confidence();
        if confidence < CONFIDENCE_THRESHOLD {
            info!(
                "Skipping LLM advisory for {}: confidence {} is below threshold",
                result.kind(),
                format_percent(confidence)
            );
            return Advisory::Guided {
                prediction: result.payload.clone(),
                guidance: low_confidence_guidance(),
            };
        }

        match self.synthesize(result).await {
            Ok(guidance) => Advisory::Guided {
                prediction: result.payload.clone(),
                guidance,
            },
            Err(e) => {
                error!("Gemini AI API Error: {}", e);
                Advisory::Degraded {
                    prediction: result.payload.clone(),
                    explanation: DEGRADED_EXPLANATION.to_string(),
                    error: DEGRADED_ERROR.to_string(),
                }
            }
        }
    }

    async fn synthesize(&self, result: &MlResult) -> Result<Guidance, AdvisoryError> {
        let prompt = build_prompt(&result.prediction);
        let raw = self.llm.generate(prompt.system, &prompt.user).await?;
        Ok(parse_guidance(&raw)?)
    }
}
