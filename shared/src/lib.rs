use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisKind {
    ImageAnalysis,
    SoilAnalysis,
}

/// Tabular soil input for the fertilizer recommender. Field names on the wire
/// match what the inference service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilReading {
    #[serde(rename = "N")]
    pub nitrogen: f64,
    #[serde(rename = "P")]
    pub phosphorus: f64,
    #[serde(rename = "K")]
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "cropType")]
    pub crop_type: String,
}

impl SoilReading {
    pub const FIELDS: [&'static str; 6] = ["N", "P", "K", "temperature", "humidity", "cropType"];
}

/// The inference service reports certainty as either `confidence` or
/// `probability`; both are accepted on every prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl ConfidenceScore {
    pub fn value(&self) -> f64 {
        self.confidence.or(self.probability).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    #[serde(default)]
    pub deficiency: String,
    #[serde(flatten)]
    pub score: ConfidenceScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerPrediction {
    #[serde(default)]
    pub fertilizer: String,
    #[serde(flatten)]
    pub score: ConfidenceScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MlPrediction {
    Disease(DiseasePrediction),
    Fertilizer(FertilizerPrediction),
}

impl MlPrediction {
    /// Decodes an inference payload into the variant fixed by `kind`.
    pub fn from_payload(kind: AnalysisKind, payload: &Value) -> Result<Self, serde_json::Error> {
        match kind {
            AnalysisKind::ImageAnalysis => {
                DiseasePrediction::deserialize(payload).map(MlPrediction::Disease)
            }
            AnalysisKind::SoilAnalysis => {
                FertilizerPrediction::deserialize(payload).map(MlPrediction::Fertilizer)
            }
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        match self {
            MlPrediction::Disease(_) => AnalysisKind::ImageAnalysis,
            MlPrediction::Fertilizer(_) => AnalysisKind::SoilAnalysis,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MlPrediction::Disease(p) => &p.deficiency,
            MlPrediction::Fertilizer(p) => &p.fertilizer,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            MlPrediction::Disease(p) => p.score.value(),
            MlPrediction::Fertilizer(p) => p.score.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guidance {
    pub explanation: String,
    pub recommended_fertilizer: String,
    pub dosage_per_acre: String,
    pub precautions: String,
    pub organic_alternative: String,
}

/// Final advisory returned to the client. `prediction` always carries the
/// inference payload exactly as the ML service sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Advisory {
    Guided {
        prediction: Value,
        #[serde(flatten)]
        guidance: Guidance,
    },
    Degraded {
        prediction: Value,
        explanation: String,
        error: String,
    },
}

impl Advisory {
    pub fn prediction(&self) -> &Value {
        match self {
            Advisory::Guided { prediction, .. } | Advisory::Degraded { prediction, .. } => prediction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error,
        }
    }
}
