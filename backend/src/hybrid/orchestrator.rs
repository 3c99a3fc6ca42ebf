use std::sync::Arc;

use log::{error, info};
use shared::Advisory;
use uuid::Uuid;

use super::error::AnalysisError;
use super::request::AnalysisRequest;
use crate::advisory::advisory_service::AdvisoryService;
use crate::advisory::prompt::format_percent;
use crate::ml::ml_service::MlGateway;

/// Runs one classified request through inference and advisory synthesis.
/// Holds no per-request state; a single instance serves every worker.
#[derive(Clone)]
pub struct HybridAnalyzer {
    ml: Arc<dyn MlGateway>,
    advisory: AdvisoryService,
    max_upload_bytes: usize,
}

impl HybridAnalyzer {
    pub fn new(ml: Arc<dyn MlGateway>, advisory: AdvisoryService, max_upload_bytes: usize) -> Self {
        Self {
            ml,
            advisory,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn analyze(
        &self,
        request_id: Uuid,
        request: AnalysisRequest,
    ) -> Result<Advisory, AnalysisError> {
        info!("[{}] Starting {}", request_id, request.kind());

        let outcome = match request {
            AnalysisRequest::Image(upload) => self.ml.predict_image(upload).await,
            AnalysisRequest::Soil(soil) => self.ml.predict_fertilizer(&soil).await,
        };
        let result = outcome.map_err(|e| {
            error!("[{}] Hybrid Architecture Error: {}", request_id, e);
            AnalysisError::from(e)
        })?;

        info!(
            "[{}] ML predicted \"{}\" at {}",
            request_id,
            result.prediction.label(),
            format_percent(result.confidence())
        );

        let advisory = self.advisory.generate_advisory(&result).await;
        if let Advisory::Degraded { .. } = advisory {
            info!("[{}] Returning ML-only advisory", request_id);
        }
        Ok(advisory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::advisory_service::LOW_CONFIDENCE_EXPLANATION;
    use crate::ml::ml_service::ImageUpload;
    use crate::test_support::{FakeMlGateway, ScriptedLlm, VALID_GUIDANCE_JSON};
    use serde_json::json;
    use shared::SoilReading;

    fn analyzer(ml: Arc<FakeMlGateway>, llm: Arc<ScriptedLlm>) -> HybridAnalyzer {
        HybridAnalyzer::new(ml, AdvisoryService::new(llm), 1024)
    }

    fn wheat() -> SoilReading {
        SoilReading {
            nitrogen: 10.0,
            phosphorus: 20.0,
            potassium: 15.0,
            temperature: 28.0,
            humidity: 65.0,
            crop_type: "wheat".into(),
        }
    }

    #[actix_web::test]
    async fn image_requests_use_the_image_endpoint_only() {
        let ml = Arc::new(FakeMlGateway::returning(
            json!({ "deficiency": "Rust", "confidence": 0.8 }),
        ));
        let llm = Arc::new(ScriptedLlm::replying(VALID_GUIDANCE_JSON));
        let upload = ImageUpload {
            bytes: vec![7; 16],
            filename: "leaf.jpg".into(),
            content_type: "image/jpeg".into(),
        };

        let advisory = analyzer(ml.clone(), llm.clone())
            .analyze(Uuid::new_v4(), AnalysisRequest::Image(upload))
            .await
            .unwrap();

        assert_eq!(ml.image_calls(), 1);
        assert_eq!(ml.soil_calls(), 0);
        assert_eq!(llm.calls(), 1);
        assert_eq!(ml.last_upload().unwrap().filename, "leaf.jpg");
        assert_eq!(advisory.prediction()["deficiency"], "Rust");
    }

    #[actix_web::test]
    async fn soil_requests_forward_the_reading() {
        let ml = Arc::new(FakeMlGateway::returning(
            json!({ "fertilizer": "Urea", "probability": 0.45 }),
        ));
        let llm = Arc::new(ScriptedLlm::replying(VALID_GUIDANCE_JSON));

        let advisory = analyzer(ml.clone(), llm.clone())
            .analyze(Uuid::new_v4(), AnalysisRequest::Soil(wheat()))
            .await
            .unwrap();

        assert_eq!(ml.last_soil(), Some(wheat()));
        assert_eq!(llm.calls(), 0);
        match advisory {
            Advisory::Guided { guidance, .. } => {
                assert_eq!(guidance.explanation, LOW_CONFIDENCE_EXPLANATION)
            }
            other => panic!("expected low confidence advisory, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn ml_failure_stops_before_the_llm() {
        let ml = Arc::new(FakeMlGateway::failing());
        let llm = Arc::new(ScriptedLlm::replying(VALID_GUIDANCE_JSON));

        let err = analyzer(ml, llm.clone())
            .analyze(Uuid::new_v4(), AnalysisRequest::Soil(wheat()))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::MlService(_)));
        assert_eq!(llm.calls(), 0);
    }
}
