use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use serde_json::Value;
use shared::{AnalysisKind, MlPrediction, SoilReading};

#[derive(Debug, thiserror::Error)]
pub enum MlServiceError {
    #[error("Failed to process image through ML Service")]
    Image,
    #[error("Failed to process data through ML Service")]
    Fertilizer,
}

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected prediction payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Inference output: the typed prediction plus the payload exactly as the
/// service returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct MlResult {
    pub prediction: MlPrediction,
    pub payload: Value,
}

impl MlResult {
    pub fn from_payload(kind: AnalysisKind, payload: Value) -> Result<Self, serde_json::Error> {
        let prediction = MlPrediction::from_payload(kind, &payload)?;
        Ok(Self {
            prediction,
            payload,
        })
    }

    pub fn kind(&self) -> AnalysisKind {
        self.prediction.kind()
    }

    pub fn confidence(&self) -> f64 {
        self.prediction.confidence()
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

#[async_trait]
pub trait MlGateway: Send + Sync {
    async fn predict_image(&self, image: ImageUpload) -> Result<MlResult, MlServiceError>;

    async fn predict_fertilizer(&self, soil: &SoilReading) -> Result<MlResult, MlServiceError>;
}

#[derive(Clone)]
pub struct HttpMlGateway {
    http_client: HttpClient,
    base_url: String,
}

impl HttpMlGateway {
    pub fn new(base_url: String, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http_client: builder.build()?,
            base_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_image(&self, image: ImageUpload) -> Result<MlResult, CallError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.content_type)?;
        let form = Form::new().part("file", part);

        let payload: Value = self
            .http_client
            .post(self.endpoint("predict-image"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(MlResult::from_payload(AnalysisKind::ImageAnalysis, payload)?)
    }

    async fn post_soil(&self, soil: &SoilReading) -> Result<MlResult, CallError> {
        let payload: Value = self
            .http_client
            .post(self.endpoint("predict-fertilizer"))
            .json(soil)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(MlResult::from_payload(AnalysisKind::SoilAnalysis, payload)?)
    }
}

#[async_trait]
impl MlGateway for HttpMlGateway {
    async fn predict_image(&self, image: ImageUpload) -> Result<MlResult, MlServiceError> {
        debug!(
            "Sending {} ({} bytes) to ML image endpoint",
            image.filename,
            image.bytes.len()
        );
        self.post_image(image).await.map_err(|e| {
            error!("ML Image Prediction Error: {}", e);
            MlServiceError::Image
        })
    }

    async fn predict_fertilizer(&self, soil: &SoilReading) -> Result<MlResult, MlServiceError> {
        debug!("Sending soil reading for crop {} to ML fertilizer endpoint", soil.crop_type);
        self.post_soil(soil).await.map_err(|e| {
            error!("ML Fertilizer Prediction Error: {}", e);
            MlServiceError::Fertilizer
        })
    }
}
