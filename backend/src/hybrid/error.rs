use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ApiResponse;

use crate::ml::ml_service::MlServiceError;

pub const SERVER_ERROR_MESSAGE: &str = "Server Error during AI/ML analysis.";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid file type. Please upload an image.")]
    InvalidFileType,
    #[error("Request payload too large. Maximum size is {limit} bytes.")]
    PayloadTooLarge { limit: usize },
    #[error("Unexpected file field '{0}'. Upload the image under the 'image' field.")]
    UnexpectedFileField(String),
    #[error("Only one image may be uploaded.")]
    DuplicateImage,
    #[error("Missing required soil parameters (N, P, K, temperature, humidity, cropType)")]
    MissingSoilParameters,
    #[error(
        "Provide either an image file for disease detection OR a JSON payload for fertilizer recommendation."
    )]
    UnsupportedPayload,
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error(transparent)]
    MlService(#[from] MlServiceError),
}

impl ResponseError for AnalysisError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::MlService(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AnalysisError::MlService(e) => {
                ApiResponse::<()>::failure(SERVER_ERROR_MESSAGE, Some(e.to_string()))
            }
            other => ApiResponse::<()>::failure(other.to_string(), None),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
