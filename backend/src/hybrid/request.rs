use actix_multipart::{Field, Multipart};
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, web};
use futures::{StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use shared::{AnalysisKind, SoilReading};

use super::error::AnalysisError;
use crate::ml::ml_service::ImageUpload;

const IMAGE_FIELD: &str = "image";
const DEFAULT_FILENAME: &str = "image.jpg";

#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    Image(ImageUpload),
    Soil(SoilReading),
}

impl AnalysisRequest {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisRequest::Image(_) => AnalysisKind::ImageAnalysis,
            AnalysisRequest::Soil(_) => AnalysisKind::SoilAnalysis,
        }
    }
}

#[derive(Default)]
struct FormPayload {
    image: Option<ImageUpload>,
    fields: Map<String, Value>,
}

/// Reads either a multipart form or a JSON body and classifies it.
pub async fn read_analysis_request(
    req: &HttpRequest,
    payload: web::Payload,
    max_upload_bytes: usize,
) -> Result<AnalysisRequest, AnalysisError> {
    if is_multipart(req) {
        let form = read_multipart(Multipart::new(req.headers(), payload), max_upload_bytes).await?;
        classify_request(form.image, &form.fields)
    } else {
        let body = read_body(payload, max_upload_bytes).await?;
        classify_request(None, &parse_json_fields(&body)?)
    }
}

pub fn classify_request(
    image: Option<ImageUpload>,
    fields: &Map<String, Value>,
) -> Result<AnalysisRequest, AnalysisError> {
    if let Some(image) = image {
        if !image.content_type.starts_with("image/") {
            return Err(AnalysisError::InvalidFileType);
        }
        return Ok(AnalysisRequest::Image(image));
    }

    if is_present(fields, "N") || is_present(fields, "temperature") {
        return soil_reading(fields).map(AnalysisRequest::Soil);
    }

    Err(AnalysisError::UnsupportedPayload)
}

/// Tabular fields that are absent, null, blank or not numeric.
pub fn missing_soil_fields(fields: &Map<String, Value>) -> Vec<&'static str> {
    SoilReading::FIELDS
        .into_iter()
        .filter(|&key| match key {
            "cropType" => text_value(fields, key).is_none(),
            _ => number_value(fields, key).is_none(),
        })
        .collect()
}

fn soil_reading(fields: &Map<String, Value>) -> Result<SoilReading, AnalysisError> {
    let missing = missing_soil_fields(fields);
    if !missing.is_empty() {
        log::warn!("Soil analysis request missing fields: {}", missing.join(", "));
        return Err(AnalysisError::MissingSoilParameters);
    }

    let number = |key| number_value(fields, key).ok_or(AnalysisError::MissingSoilParameters);
    Ok(SoilReading {
        nitrogen: number("N")?,
        phosphorus: number("P")?,
        potassium: number("K")?,
        temperature: number("temperature")?,
        humidity: number("humidity")?,
        crop_type: text_value(fields, "cropType")
            .ok_or(AnalysisError::MissingSoilParameters)?
            .to_string(),
    })
}

fn is_present(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).is_some_and(|v| !v.is_null())
}

fn number_value(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn text_value<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// An empty body reads as an empty object; any non-object JSON carries no fields.
fn parse_json_fields(body: &[u8]) -> Result<Map<String, Value>, AnalysisError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(AnalysisError::MalformedBody(e.to_string())),
    }
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>, AnalysisError> {
    let mut body = Vec::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AnalysisError::MalformedBody(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(AnalysisError::PayloadTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Reads one part into memory, failing once the whole form would exceed `limit`.
async fn read_field(
    field: &mut Field,
    already_read: usize,
    limit: usize,
) -> Result<Vec<u8>, AnalysisError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AnalysisError::MalformedBody(e.to_string()))?;
        if already_read + data.len() + chunk.len() > limit {
            return Err(AnalysisError::PayloadTooLarge { limit });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_multipart(mut multipart: Multipart, limit: usize) -> Result<FormPayload, AnalysisError> {
    let mut form = FormPayload::default();
    let mut form_bytes = 0;

    while let Some(mut field) = multipart
        .try_next()
        .await
        .map_err(|e| AnalysisError::MalformedBody(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
        let data = read_field(&mut field, form_bytes, limit).await?;
        form_bytes += data.len();

        match filename {
            Some(filename) if name == IMAGE_FIELD && form.image.is_none() => {
                form.image = Some(ImageUpload {
                    bytes: data,
                    filename: if filename.is_empty() {
                        DEFAULT_FILENAME.to_string()
                    } else {
                        filename
                    },
                    content_type: content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                });
            }
            Some(_) if name == IMAGE_FIELD => return Err(AnalysisError::DuplicateImage),
            Some(_) => return Err(AnalysisError::UnexpectedFileField(name)),
            None => {
                let text = String::from_utf8(data)
                    .map_err(|e| AnalysisError::MalformedBody(e.to_string()))?;
                form.fields.insert(name, Value::String(text));
            }
        }
    }

    Ok(form)
}
