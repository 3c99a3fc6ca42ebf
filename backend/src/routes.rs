use actix_web::{HttpRequest, HttpResponse, web};
use log::warn;
use shared::ApiResponse;
use uuid::Uuid;

use crate::hybrid::error::AnalysisError;
use crate::hybrid::orchestrator::HybridAnalyzer;
use crate::hybrid::request::read_analysis_request;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/hybrid-analysis").route(web::post().to(hybrid_analysis)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn hybrid_analysis(
    req: HttpRequest,
    payload: web::Payload,
    analyzer: web::Data<HybridAnalyzer>,
) -> Result<HttpResponse, AnalysisError> {
    let request_id = Uuid::new_v4();

    let request = read_analysis_request(&req, payload, analyzer.max_upload_bytes())
        .await
        .inspect_err(|e| warn!("[{}] Rejected hybrid analysis request: {}", request_id, e))?;

    let advisory = analyzer.analyze(request_id, request).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(advisory)))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::failure("API format Not found", None))
}
