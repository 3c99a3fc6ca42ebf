mod advisory;
mod config;
mod hybrid;
mod llm;
mod ml;
mod routes;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use advisory::advisory_service::AdvisoryService;
use config::AppConfig;
use hybrid::orchestrator::HybridAnalyzer;
use llm::gemini_service::GeminiClient;
use ml::ml_service::HttpMlGateway;
use routes::{configure_routes, not_found};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e)
    })?;

    if config.gemini.api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; advisories will fall back to ML-only responses");
    }
    log::info!("ML service: {}", config.ml_api_url);
    log::info!("LLM model: {}", config.gemini.model);

    let ml_gateway = HttpMlGateway::new(config.ml_api_url.clone(), config.ml_timeout)
        .map_err(std::io::Error::other)?;
    let gemini_client = GeminiClient::new(config.gemini.clone()).map_err(std::io::Error::other)?;

    let analyzer = HybridAnalyzer::new(
        Arc::new(ml_gateway),
        AdvisoryService::new(Arc::new(gemini_client)),
        config.max_upload_bytes,
    );

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(web::Data::new(analyzer.clone()))
            .configure(configure_routes)
            .default_service(web::to(not_found))
    })
    .bind(&bind_address)?
    .run()
    .await
}
