//! Stand-ins for the two outbound services: in-memory fakes of the traits
//! and a local HTTP stub for exercising the real clients.

use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use async_trait::async_trait;
use serde_json::Value;
use shared::{AnalysisKind, SoilReading};

use crate::llm::gemini_service::{CompletionClient, LlmError};
use crate::ml::ml_service::{ImageUpload, MlGateway, MlResult, MlServiceError};

pub const VALID_GUIDANCE_JSON: &str = r#"{
  "explanation": "Yellowing of older leaves points to nitrogen deficiency.",
  "recommendedFertilizer": "Urea",
  "dosagePerAcre": "50 kg",
  "precautions": "Avoid application right before heavy rain.",
  "organicAlternative": "Well-rotted farmyard manure"
}"#;

enum LlmReply {
    Text(String),
    Unavailable,
}

pub struct ScriptedLlm {
    reply: LlmReply,
    calls: AtomicUsize,
    last_user: Mutex<Option<String>>,
}

impl ScriptedLlm {
    fn with_reply(reply: LlmReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(None),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with_reply(LlmReply::Text(text.to_string()))
    }

    pub fn unavailable() -> Self {
        Self::with_reply(LlmReply::Unavailable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.last_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock().unwrap() = Some(user.to_string());
        match &self.reply {
            LlmReply::Text(text) => Ok(text.clone()),
            LlmReply::Unavailable => Err(LlmError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

pub struct FakeMlGateway {
    payload: Option<Value>,
    image_calls: AtomicUsize,
    soil_calls: AtomicUsize,
    last_upload: Mutex<Option<ImageUpload>>,
    last_soil: Mutex<Option<SoilReading>>,
}

impl FakeMlGateway {
    fn with_payload(payload: Option<Value>) -> Self {
        Self {
            payload,
            image_calls: AtomicUsize::new(0),
            soil_calls: AtomicUsize::new(0),
            last_upload: Mutex::new(None),
            last_soil: Mutex::new(None),
        }
    }

    pub fn returning(payload: Value) -> Self {
        Self::with_payload(Some(payload))
    }

    /// Every call fails the way an unreachable service would.
    pub fn failing() -> Self {
        Self::with_payload(None)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn soil_calls(&self) -> usize {
        self.soil_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.image_calls() + self.soil_calls()
    }

    pub fn last_upload(&self) -> Option<ImageUpload> {
        self.last_upload.lock().unwrap().clone()
    }

    pub fn last_soil(&self) -> Option<SoilReading> {
        self.last_soil.lock().unwrap().clone()
    }
}

#[async_trait]
impl MlGateway for FakeMlGateway {
    async fn predict_image(&self, image: ImageUpload) -> Result<MlResult, MlServiceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_upload.lock().unwrap() = Some(image);
        let payload = self.payload.clone().ok_or(MlServiceError::Image)?;
        MlResult::from_payload(AnalysisKind::ImageAnalysis, payload).map_err(|_| MlServiceError::Image)
    }

    async fn predict_fertilizer(&self, soil: &SoilReading) -> Result<MlResult, MlServiceError> {
        self.soil_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_soil.lock().unwrap() = Some(soil.clone());
        let payload = self.payload.clone().ok_or(MlServiceError::Fertilizer)?;
        MlResult::from_payload(AnalysisKind::SoilAnalysis, payload)
            .map_err(|_| MlServiceError::Fertilizer)
    }
}

/// A request captured by [`StubUpstream`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn body_contains(&self, needle: &[u8]) -> bool {
        self.body.windows(needle.len()).any(|window| window == needle)
    }
}

struct StubState {
    status: StatusCode,
    body: String,
    requests: Mutex<Vec<RecordedRequest>>,
}

async fn record_and_reply(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<StubState>,
) -> HttpResponse {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        content_type,
        body: body.to_vec(),
    });
    HttpResponse::build(state.status)
        .content_type("application/json")
        .body(state.body.clone())
}

/// Local HTTP server on an ephemeral port that answers every request with a
/// fixed status and body, standing in for the inference service or the LLM.
pub struct StubUpstream {
    pub base_url: String,
    state: web::Data<StubState>,
    handle: ServerHandle,
}

impl StubUpstream {
    pub fn start(status: u16, body: &str) -> Self {
        let state = web::Data::new(StubState {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .default_service(web::to(record_and_reply))
        })
        .workers(1)
        .disable_signals()
        .listen(listener)
        .unwrap()
        .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url,
            state,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests[0].clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}
