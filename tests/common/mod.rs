use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use glowlens::config::{EngineConfig, GenerativeConfig, RequestConfig, TuningConfig, VisionConfig};
use glowlens::error::NetworkError;
use glowlens::transport::{HttpRequest, HttpResponse, Transport};

pub type StubResult = Result<HttpResponse, NetworkError>;

/// Opt-in log output for debugging test runs, driven by `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Routes requests by URL fragment and replays queued responses. The last
/// queued response for a route is sticky so repeated calls keep answering.
pub struct StubTransport {
    routes: Mutex<Vec<(String, VecDeque<StubResult>)>>,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn push(&self, url_fragment: &str, result: StubResult) {
        let mut routes = self.routes.lock().unwrap();
        if let Some((_, queue)) = routes.iter_mut().find(|(f, _)| f == url_fragment) {
            queue.push_back(result);
        } else {
            routes.push((url_fragment.to_string(), VecDeque::from([result])));
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut routes = self.routes.lock().unwrap();
        for (fragment, queue) in routes.iter_mut() {
            if request.url.contains(fragment.as_str()) {
                return if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap_or(Ok(HttpResponse {
                        status: 500,
                        body: "{}".to_string(),
                    }))
                };
            }
        }
        Ok(HttpResponse {
            status: 404,
            body: "{\"error\": \"no stub route\"}".to_string(),
        })
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        vision: VisionConfig {
            endpoint: "http://vision.test/v1/images:annotate".to_string(),
            api_key: "test-vision-key".to_string(),
        },
        generative: GenerativeConfig {
            endpoint: "http://generate.test/v1/chat/completions".to_string(),
            api_key: "test-generative-key".to_string(),
            model: "test-model".to_string(),
        },
        request: RequestConfig {
            timeout_ms: 500,
            max_retries: 2,
            retry_delay_ms: 1,
            headers: Vec::new(),
        },
        tuning: TuningConfig::default(),
    }
}

pub fn http_ok(body: String) -> StubResult {
    Ok(HttpResponse { status: 200, body })
}

pub fn http_status(status: u16) -> StubResult {
    Ok(HttpResponse {
        status,
        body: "{}".to_string(),
    })
}

/// Vision response with a straight, well-lit face.
pub fn vision_face_response() -> String {
    json!({
        "responses": [{
            "faceAnnotations": [{
                "rollAngle": 0.0,
                "panAngle": 0.0,
                "tiltAngle": 0.0,
                "detectionConfidence": 0.95,
                "landmarkingConfidence": 0.85
            }],
            "imagePropertiesAnnotation": {
                "dominantColors": {
                    "colors": [
                        { "color": { "red": 255.0, "green": 255.0, "blue": 255.0 }, "pixelFraction": 0.7 }
                    ]
                }
            },
            "labelAnnotations": [
                { "description": "Person", "score": 0.98 },
                { "description": "Skin", "score": 0.92 }
            ]
        }]
    })
    .to_string()
}

/// Vision response with labels and palette but no detected face.
pub fn vision_no_face_response() -> String {
    json!({
        "responses": [{
            "labelAnnotations": [
                { "description": "Landscape", "score": 0.97 },
                { "description": "Sky", "score": 0.95 }
            ]
        }]
    })
    .to_string()
}

/// Vision response suitable for an outfit shot.
pub fn vision_outfit_response() -> String {
    json!({
        "responses": [{
            "imagePropertiesAnnotation": {
                "dominantColors": {
                    "colors": [
                        { "color": { "red": 30.0, "green": 30.0, "blue": 90.0 }, "pixelFraction": 0.5 },
                        { "color": { "red": 210.0, "green": 210.0, "blue": 215.0 }, "pixelFraction": 0.3 }
                    ]
                }
            },
            "labelAnnotations": [
                { "description": "Person", "score": 0.98 },
                { "description": "Blazer", "score": 0.9 },
                { "description": "Suit", "score": 0.85 }
            ]
        }]
    })
    .to_string()
}

/// Chat-completions envelope wrapping the model's textual output.
pub fn generative_response(text: &str) -> String {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": text }
        }]
    })
    .to_string()
}
