use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::ports::{InferenceClient, InferenceError, InferenceRequest};

/// Ollama HTTP client for local vision/LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
    temperature: f32,
}

impl OllamaClient {
    /// Create a client for one model on an Ollama instance.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            temperature: 0.1,
        })
    }

    /// Local Ollama at localhost:11434 with a 5-minute timeout.
    pub fn default_local(model: &str) -> Result<Self, InferenceError> {
        Self::new("http://localhost:11434", model, 300)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request<'a>(
        &'a self,
        request: &'a InferenceRequest<'a>,
    ) -> OllamaGenerateRequest<'a> {
        let images = request
            .images
            .iter()
            .map(|img| base64::engine::general_purpose::STANDARD.encode(&img.bytes))
            .collect();

        OllamaGenerateRequest {
            model: &self.model,
            prompt: request.user_content,
            system: request.system_prompt,
            images,
            format: "json",
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    format: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[async_trait]
impl InferenceClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.build_request(&request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else {
                    InferenceError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // The client timeout also covers reading the body.
        let parsed: OllamaGenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.timeout_secs)
            } else {
                InferenceError::MalformedResponse(e.to_string())
            }
        })?;

        Ok(parsed.response)
    }
}

/// What a scripted client saw for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub user_content: String,
    pub image_count: usize,
}

/// Inference client that replays a fixed script of responses, in order.
/// Used by tests and demos in place of a live model.
pub struct ScriptedInferenceClient {
    model: String,
    script: Mutex<VecDeque<Result<String, InferenceError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedInferenceClient {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Queue a successful raw response.
    pub fn respond(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: InferenceError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep before answering, to exercise cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, item: Result<String, InferenceError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(item);
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl InferenceClient for ScriptedInferenceClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: InferenceRequest<'_>) -> Result<String, InferenceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                system_prompt: request.system_prompt.to_string(),
                user_content: request.user_content.to_string(),
                image_count: request.images.len(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| Err(InferenceError::Http("No scripted response left".into())))
    }
}
