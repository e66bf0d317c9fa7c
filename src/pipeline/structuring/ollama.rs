use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{GenerationOptions, LlmClient};
use super::StructuringError;

/// Installed models tried in order when none is configured.
const PREFERRED_MODELS: &[&str] = &["medgemma", "llama3.1", "llama3", "qwen2.5", "mistral"];

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl OllamaClient {
    /// Create a client for the Ollama instance at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pick a model: the preferred families first, then whatever is installed.
    pub fn find_best_model(&self) -> Result<String, StructuringError> {
        let available = self.list_models()?;
        pick_model(&available).ok_or(StructuringError::NoModelAvailable)
    }

    fn map_send_error(&self, e: reqwest::Error) -> StructuringError {
        if e.is_connect() {
            StructuringError::OllamaConnection(self.base_url.clone())
        } else if e.is_timeout() {
            StructuringError::HttpClient(format!(
                "Request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            StructuringError::HttpClient(e.to_string())
        }
    }
}

fn pick_model(available: &[String]) -> Option<String> {
    PREFERRED_MODELS
        .iter()
        .find_map(|preferred| available.iter().find(|m| m.starts_with(preferred)))
        .or_else(|| available.first())
        .cloned()
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        options: &GenerationOptions,
    ) -> Result<String, StructuringError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            format: options.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.num_predict,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }

    fn list_models(&self) -> Result<Vec<String>, StructuringError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

// ═══════════════════════════════════════════
// Mock client
// ═══════════════════════════════════════════

/// One canned reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Fails with a retryable transport error carrying this message.
    Fail(String),
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    fn produce(&self) -> Result<String, StructuringError> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            Self::Fail(msg) => Err(StructuringError::HttpClient(msg.clone())),
        }
    }
}

/// A call as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Mock LLM client for testing.
///
/// Reply selection: scripted replies are consumed first, then the first
/// route whose needle appears in the prompt or system text, then the default.
pub struct MockLlmClient {
    default: MockReply,
    scripted: Mutex<VecDeque<MockReply>>,
    routes: Vec<(String, MockReply)>,
    available_models: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::with_default(MockReply::text(response))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_default(MockReply::Fail(message.to_string()))
    }

    fn with_default(default: MockReply) -> Self {
        Self {
            default,
            scripted: Mutex::new(VecDeque::new()),
            routes: Vec::new(),
            available_models: vec!["medgemma:latest".to_string()],
            delay: None,
            calls: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Reply with `reply` whenever `needle` appears in the prompt or system text.
    pub fn with_route(mut self, needle: &str, reply: MockReply) -> Self {
        self.routes.push((needle.to_string(), reply));
        self
    }

    /// Queue one-shot replies consumed before routes and default.
    pub fn with_script(self, replies: Vec<MockReply>) -> Self {
        if let Ok(mut queue) = self.scripted.lock() {
            queue.extend(replies);
        }
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.recorded.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose prompt or system text contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.prompt.contains(needle) || c.system.contains(needle))
            .count()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        prompt: &str,
        system: &str,
        options: &GenerationOptions,
    ) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
                temperature: options.temperature,
            });
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let scripted = self.scripted.lock().ok().and_then(|mut q| q.pop_front());
        let reply = scripted.unwrap_or_else(|| {
            self.routes
                .iter()
                .find(|(needle, _)| prompt.contains(needle) || system.contains(needle))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| self.default.clone())
        });
        reply.produce()
    }

    fn list_models(&self) -> Result<Vec<String>, StructuringError> {
        Ok(self.available_models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> GenerationOptions {
        GenerationOptions::json(0.1)
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        let result = client.generate("model", "prompt", "system", &opts()).unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn mock_client_lists_models() {
        let client = MockLlmClient::new("").with_models(vec![
            "medgemma:latest".into(),
            "llama3:8b".into(),
        ]);
        let models = client.list_models().unwrap();
        assert_eq!(models.len(), 2);
        assert!(client.is_model_available("medgemma").unwrap());
        assert!(!client.is_model_available("mistral").unwrap());
    }

    #[test]
    fn scripted_replies_consumed_before_default() {
        let client = MockLlmClient::new("default")
            .with_script(vec![MockReply::Fail("down".into()), MockReply::text("second")]);
        assert!(client.generate("m", "p", "s", &opts()).is_err());
        assert_eq!(client.generate("m", "p", "s", &opts()).unwrap(), "second");
        assert_eq!(client.generate("m", "p", "s", &opts()).unwrap(), "default");
    }

    #[test]
    fn routes_match_prompt_or_system() {
        let client = MockLlmClient::new("default")
            .with_route("SYNTH", MockReply::text("synthesis"))
            .with_route("chunk 2", MockReply::Fail("boom".into()));
        assert_eq!(client.generate("m", "p", "SYNTH rules", &opts()).unwrap(), "synthesis");
        assert!(client.generate("m", "chunk 2 text", "s", &opts()).is_err());
        assert_eq!(client.generate("m", "chunk 1", "s", &opts()).unwrap(), "default");
        assert_eq!(client.calls_matching("SYNTH"), 1);
    }

    #[test]
    fn mock_records_temperatures() {
        let client = MockLlmClient::new("x");
        client.generate("m", "p", "s", &GenerationOptions::json(0.4)).unwrap();
        assert_eq!(client.calls()[0].temperature, 0.4);
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", Duration::from_secs(60)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn model_preference_then_first_installed() {
        let installed = vec!["phi3:mini".to_string(), "llama3.1:8b".to_string()];
        assert_eq!(pick_model(&installed).as_deref(), Some("llama3.1:8b"));

        let installed = vec!["phi3:mini".to_string()];
        assert_eq!(pick_model(&installed).as_deref(), Some("phi3:mini"));

        assert_eq!(pick_model(&[]), None);
    }

    #[test]
    fn request_serializes_json_format_and_temperature() {
        let body = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            format: Some("json"),
            options: OllamaOptions {
                temperature: 0.7,
                num_predict: None,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["format"], "json");
        assert!((value["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(value["options"].get("num_predict").is_none());
    }
}
