/// Client for a locally hosted Ollama server.
///
/// Sends the same prompts as the hosted client to `/api/chat`, constraining
/// the reply with the tag schema through Ollama's structured-output `format`
/// field, then applies the same `{ "tags": [...] }` parsing contract.
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use super::client::{LlmError, TagModel};
use super::protocol::{
    TagSuggestionRequest, api_error, build_messages, parse_tag_arguments, tags_parameter_schema,
};
use crate::debug_log::{DebugLog, DebugLogEntry};

/// Default Ollama address when neither the builder nor `OLLAMA_HOST` sets one.
pub const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434";

/// Builder for constructing `LocalClient` instances.
#[derive(Debug, Default)]
pub struct LocalClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    debug_log: Option<DebugLog>,
}

impl LocalClientBuilder {
    /// Creates a new `LocalClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the Ollama server (e.g. "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name (e.g. "llama3.1:8b").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn debug_log(mut self, log: DebugLog) -> Self {
        self.debug_log = Some(log);
        self
    }

    /// Builds the `LocalClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, falling back to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL`
    /// is used, falling back to an empty string.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidUrl` if the base URL does not parse.
    pub fn build(self) -> Result<LocalClient, LlmError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| DEFAULT_LOCAL_BASE_URL.to_string()),
        };
        let base_url = base_url.trim_end_matches('/').to_string();

        let model = match self.model {
            Some(m) => m,
            None => std::env::var("OLLAMA_MODEL").unwrap_or_default(),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| LlmError::InvalidUrl(format!("{base_url}: {e}")))?;

        // Local models can be slow to load on first use
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::transport("client-setup", e))?;

        Ok(LocalClient {
            client,
            base_url,
            model,
            temperature: self.temperature.unwrap_or(super::openai::DEFAULT_TEMPERATURE),
            debug_log: self.debug_log.unwrap_or_default(),
        })
    }
}

/// Async HTTP client for a locally reachable Ollama server.
pub struct LocalClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
    debug_log: DebugLog,
}

impl LocalClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn request_body(&self, request: &TagSuggestionRequest) -> Value {
        json!({
            "model": self.model,
            "stream": false,
            "format": tags_parameter_schema(),
            "options": { "temperature": self.temperature },
            "messages": build_messages(request),
        })
    }
}

/// Parses an `/api/chat` reply whose message content is the JSON object
/// produced under the structured-output schema.
fn parse_local_chat(status: u16, body: &str) -> Result<Vec<String>, LlmError> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        if status == 200 {
            LlmError::Protocol(format!("response is not valid JSON: {e}"))
        } else {
            LlmError::Http {
                status,
                body: body.to_string(),
            }
        }
    })?;

    if let Some(error) = api_error(&json) {
        return Err(error);
    }
    if status != 200 {
        return Err(LlmError::Http {
            status,
            body: body.to_string(),
        });
    }

    let content = json
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::Protocol("response does not contain message content".to_string()))?;

    parse_tag_arguments(content)
}

#[async_trait]
impl TagModel for LocalClient {
    fn label(&self) -> String {
        format!("Ollama {} at {}", self.model, self.base_url)
    }

    async fn generate_tags(
        &self,
        request: &TagSuggestionRequest,
    ) -> Result<Vec<String>, LlmError> {
        let endpoint = self.endpoint();
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = self.request_body(request).to_string();
        let entry = DebugLogEntry::request(&request_id, &endpoint, &body);

        info!(request_id = %request_id, model = %self.model, "Local model request starting");

        let response = self
            .client
            .post(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let reply = match response {
            Ok(response) => {
                let status = response.status().as_u16();
                response.text().await.map(|text| (status, text))
            }
            Err(e) => Err(e),
        };

        let (status, text) = match reply {
            Ok(reply) => reply,
            Err(e) => {
                let e = LlmError::transport(&request_id, e);
                error!(request_id = %request_id, error = %e, "Local model request failed");
                self.debug_log.record(entry.with_error(e.to_string()));
                return Err(e);
            }
        };

        let result = parse_local_chat(status, &text);
        let entry = entry.with_response(text);
        match &result {
            Ok(tags) => {
                debug!(request_id = %request_id, ?tags, "Local model suggested tags");
                self.debug_log.record(entry);
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Local model response rejected");
                self.debug_log.record(entry.with_error(e.to_string()));
            }
        }

        result
    }
}
