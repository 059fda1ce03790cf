/// Hosted chat-completion client.
///
/// Talks to the OpenAI API, or to any OpenAI-compatible server when a custom
/// base URL is configured, using the function-calling contract from
/// [`protocol`](super::protocol).
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info, warn};

use super::client::{LlmError, TagModel};
use super::protocol::{ChatCompletionRequest, TagSuggestionRequest, parse_chat_completion};
use crate::debug_log::{DebugLog, DebugLogEntry};

/// Base URL used when no custom base URL is configured.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default sampling temperature ("more predictable").
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Default model id.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Builder for constructing `OpenAiClient` instances.
///
/// # Examples
///
/// ```
/// use autotag::llm::OpenAiClientBuilder;
///
/// let client = OpenAiClientBuilder::new()
///     .api_key("sk-test")
///     .model("gpt-4o-mini")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
/// ```
#[derive(Debug, Default)]
pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    custom_base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    debug_log: Option<DebugLog>,
}

impl OpenAiClientBuilder {
    /// Creates a new `OpenAiClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sends requests to `{url}/chat/completions` instead of the OpenAI API.
    ///
    /// An empty string leaves the default in place.
    pub fn custom_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.trim().is_empty() {
            self.custom_base_url = Some(url.trim().trim_end_matches('/').to_string());
        }
        self
    }

    /// Sets the model id (e.g. "gpt-4o-mini").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Records every request and response in `log`.
    pub fn debug_log(mut self, log: DebugLog) -> Self {
        self.debug_log = Some(log);
        self
    }

    /// Builds the `OpenAiClient` with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidUrl` if the custom base URL does not parse,
    /// or `LlmError::Network` if the HTTP client cannot be created.
    pub fn build(self) -> Result<OpenAiClient, LlmError> {
        if let Some(url) = &self.custom_base_url {
            reqwest::Url::parse(url).map_err(|e| LlmError::InvalidUrl(format!("{url}: {e}")))?;
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LlmError::transport("client-setup", e))?;

        Ok(OpenAiClient {
            client,
            api_key: self.api_key.unwrap_or_default(),
            custom_base_url: self.custom_base_url,
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: self.max_tokens,
            debug_log: self.debug_log.unwrap_or_default(),
        })
    }
}

/// Async HTTP client for hosted chat-completion APIs.
///
/// Construct it with [`OpenAiClientBuilder`].
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    custom_base_url: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
    debug_log: DebugLog,
}

impl OpenAiClient {
    /// Returns the full chat-completions URL requests are sent to.
    pub fn endpoint(&self) -> String {
        let base = self
            .custom_base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL);
        format!("{base}/chat/completions")
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    async fn send(
        &self,
        request_id: &str,
        endpoint: &str,
        body: String,
    ) -> Result<(u16, String), LlmError> {
        let mut request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::transport(request_id, e))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::transport(request_id, e))?;

        Ok((status, text))
    }
}

#[async_trait]
impl TagModel for OpenAiClient {
    fn label(&self) -> String {
        match &self.custom_base_url {
            Some(url) => format!("{} via {url}", self.model),
            None => format!("OpenAI {}", self.model),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() || self.custom_base_url.is_some()
    }

    async fn generate_tags(
        &self,
        request: &TagSuggestionRequest,
    ) -> Result<Vec<String>, LlmError> {
        if !self.has_credentials() {
            warn!("No API key or custom base URL configured; skipping tag request");
            return Ok(Vec::new());
        }

        let endpoint = self.endpoint();
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = ChatCompletionRequest::new(
            &self.model,
            request,
            self.temperature,
            self.max_tokens,
        );
        let body = serde_json::to_string(&body).map_err(LlmError::Serialization)?;
        let entry = DebugLogEntry::request(&request_id, &endpoint, &body);

        info!(request_id = %request_id, "LLM API request starting");
        debug!(endpoint = %endpoint, model = %self.model, "Using API endpoint");

        let (status, text) = match self.send(&request_id, &endpoint, body).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "LLM API request failed");
                self.debug_log.record(entry.with_error(e.to_string()));
                return Err(e);
            }
        };
        info!(request_id = %request_id, status, "LLM API response received");

        let result = parse_chat_completion(status, &text);
        let entry = entry.with_response(text);
        match &result {
            Ok(tags) => {
                debug!(request_id = %request_id, ?tags, "LLM API suggested tags");
                self.debug_log.record(entry);
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "LLM API response rejected");
                self.debug_log.record(entry.with_error(e.to_string()));
            }
        }

        result
    }
}
