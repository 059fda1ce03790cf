/// Model client capability and its error type.
///
/// Every backend (hosted, local, demo) implements [`TagModel`]; callers hold
/// an `Arc<dyn TagModel>` selected from configuration.
use async_trait::async_trait;
use thiserror::Error;

use super::protocol::TagSuggestionRequest;

/// Errors that can occur when asking a model for tags.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error (request {request_id}): {source}")]
    Network {
        request_id: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request or response timeout errors
    #[error("Request timed out (request {request_id})")]
    Timeout {
        request_id: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status without an API error object
    #[error("HTTP error: status {status}")]
    Http { status: u16, body: String },

    /// Request body serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The API answered with an error object
    #[error("API error: {message}")]
    Api {
        kind: Option<String>,
        message: String,
    },

    /// A well-formed reply that does not follow the function-call contract
    #[error("Unexpected response: {0}")]
    Protocol(String),

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl LlmError {
    /// Wraps a reqwest failure, keeping timeouts distinct from other
    /// transport errors.
    pub(crate) fn transport(request_id: &str, source: reqwest::Error) -> Self {
        let request_id = request_id.to_string();
        if source.is_timeout() {
            Self::Timeout { request_id, source }
        } else {
            Self::Network { request_id, source }
        }
    }

    /// Correlation id of the failed request, for transport errors.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Network { request_id, .. } | Self::Timeout { request_id, .. } => {
                Some(request_id.as_str())
            }
            _ => None,
        }
    }

    /// Whether the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// A backend able to suggest tags for a piece of text.
///
/// This trait enables mocking in unit tests and lets the tagging flow stay
/// unaware of which service answers.
#[async_trait]
pub trait TagModel: Send + Sync {
    /// Short human-readable name of the backend and model.
    fn label(&self) -> String;

    /// Whether this backend can be called with the current credentials.
    ///
    /// Defaults to `true`; the hosted client overrides it.
    fn has_credentials(&self) -> bool {
        true
    }

    /// Returns the raw (un-normalized) tags suggested for `request`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` if the request fails or the reply does not follow
    /// the structured-output contract.
    async fn generate_tags(&self, request: &TagSuggestionRequest)
    -> Result<Vec<String>, LlmError>;
}
