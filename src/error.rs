//! Error type for the tagging flow.
//!
//! Each layer has its own error enum (`LlmError`, `DocumentError`,
//! `NormalizeError`, `ConfigError`); they are folded into [`AutoTagError`]
//! at the service boundary, where every failure becomes one notification.

use thiserror::Error;

use crate::autotagger::NormalizeError;
use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::vault::DocumentError;

#[derive(Debug, Error)]
pub enum AutoTagError {
    /// Missing credentials or invalid settings, detected before any request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model answered, but not with a usable tag list
    #[error("Model response error: {0}")]
    Protocol(#[source] LlmError),

    /// The request never got an HTTP response
    #[error("Request {request_id} failed: {source}")]
    Transport {
        request_id: String,
        #[source]
        source: LlmError,
    },

    /// Input text or a suggested tag was unusable
    #[error("{0}")]
    Validation(String),

    /// The target document is missing or cannot be updated
    #[error(transparent)]
    DocumentState(#[from] DocumentError),
}

impl AutoTagError {
    /// Errors the user can fix by changing input or settings.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Validation(_) | Self::DocumentState(_)
        )
    }
}

impl From<LlmError> for AutoTagError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::InvalidUrl(url) => Self::Configuration(format!("invalid base URL {url}")),
            e if e.is_transport() => Self::Transport {
                request_id: e.request_id().unwrap_or_default().to_string(),
                source: e,
            },
            e => Self::Protocol(e),
        }
    }
}

impl From<NormalizeError> for AutoTagError {
    fn from(error: NormalizeError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<ConfigError> for AutoTagError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_protocol() {
        let err: AutoTagError = LlmError::Protocol("missing function_call".to_string()).into();
        assert!(matches!(err, AutoTagError::Protocol(_)));
        assert!(!err.is_user_error());
        assert!(err.to_string().contains("missing function_call"));
    }

    #[test]
    fn invalid_url_is_a_configuration_problem() {
        let err: AutoTagError = LlmError::InvalidUrl("nope".to_string()).into();
        assert!(matches!(err, AutoTagError::Configuration(_)));
        assert!(err.is_user_error());
    }

    #[test]
    fn normalize_error_keeps_offending_tag() {
        let err: AutoTagError = NormalizeError {
            tag: "!!!".to_string(),
            reason: "no usable characters".to_string(),
        }
        .into();
        assert!(matches!(err, AutoTagError::Validation(_)));
        assert!(err.to_string().contains("'!!!'"));
    }

    #[test]
    fn document_errors_are_user_errors() {
        let err: AutoTagError = DocumentError::NotFound("a.md".to_string()).into();
        assert!(err.is_user_error());
    }
}
