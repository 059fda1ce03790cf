//! Auto-tagger for suggesting tags for note text using a model backend.
//!
//! This module provides the `AutoTagger` struct which sends note text and the
//! known tags to a [`TagModel`] and normalizes whatever comes back.

use std::sync::Arc;

use tracing::debug;

use super::normalizer::TagNormalizer;
use crate::error::AutoTagError;
use crate::llm::{TagModel, TagSuggestionRequest};
use crate::models::{CaseStyle, Tag};
use crate::vault::strip_frontmatter;

/// Builder for constructing `AutoTagger` instances.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use autotag::autotagger::AutoTaggerBuilder;
/// use autotag::llm::DemoClient;
/// use autotag::CaseStyle;
///
/// let tagger = AutoTaggerBuilder::new()
///     .client(Arc::new(DemoClient::default()))
///     .style(CaseStyle::Snake)
///     .add_prefix(false)
///     .build()
///     .expect("client is set");
/// assert_eq!(tagger.style(), CaseStyle::Snake);
/// ```
#[derive(Default)]
pub struct AutoTaggerBuilder {
    client: Option<Arc<dyn TagModel>>,
    style: CaseStyle,
    add_prefix: bool,
}

impl AutoTaggerBuilder {
    /// Creates a new `AutoTaggerBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model client to use for tag generation.
    pub fn client(mut self, client: Arc<dyn TagModel>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn style(mut self, style: CaseStyle) -> Self {
        self.style = style;
        self
    }

    /// Prefixes every suggested tag with `autotag/`.
    pub fn add_prefix(mut self, add_prefix: bool) -> Self {
        self.add_prefix = add_prefix;
        self
    }

    /// Builds the `AutoTagger`.
    ///
    /// # Errors
    ///
    /// Returns `AutoTagError::Configuration` if `client()` was not called.
    pub fn build(self) -> Result<AutoTagger, AutoTagError> {
        let client = self.client.ok_or_else(|| {
            AutoTagError::Configuration("no model client configured".to_string())
        })?;
        Ok(AutoTagger {
            client,
            style: self.style,
            add_prefix: self.add_prefix,
        })
    }
}

/// Suggests normalized tags for note text.
pub struct AutoTagger {
    client: Arc<dyn TagModel>,
    style: CaseStyle,
    add_prefix: bool,
}

impl AutoTagger {
    pub fn style(&self) -> CaseStyle {
        self.style
    }

    pub fn add_prefix(&self) -> bool {
        self.add_prefix
    }

    pub fn client(&self) -> &Arc<dyn TagModel> {
        &self.client
    }

    /// Asks the model for tags for `text` and normalizes them.
    ///
    /// Frontmatter is stripped from `text` before it is sent. `known_tags`
    /// go along as context.
    ///
    /// # Errors
    ///
    /// - `AutoTagError::Validation` if there is no text left to analyze, or a
    ///   suggested tag cannot be normalized (the whole batch is dropped)
    /// - `AutoTagError::Protocol` / `AutoTagError::Transport` if the model
    ///   call fails
    pub async fn suggest_tags(
        &self,
        text: &str,
        known_tags: &[String],
    ) -> Result<Vec<Tag>, AutoTagError> {
        let text = strip_frontmatter(text).trim();
        if text.is_empty() {
            return Err(AutoTagError::Validation("No text to analyze".to_string()));
        }

        let request = TagSuggestionRequest::new(text).with_known_tags(known_tags.to_vec());
        let raw = self.client.generate_tags(&request).await?;
        debug!(count = raw.len(), model = %self.client.label(), "Raw tags received");

        Ok(TagNormalizer::normalize(&raw, self.style, self.add_prefix)?)
    }
}
