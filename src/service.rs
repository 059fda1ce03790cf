use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::autotagger::{AutoTagger, AutoTaggerBuilder};
use crate::config::{Provider, Settings};
use crate::debug_log::DebugLog;
use crate::error::AutoTagError;
use crate::models::{CostEstimate, ModelDescriptor, Tag};
use crate::vault::{
    DocumentStore, InsertLocation, MetadataIndex, Selection, TagScope, collect_known_tags,
    insert_inline_tags, merge_tags,
};

/// User-visible messages. Fire and forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

/// Outcome of the review step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Write these tags (possibly edited or a subset of the suggestions)
    Accept(Vec<Tag>),
    Reject,
}

/// Lets the user look at suggestions before anything is written.
pub trait TagReviewer: Send + Sync {
    fn review(&self, document: &Path, suggestions: Vec<Tag>) -> ReviewDecision;

    /// Asked before a paid request is made. Returning `false` cancels it.
    fn confirm_cost(&self, _model: &ModelDescriptor, _estimate: &CostEstimate) -> bool {
        true
    }
}

/// Reviewer that accepts every suggestion and every cost.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl TagReviewer for AutoApprove {
    fn review(&self, _document: &Path, suggestions: Vec<Tag>) -> ReviewDecision {
        ReviewDecision::Accept(suggestions)
    }
}

/// One user-triggered tagging action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggingRequest {
    pub document: PathBuf,
    /// Body lines to analyze; the whole body when `None`
    pub selection: Option<Selection>,
    pub location: InsertLocation,
}

impl TaggingRequest {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            selection: None,
            location: InsertLocation::default(),
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: InsertLocation) -> Self {
        self.location = location;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggingStatus {
    Inserted,
    /// Nothing new to write: every suggestion, or every accepted tag, is
    /// already on the document
    NoNewTags,
    Rejected,
    /// The cost estimate was declined; no request was sent
    Cancelled,
}

/// What a tagging action did.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggingReport {
    pub document: PathBuf,
    pub status: TaggingStatus,
    /// Normalized suggestions minus tags the document already had
    pub suggested: Vec<Tag>,
    /// Tags written to the document; accepted tags skipped as duplicates are
    /// not listed
    pub inserted: Vec<Tag>,
    pub location: InsertLocation,
    pub estimate: Option<CostEstimate>,
}

impl TaggingReport {
    fn new(request: &TaggingRequest, status: TaggingStatus) -> Self {
        Self {
            document: request.document.clone(),
            status,
            suggested: Vec::new(),
            inserted: Vec::new(),
            location: request.location,
            estimate: None,
        }
    }
}

/// Runs the tag-suggestion flow against a document collection.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use autotag::config::Settings;
/// use autotag::debug_log::DebugLog;
/// use autotag::service::{TagService, TaggingRequest};
/// use autotag::vault::Vault;
///
/// # async fn example() -> Result<(), autotag::AutoTagError> {
/// let vault = Arc::new(Vault::new("/path/to/vault"));
/// let settings = Settings {
///     demo_mode: true,
///     ..Settings::default()
/// };
/// let service = TagService::from_settings(vault.clone(), vault, settings, DebugLog::new())?;
///
/// let report = service.run(&TaggingRequest::new("note.md")).await?;
/// println!("{} tags inserted", report.inserted.len());
/// # Ok(())
/// # }
/// ```
pub struct TagService {
    index: Arc<dyn MetadataIndex>,
    store: Arc<dyn DocumentStore>,
    tagger: AutoTagger,
    settings: Settings,
    notifier: Arc<dyn Notifier>,
    reviewer: Arc<dyn TagReviewer>,
}

impl TagService {
    /// Creates a service that logs notifications and accepts every
    /// suggestion; see [`with_notifier`](Self::with_notifier) and
    /// [`with_reviewer`](Self::with_reviewer).
    pub fn new(
        index: Arc<dyn MetadataIndex>,
        store: Arc<dyn DocumentStore>,
        tagger: AutoTagger,
        settings: Settings,
    ) -> Self {
        Self {
            index,
            store,
            tagger,
            settings,
            notifier: Arc::new(LogNotifier),
            reviewer: Arc::new(AutoApprove),
        }
    }

    /// Builds the model client and tagger from `settings`.
    ///
    /// # Errors
    ///
    /// Returns `AutoTagError::Configuration` if the client cannot be created.
    pub fn from_settings(
        index: Arc<dyn MetadataIndex>,
        store: Arc<dyn DocumentStore>,
        settings: Settings,
        debug_log: DebugLog,
    ) -> Result<Self, AutoTagError> {
        let client = settings.build_client(debug_log)?;
        let tagger = AutoTaggerBuilder::new()
            .client(client)
            .style(settings.tags_format)
            .add_prefix(settings.use_autotag_prefix)
            .build()?;
        Ok(Self::new(index, store, tagger, settings))
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<dyn TagReviewer>) -> Self {
        self.reviewer = reviewer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reads the text a request targets: the selected lines, or the whole
    /// body without frontmatter.
    pub fn request_text(&self, request: &TaggingRequest) -> Result<String, AutoTagError> {
        let document = self.store.read_document(&request.document)?;
        let text = match request.selection {
            Some(selection) => selection.extract(document.body())?,
            None => document.body().to_string(),
        };
        if text.trim().is_empty() {
            return Err(AutoTagError::Validation("No text to analyze".to_string()));
        }
        Ok(text)
    }

    /// Estimates the price of tagging `request` with the configured model.
    ///
    /// `None` in demo mode, with the local provider, or when the model has no
    /// known pricing.
    pub fn estimate(&self, request: &TaggingRequest) -> Result<Option<CostEstimate>, AutoTagError> {
        if self.settings.demo_mode || self.settings.provider == Provider::Local {
            return Ok(None);
        }
        let Some(model) = self.settings.selected_model() else {
            return Ok(None);
        };
        let text = self.request_text(request)?;
        let known = collect_known_tags(self.index.as_ref(), TagScope::Vault, None)?;
        Ok(Some(model.estimate_cost(&text, &known)))
    }

    /// Suggests tags for the request's text and writes the accepted ones.
    ///
    /// Suggestions the document already carries are dropped before review.
    ///
    /// # Errors
    ///
    /// - `AutoTagError::Configuration` if no credentials are configured; no
    ///   request is made
    /// - `AutoTagError::DocumentState` if the document is missing, the
    ///   selection is out of range, or the write fails; the document is left
    ///   untouched
    /// - `AutoTagError::Validation` if there is no text, or a suggestion
    ///   cannot be normalized
    /// - `AutoTagError::Protocol` / `AutoTagError::Transport` if the model
    ///   call fails
    pub async fn generate_tags(
        &self,
        request: &TaggingRequest,
    ) -> Result<TaggingReport, AutoTagError> {
        if !self.settings.has_credentials() {
            return Err(AutoTagError::Configuration(
                "No API key or custom base URL configured. Set OPENAI_API_KEY or enable \
                 use_custom_base_url in the settings."
                    .to_string(),
            ));
        }

        let text = self.request_text(request)?;
        debug!(
            document = %request.document.display(),
            chars = text.chars().count(),
            selection = ?request.selection,
            "Finding tags"
        );

        let vault_tags = collect_known_tags(self.index.as_ref(), TagScope::Vault, None)?;
        let document_tags = collect_known_tags(
            self.index.as_ref(),
            TagScope::Document,
            Some(&request.document),
        )?;

        let mut report = TaggingReport::new(request, TaggingStatus::Inserted);

        if self.settings.check_cost_estimation
            && !self.settings.demo_mode
            && self.settings.provider == Provider::OpenAi
        {
            match self.settings.selected_model() {
                Some(model) => {
                    let estimate = model.estimate_cost(&text, &vault_tags);
                    info!(model = %model.id, %estimate, "Cost estimate");
                    report.estimate = Some(estimate);
                    if !self.reviewer.confirm_cost(&model, &estimate) {
                        self.notifier.notify("Tag request cancelled");
                        report.status = TaggingStatus::Cancelled;
                        return Ok(report);
                    }
                }
                None => warn!(model = %self.settings.model, "No pricing known for model"),
            }
        }

        let suggestions = self.tagger.suggest_tags(&text, &vault_tags).await?;
        let existing: HashSet<String> = document_tags.iter().map(|t| t.to_lowercase()).collect();
        report.suggested = suggestions
            .into_iter()
            .filter(|tag| !existing.contains(&tag.as_str().to_lowercase()))
            .collect();

        if report.suggested.is_empty() {
            self.notifier.notify("No new tags suggested");
            report.status = TaggingStatus::NoNewTags;
            return Ok(report);
        }

        let accepted = if self.settings.show_pre_update_dialog {
            match self
                .reviewer
                .review(&request.document, report.suggested.clone())
            {
                ReviewDecision::Accept(tags) => tags,
                ReviewDecision::Reject => {
                    debug!("Tag insertion cancelled by user");
                    self.notifier.notify("Tag insertion cancelled");
                    report.status = TaggingStatus::Rejected;
                    return Ok(report);
                }
            }
        } else {
            report.suggested.clone()
        };

        if accepted.is_empty() {
            self.notifier.notify("No tags selected");
            report.status = TaggingStatus::Rejected;
            return Ok(report);
        }

        report.inserted = self.insert(request, &accepted)?;
        if report.inserted.is_empty() {
            self.notifier.notify("All accepted tags are already present");
            report.status = TaggingStatus::NoNewTags;
            return Ok(report);
        }

        self.notifier
            .notify(&format!("{} tags inserted", report.inserted.len()));
        if self.settings.show_post_update_dialog {
            let list: Vec<String> = report.inserted.iter().map(Tag::hashtag).collect();
            self.notifier
                .notify(&format!("Inserted into {}: {}", request.document.display(), list.join(" ")));
        }
        Ok(report)
    }

    /// Writes `tags` and returns the ones that actually landed in the
    /// document.
    fn insert(&self, request: &TaggingRequest, tags: &[Tag]) -> Result<Vec<Tag>, AutoTagError> {
        let inserted = match request.location {
            InsertLocation::Frontmatter => merge_tags(
                self.store.as_ref(),
                &request.document,
                tags,
                self.settings.frontmatter_key(),
                self.settings.dedupe_against_existing,
            )?,
            location => {
                insert_inline_tags(
                    self.store.as_ref(),
                    &request.document,
                    request.selection,
                    location,
                    tags,
                )?;
                tags.to_vec()
            }
        };
        Ok(inserted)
    }

    /// [`generate_tags`](Self::generate_tags), with any error logged and
    /// shown through the notifier before it is returned.
    pub async fn run(&self, request: &TaggingRequest) -> Result<TaggingReport, AutoTagError> {
        match self.generate_tags(request).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(document = %request.document.display(), error = %e, "Tag generation failed");
                self.notifier.error(&e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests;
