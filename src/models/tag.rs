use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons a string cannot be used as a tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// Nothing left after trimming
    #[error("tag is empty")]
    Empty,

    /// Tags are stored without their `#` marker
    #[error("tag '{0}' must not start with '#'")]
    LeadingHash(String),

    /// Whitespace would split the tag when rendered inline
    #[error("tag '{0}' must not contain whitespace")]
    Whitespace(String),
}

/// A normalized tag, stored without its leading `#`.
///
/// Construct with [`Tag::parse`]; the [`TagNormalizer`](crate::autotagger::TagNormalizer)
/// is the usual source of tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Namespace prepended to suggested tags when prefixing is enabled.
    pub const PREFIX: &'static str = "autotag/";

    /// Validates and wraps a tag string.
    ///
    /// # Examples
    ///
    /// ```
    /// use autotag::Tag;
    ///
    /// let tag = Tag::parse("eiffel-tower").unwrap();
    /// assert_eq!(tag.as_str(), "eiffel-tower");
    /// assert_eq!(tag.hashtag(), "#eiffel-tower");
    ///
    /// assert!(Tag::parse("   ").is_err());
    /// assert!(Tag::parse("#paris").is_err());
    /// ```
    pub fn parse(value: impl Into<String>) -> Result<Self, TagError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(TagError::Empty);
        }
        if trimmed.starts_with('#') {
            return Err(TagError::LeadingHash(trimmed.to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TagError::Whitespace(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the tag text without the `#` marker.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the tag as written inline in a note body.
    pub fn hashtag(&self) -> String {
        format!("#{}", self.0)
    }

    /// Whether the tag lives under the `autotag/` namespace.
    pub fn is_prefixed(&self) -> bool {
        self.0.starts_with(Self::PREFIX)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}
