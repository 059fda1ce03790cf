//! Gathers tags that already exist, as model context and for filtering.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use super::document::DocumentError;
use super::fs_vault::MetadataIndex;

/// Which documents contribute known tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagScope {
    /// Only the target document.
    Document,
    /// Every document in the index.
    #[default]
    Vault,
}

impl fmt::Display for TagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Vault => write!(f, "vault"),
        }
    }
}

impl FromStr for TagScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "vault" => Ok(Self::Vault),
            other => Err(format!("unknown tag scope '{other}' (expected document or vault)")),
        }
    }
}

/// Collects tags from the index, stripping the leading `#`.
///
/// Order follows the index's enumeration; tags are not sorted and are not
/// deduplicated across documents. With [`TagScope::Document`], `document`
/// must be given. In vault scope a document that fails to parse is skipped
/// with a warning.
///
/// # Errors
///
/// Returns `DocumentError::NotFound` if document scope is requested without
/// a document, or any error reading that document.
pub fn collect(
    index: &dyn MetadataIndex,
    scope: TagScope,
    document: Option<&Path>,
) -> Result<Vec<String>, DocumentError> {
    let strip = |tags: Vec<String>| {
        tags.into_iter()
            .map(|tag| tag.strip_prefix('#').map(str::to_string).unwrap_or(tag))
            .collect::<Vec<_>>()
    };

    match scope {
        TagScope::Document => {
            let document = document
                .ok_or_else(|| DocumentError::NotFound("no document given".to_string()))?;
            Ok(strip(index.tags_for(document)?))
        }
        TagScope::Vault => {
            let mut tags = Vec::new();
            for path in index.documents()? {
                match index.tags_for(&path) {
                    Ok(found) => tags.extend(strip(found)),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
                }
            }
            Ok(tags)
        }
    }
}
