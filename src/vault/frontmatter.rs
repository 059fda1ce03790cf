//! Appends tags to a document's frontmatter without touching other fields.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

use super::document::{DocumentError, split_tag_string};
use super::fs_vault::DocumentStore;
use crate::models::Tag;

/// Frontmatter key that receives generated tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKey {
    #[default]
    Tags,
    Autotags,
}

impl TagKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Autotags => "autotags",
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends `new_tags` under `key` in `frontmatter`, returning the tags that
/// were added.
///
/// A missing key is created and a single string value is promoted to a list.
/// Existing entries keep their order. With `dedupe`, tags already under the
/// key (or repeated within `new_tags`) are skipped, keeping the first
/// occurrence.
///
/// # Errors
///
/// Returns `DocumentError::InvalidFrontmatter` if the key holds something
/// other than a list, a string or null.
pub fn merge_into_mapping(
    frontmatter: &mut Mapping,
    new_tags: &[Tag],
    key: TagKey,
    dedupe: bool,
) -> Result<Vec<Tag>, DocumentError> {
    let slot = frontmatter
        .entry(Value::from(key.as_str()))
        .or_insert(Value::Null);
    let mut existing = match slot {
        Value::Null => Vec::new(),
        Value::Sequence(items) => std::mem::take(items),
        Value::String(s) => split_tag_string(s).into_iter().map(Value::String).collect(),
        other => {
            let kind = match other {
                Value::Mapping(_) => "a mapping",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                _ => "an unsupported value",
            };
            return Err(DocumentError::InvalidFrontmatter {
                path: String::new(),
                reason: format!("'{key}' holds {kind}, expected a list of tags"),
            });
        }
    };

    let mut added = Vec::with_capacity(new_tags.len());
    for tag in new_tags {
        let value = Value::String(tag.as_str().to_string());
        if dedupe && existing.contains(&value) {
            continue;
        }
        existing.push(value);
        added.push(tag.clone());
    }

    *slot = Value::Sequence(existing);
    Ok(added)
}

/// Merges `new_tags` into the frontmatter of `document` through `store`.
///
/// Either the whole update is written or nothing is. Returns the tags that
/// were added.
pub fn merge_tags(
    store: &dyn DocumentStore,
    document: &Path,
    new_tags: &[Tag],
    key: TagKey,
    dedupe: bool,
) -> Result<Vec<Tag>, DocumentError> {
    let mut added = Vec::new();
    store.process_frontmatter(document, &mut |frontmatter| {
        added = merge_into_mapping(frontmatter, new_tags, key, dedupe).map_err(|e| match e {
            DocumentError::InvalidFrontmatter { reason, .. } => DocumentError::InvalidFrontmatter {
                path: document.display().to_string(),
                reason,
            },
            other => other,
        })?;
        Ok(())
    })?;

    info!(path = %document.display(), key = %key, added = added.len(), "Tags merged into frontmatter");
    Ok(added)
}
