//! Markdown documents split into YAML frontmatter and body.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors raised while reading, parsing or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The target document does not exist (or no document was given)
    #[error("No active document: {0}")]
    NotFound(String),

    #[error("Invalid frontmatter in {path}: {reason}")]
    InvalidFrontmatter { path: String, reason: String },

    #[error("Selection {start}:{end} is outside the document body ({lines} lines)")]
    SelectionOutOfRange {
        start: usize,
        end: usize,
        lines: usize,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DocumentError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Inline `#tag` occurrences: preceded by start-of-line or whitespace, made of
/// letters, digits, `_`, `-` and `/`.
static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)#([\p{L}\p{N}_/\-]+)").expect("inline tag pattern is valid")
});

/// A parsed Markdown note.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: PathBuf,
    frontmatter: Mapping,
    /// Frontmatter text as read, used to keep untouched entries verbatim
    source: Option<String>,
    body: String,
}

impl Document {
    /// Parses `content` into frontmatter and body.
    ///
    /// A document without a leading `---` block has an empty frontmatter
    /// mapping and its whole content as body.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::InvalidFrontmatter` if the block is not a YAML
    /// mapping.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, DocumentError> {
        let path = path.into();

        let Some((yaml, body)) = split_frontmatter(content) else {
            return Ok(Self {
                path,
                frontmatter: Mapping::new(),
                source: None,
                body: content.to_string(),
            });
        };

        let invalid = |reason: String| DocumentError::InvalidFrontmatter {
            path: path.display().to_string(),
            reason,
        };

        let frontmatter = match serde_yaml::from_str::<Value>(yaml)
            .map_err(|e| invalid(e.to_string()))?
        {
            Value::Null => Mapping::new(),
            Value::Mapping(mapping) => mapping,
            _ => return Err(invalid("expected a key/value mapping".to_string())),
        };

        Ok(Self {
            path,
            frontmatter,
            source: Some(yaml.to_string()),
            body: body.to_string(),
        })
    }

    /// Renders the document back to Markdown.
    ///
    /// An empty frontmatter mapping is omitted entirely. Top-level entries
    /// whose value did not change keep their original text, comments
    /// included; changed and new entries are written by `serde_yaml`. If the
    /// original block cannot be split into one entry per key, the whole
    /// mapping is re-serialized.
    pub fn render(&self) -> Result<String, DocumentError> {
        if self.frontmatter.is_empty() {
            return Ok(self.body.clone());
        }
        let preserved = match &self.source {
            Some(source) => render_preserving(source, &self.frontmatter)?,
            None => None,
        };
        let yaml = match preserved {
            Some(yaml) => yaml,
            None => serde_yaml::to_string(&self.frontmatter)?,
        };
        Ok(format!("---\n{yaml}---\n{}", self.body))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frontmatter(&self) -> &Mapping {
        &self.frontmatter
    }

    pub fn frontmatter_mut(&mut self) -> &mut Mapping {
        &mut self.frontmatter
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Returns every tag the document carries, in the index's raw `#tag`
    /// form: frontmatter tags first, then inline tags, without duplicates.
    pub fn tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        frontmatter_tags(&self.frontmatter)
            .into_iter()
            .chain(inline_tags(&self.body))
            .map(|tag| format!("#{}", tag.trim_start_matches('#')))
            .filter(|tag| seen.insert(tag.clone()))
            .collect()
    }
}

/// Splits `---\n<yaml>---\n<body>`; `None` when there is no frontmatter block.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// One top-level entry of a frontmatter block as written in the file.
struct SourceEntry {
    key: Value,
    value: Value,
    text: String,
    /// Comment and blank lines after the value
    trailing: String,
}

/// Renders `frontmatter` reusing the text of unchanged entries from `source`.
fn render_preserving(source: &str, frontmatter: &Mapping) -> Result<Option<String>, DocumentError> {
    let Some((mut yaml, entries)) = source_entries(source) else {
        return Ok(None);
    };

    for (key, value) in frontmatter {
        match entries.iter().find(|entry| &entry.key == key) {
            Some(entry) if &entry.value == value => yaml.push_str(&entry.text),
            Some(entry) => {
                yaml.push_str(&render_entry(key, value)?);
                yaml.push_str(&entry.trailing);
            }
            None => yaml.push_str(&render_entry(key, value)?),
        }
    }
    Ok(Some(yaml))
}

fn render_entry(key: &Value, value: &Value) -> Result<String, serde_yaml::Error> {
    let mut single = Mapping::new();
    single.insert(key.clone(), value.clone());
    serde_yaml::to_string(&single)
}

/// Splits a frontmatter block into leading comments and one text block per
/// top-level key. `None` unless every block parses on its own and together
/// they give back the whole mapping (anchors across entries, complex keys
/// and flow collections spanning unindented lines all fail this).
fn source_entries(source: &str) -> Option<(String, Vec<SourceEntry>)> {
    let mut prelude = String::new();
    let mut blocks: Vec<String> = Vec::new();
    for line in source.split_inclusive('\n') {
        if starts_entry(line) {
            blocks.push(line.to_string());
        } else if let Some(block) = blocks.last_mut() {
            block.push_str(line);
        } else {
            prelude.push_str(line);
        }
    }
    if prelude
        .lines()
        .any(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
    {
        return None;
    }

    let mut entries = Vec::with_capacity(blocks.len());
    for text in blocks {
        let split = trailing_start(&text);
        let mapping: Mapping = serde_yaml::from_str(&text[..split]).ok()?;
        let mut items = mapping.into_iter();
        let (key, value) = items.next()?;
        if items.next().is_some() {
            return None;
        }
        let trailing = text[split..].to_string();
        entries.push(SourceEntry {
            key,
            value,
            text,
            trailing,
        });
    }

    let whole = match serde_yaml::from_str::<Value>(source).ok()? {
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => return None,
    };
    let combined: Mapping = entries
        .iter()
        .map(|entry| (entry.key.clone(), entry.value.clone()))
        .collect();
    (combined.len() == entries.len() && combined == whole).then_some((prelude, entries))
}

/// A line at column zero that is not a comment or a sequence item.
fn starts_entry(line: &str) -> bool {
    line.chars()
        .next()
        .is_some_and(|c| !c.is_whitespace() && c != '#' && c != '-')
}

/// Byte offset where the block's trailing comment and blank lines begin.
fn trailing_start(block: &str) -> usize {
    let lines: Vec<&str> = block.split_inclusive('\n').collect();
    let trailing: usize = lines
        .iter()
        .skip(1)
        .rev()
        .take_while(|line| line.trim().is_empty() || line.starts_with('#'))
        .map(|line| line.len())
        .sum();
    block.len() - trailing
}

/// Returns `text` without a leading frontmatter block.
///
/// # Examples
///
/// ```
/// use autotag::vault::strip_frontmatter;
///
/// assert_eq!(strip_frontmatter("---\ntags: [a]\n---\nBody"), "Body");
/// assert_eq!(strip_frontmatter("Just text"), "Just text");
/// ```
pub fn strip_frontmatter(text: &str) -> &str {
    split_frontmatter(text).map_or(text, |(_, body)| body)
}

/// Frontmatter keys read as tags, in order: the usual key, its singular
/// form, and the key generated tags may be written to.
const TAG_KEYS: [&str; 3] = ["tags", "tag", "autotags"];

/// Reads every tag key, accepting a list or a comma/space separated string.
pub fn frontmatter_tags(frontmatter: &Mapping) -> Vec<String> {
    TAG_KEYS
        .iter()
        .flat_map(|key| values_as_tags(frontmatter.get(*key)))
        .collect()
}

fn values_as_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_tag_string(s),
        _ => Vec::new(),
    }
}

pub(crate) fn split_tag_string(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Finds inline `#tags` in a Markdown body, skipping fenced code blocks.
///
/// Purely numeric matches (`#1`) are not tags. Returned without the `#`.
pub fn inline_tags(body: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for capture in INLINE_TAG.captures_iter(line) {
            let tag = capture[1].trim_end_matches('/');
            if !tag.is_empty() && !tag.chars().all(|c| c.is_ascii_digit()) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "---\ntitle: Paris\ntags:\n  - travel\n  - europe\n---\n# Paris\n\nVisited the #eiffel-tower today. #travel\n";

    #[test]
    fn parse_splits_frontmatter_and_body() {
        let doc = Document::parse("paris.md", NOTE).unwrap();
        assert_eq!(
            doc.frontmatter().get("title"),
            Some(&Value::String("Paris".to_string()))
        );
        assert!(doc.body().starts_with("# Paris"));
    }

    #[test]
    fn parse_without_frontmatter_keeps_content_as_body() {
        let doc = Document::parse("plain.md", "Just text\n").unwrap();
        assert!(doc.frontmatter().is_empty());
        assert_eq!(doc.body(), "Just text\n");
        assert_eq!(doc.render().unwrap(), "Just text\n");
    }

    #[test]
    fn parse_accepts_empty_frontmatter_block() {
        let doc = Document::parse("empty.md", "---\n---\nBody").unwrap();
        assert!(doc.frontmatter().is_empty());
        assert_eq!(doc.body(), "Body");
    }

    #[test]
    fn parse_rejects_non_mapping_frontmatter() {
        let result = Document::parse("bad.md", "---\n- a\n- b\n---\nBody");
        assert!(matches!(
            result,
            Err(DocumentError::InvalidFrontmatter { .. })
        ));
    }

    #[test]
    fn unterminated_block_is_treated_as_body() {
        let doc = Document::parse("open.md", "---\ntitle: x\nno closing").unwrap();
        assert!(doc.frontmatter().is_empty());
    }

    #[test]
    fn render_round_trips_fields_and_body() {
        let doc = Document::parse("paris.md", NOTE).unwrap();
        let rendered = doc.render().unwrap();
        let reparsed = Document::parse("paris.md", &rendered).unwrap();

        assert_eq!(reparsed.frontmatter(), doc.frontmatter());
        assert_eq!(reparsed.body(), doc.body());
        assert_eq!(rendered, NOTE);
    }

    #[test]
    fn tags_combine_frontmatter_and_inline_without_duplicates() {
        let doc = Document::parse("paris.md", NOTE).unwrap();
        assert_eq!(doc.tags(), vec!["#travel", "#europe", "#eiffel-tower"]);
    }

    #[test]
    fn frontmatter_tags_accept_string_form() {
        let doc = Document::parse("s.md", "---\ntags: rust, async tokio\n---\n").unwrap();
        assert_eq!(frontmatter_tags(doc.frontmatter()), vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn frontmatter_tags_read_singular_and_generated_keys() {
        let doc = Document::parse(
            "k.md",
            "---\ntags: [rust]\ntag: async\nautotags:\n- autotag/tokio\n---\n",
        )
        .unwrap();
        assert_eq!(
            frontmatter_tags(doc.frontmatter()),
            vec!["rust", "async", "autotag/tokio"]
        );
        assert_eq!(doc.tags(), vec!["#rust", "#async", "#autotag/tokio"]);
    }

    #[test]
    fn render_keeps_unchanged_entries_verbatim() {
        let content = "---\n# reading notes\nversion: 1.10\nratio: 1e3\ntags: [a]  # inline\n\n# people\naliases:\n  - Paris   # capital\n---\nBody\n";
        let mut doc = Document::parse("v.md", content).unwrap();
        assert_eq!(doc.render().unwrap(), content);

        doc.frontmatter_mut().insert(
            Value::from("tags"),
            Value::Sequence(vec![Value::from("a"), Value::from("b")]),
        );
        doc.frontmatter_mut()
            .insert(Value::from("status"), Value::from("draft"));

        assert_eq!(
            doc.render().unwrap(),
            "---\n# reading notes\nversion: 1.10\nratio: 1e3\ntags:\n- a\n- b\n\n# people\naliases:\n  - Paris   # capital\nstatus: draft\n---\nBody\n"
        );
    }

    #[test]
    fn render_falls_back_when_entries_share_anchors() {
        let content = "---\nbase: &city Paris\ncopy: *city\n---\nBody";
        let mut doc = Document::parse("a.md", content).unwrap();
        doc.frontmatter_mut()
            .insert(Value::from("tags"), Value::Sequence(vec![Value::from("x")]));

        let rendered = doc.render().unwrap();
        let reparsed = Document::parse("a.md", &rendered).unwrap();
        assert_eq!(reparsed.frontmatter(), doc.frontmatter());
        assert_eq!(reparsed.body(), "Body");
    }

    #[test]
    fn inline_tags_skip_headings_numbers_and_code() {
        let body = "# Heading\n## Sub\nIssue #42 and #todo\n```\n#not-a-tag\n```\n#nested/tag/ end";
        assert_eq!(inline_tags(body), vec!["todo", "nested/tag"]);
    }

    #[test]
    fn inline_tags_support_non_latin_scripts() {
        assert_eq!(inline_tags("訪問 #東京 и #путешествие"), vec!["東京", "путешествие"]);
    }

    #[test]
    fn strip_frontmatter_handles_crlf() {
        assert_eq!(strip_frontmatter("---\r\na: 1\r\n---\r\nBody"), "Body");
    }
}
