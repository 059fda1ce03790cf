//! Line selections and inline (`#tag`) insertion around them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use super::document::DocumentError;
use super::fs_vault::DocumentStore;
use crate::models::Tag;

/// Where accepted tags are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertLocation {
    /// Appended to the frontmatter tag key.
    #[default]
    Frontmatter,
    /// As an inline `#tag` line before the first selected line.
    BeforeSelection,
    /// As an inline `#tag` line after the last selected line.
    AfterSelection,
}

impl fmt::Display for InsertLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frontmatter => write!(f, "frontmatter"),
            Self::BeforeSelection => write!(f, "before-selection"),
            Self::AfterSelection => write!(f, "after-selection"),
        }
    }
}

impl FromStr for InsertLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frontmatter" => Ok(Self::Frontmatter),
            "before-selection" | "before" => Ok(Self::BeforeSelection),
            "after-selection" | "after" => Ok(Self::AfterSelection),
            other => Err(format!(
                "unknown insert location '{other}' (expected frontmatter, before-selection or after-selection)"
            )),
        }
    }
}

/// An inclusive, 1-based range of body lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start_line: usize,
    pub end_line: usize,
}

impl Selection {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    fn check(&self, lines: usize) -> Result<(), DocumentError> {
        if self.start_line == 0 || self.start_line > self.end_line || self.end_line > lines {
            return Err(DocumentError::SelectionOutOfRange {
                start: self.start_line,
                end: self.end_line,
                lines,
            });
        }
        Ok(())
    }

    /// Returns the selected lines of `body`, joined with `\n`.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::SelectionOutOfRange` if the range is empty,
    /// reversed, or past the end of `body`.
    pub fn extract(&self, body: &str) -> Result<String, DocumentError> {
        let lines: Vec<&str> = body.lines().collect();
        self.check(lines.len())?;
        Ok(lines[self.start_line - 1..self.end_line].join("\n"))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.end_line)
    }
}

impl FromStr for Selection {
    type Err = String;

    /// Parses `A:B` or a single line `A`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid line number '{v}' in selection '{s}'"))
        };
        let (start, end) = match s.split_once(':') {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let line = parse(s)?;
                (line, line)
            }
        };
        if start == 0 || start > end {
            return Err(format!("selection '{s}' must satisfy 1 <= start <= end"));
        }
        Ok(Self::new(start, end))
    }
}

/// Renders tags as a single `#a #b` line.
pub fn render_inline(tags: &[Tag]) -> String {
    tags.iter()
        .map(Tag::hashtag)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inserts `#tag` line into `body` relative to `selection` (or the whole
/// body when `None`).
///
/// Before the selection the line is followed by a newline; after it, the
/// line is preceded by one. `InsertLocation::Frontmatter` leaves the body
/// unchanged.
pub fn insert_into_body(
    body: &str,
    selection: Option<Selection>,
    location: InsertLocation,
    tags: &[Tag],
) -> Result<String, DocumentError> {
    let line = render_inline(tags);
    let lines: Vec<&str> = body.split_inclusive('\n').collect();

    if lines.is_empty() {
        return Ok(match location {
            InsertLocation::Frontmatter => body.to_string(),
            _ => line,
        });
    }

    let selection = selection.unwrap_or(Selection::new(1, lines.len()));
    selection.check(lines.len())?;

    let mut out = String::with_capacity(body.len() + line.len() + 1);
    match location {
        InsertLocation::Frontmatter => out.push_str(body),
        InsertLocation::BeforeSelection => {
            for (i, l) in lines.iter().enumerate() {
                if i + 1 == selection.start_line {
                    out.push_str(&line);
                    out.push('\n');
                }
                out.push_str(l);
            }
        }
        InsertLocation::AfterSelection => {
            for (i, l) in lines.iter().enumerate() {
                if i + 1 == selection.end_line {
                    let content = l.trim_end_matches(['\r', '\n']);
                    out.push_str(content);
                    out.push('\n');
                    out.push_str(&line);
                    out.push_str(&l[content.len()..]);
                } else {
                    out.push_str(l);
                }
            }
        }
    }
    Ok(out)
}

/// Writes `tags` inline into `document` through `store`.
pub fn insert_inline_tags(
    store: &dyn DocumentStore,
    document: &Path,
    selection: Option<Selection>,
    location: InsertLocation,
    tags: &[Tag],
) -> Result<usize, DocumentError> {
    store.process_document(document, &mut |doc| {
        let body = insert_into_body(doc.body(), selection, location, tags)?;
        doc.set_body(body);
        Ok(())
    })?;

    info!(path = %document.display(), %location, count = tags.len(), "Inline tags inserted");
    Ok(tags.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(raw: &[&str]) -> Vec<Tag> {
        raw.iter().map(|t| Tag::parse(*t).unwrap()).collect()
    }

    const BODY: &str = "line one\nline two\nline three\n";

    #[test]
    fn selection_parses_ranges_and_single_lines() {
        assert_eq!("2:4".parse::<Selection>().unwrap(), Selection::new(2, 4));
        assert_eq!("3".parse::<Selection>().unwrap(), Selection::new(3, 3));
        assert!("0:2".parse::<Selection>().is_err());
        assert!("4:2".parse::<Selection>().is_err());
        assert!("a:b".parse::<Selection>().is_err());
    }

    #[test]
    fn extract_returns_selected_lines() {
        assert_eq!(Selection::new(2, 3).extract(BODY).unwrap(), "line two\nline three");
    }

    #[test]
    fn extract_past_end_is_out_of_range() {
        assert!(matches!(
            Selection::new(2, 9).extract(BODY),
            Err(DocumentError::SelectionOutOfRange { lines: 3, .. })
        ));
    }

    #[test]
    fn before_selection_inserts_line_above_first_selected_line() {
        let out = insert_into_body(
            BODY,
            Some(Selection::new(2, 3)),
            InsertLocation::BeforeSelection,
            &tags(&["paris", "travel"]),
        )
        .unwrap();
        assert_eq!(out, "line one\n#paris #travel\nline two\nline three\n");
    }

    #[test]
    fn after_selection_inserts_line_below_last_selected_line() {
        let out = insert_into_body(
            BODY,
            Some(Selection::new(1, 2)),
            InsertLocation::AfterSelection,
            &tags(&["paris"]),
        )
        .unwrap();
        assert_eq!(out, "line one\nline two\n#paris\nline three\n");
    }

    #[test]
    fn after_whole_body_without_trailing_newline() {
        let out = insert_into_body("only line", None, InsertLocation::AfterSelection, &tags(&["x"]))
            .unwrap();
        assert_eq!(out, "only line\n#x");
    }

    #[test]
    fn before_whole_body_goes_to_top() {
        let out = insert_into_body(BODY, None, InsertLocation::BeforeSelection, &tags(&["x"]))
            .unwrap();
        assert!(out.starts_with("#x\nline one\n"));
    }

    #[test]
    fn location_parses_short_and_long_names() {
        assert_eq!("after".parse::<InsertLocation>().unwrap(), InsertLocation::AfterSelection);
        assert_eq!(
            "before-selection".parse::<InsertLocation>().unwrap(),
            InsertLocation::BeforeSelection
        );
        assert!("middle".parse::<InsertLocation>().is_err());
    }
}
