use thiserror::Error;

use crate::models::{CaseStyle, Tag};

/// A suggested tag could not be turned into a valid [`Tag`].
///
/// Any such failure aborts the whole batch; callers never receive a partially
/// normalized list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error sanitizing tag '{tag}': {reason}")]
pub struct NormalizeError {
    pub tag: String,
    pub reason: String,
}

/// Post-processing layer for suggested tags.
///
/// Ensures consistent tag formatting regardless of LLM output quality:
/// every tag is re-cased according to a [`CaseStyle`] and optionally moved
/// under the `autotag/` namespace.
pub struct TagNormalizer;

impl TagNormalizer {
    /// Normalizes a batch of raw tags.
    ///
    /// # Normalization rules
    ///
    /// - Trims whitespace and strips leading `#` markers
    /// - Drops tags that are empty after trimming
    /// - Re-cases every `/`-separated segment with `style`
    /// - Prepends `autotag/` when `add_prefix` is set (never twice)
    ///
    /// Duplicates are kept; two different raw spellings may normalize to the
    /// same tag.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError` if a non-empty tag has no usable characters
    /// left after formatting (e.g. `"!!!"`).
    ///
    /// # Examples
    ///
    /// ```
    /// use autotag::autotagger::TagNormalizer;
    /// use autotag::CaseStyle;
    ///
    /// let raw = vec!["Eiffel Tower".to_string(), "  ".to_string(), "#Paris".to_string()];
    /// let tags = TagNormalizer::normalize(&raw, CaseStyle::Kebab, true).unwrap();
    /// let tags: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
    /// assert_eq!(tags, vec!["autotag/eiffel-tower", "autotag/paris"]);
    /// ```
    pub fn normalize<S: AsRef<str>>(
        raw_tags: &[S],
        style: CaseStyle,
        add_prefix: bool,
    ) -> Result<Vec<Tag>, NormalizeError> {
        let mut tags = Vec::with_capacity(raw_tags.len());

        for raw in raw_tags {
            let raw = raw.as_ref();
            let trimmed = raw.trim().trim_start_matches('#').trim();
            if trimmed.is_empty() {
                continue;
            }

            let unprefixed = if add_prefix {
                trimmed.strip_prefix(Tag::PREFIX).unwrap_or(trimmed)
            } else {
                trimmed
            };

            let formatted = Self::format_tag(unprefixed, style);
            if formatted.is_empty() {
                return Err(NormalizeError {
                    tag: raw.to_string(),
                    reason: "no letters or digits left after formatting".to_string(),
                });
            }

            let value = if add_prefix {
                format!("{}{formatted}", Tag::PREFIX)
            } else {
                formatted
            };

            let tag = Tag::parse(value).map_err(|e| NormalizeError {
                tag: raw.to_string(),
                reason: e.to_string(),
            })?;
            tags.push(tag);
        }

        Ok(tags)
    }

    /// Formats a single tag with the given case style.
    ///
    /// Nested segments (`parent/child`) are formatted independently. A
    /// segment already written in `style` is kept as is, so formatting is
    /// idempotent. Tags made only of Latin characters get full case
    /// conversion; other scripts keep their characters and only get word
    /// separators.
    ///
    /// # Examples
    ///
    /// ```
    /// use autotag::autotagger::TagNormalizer;
    /// use autotag::CaseStyle;
    ///
    /// assert_eq!(TagNormalizer::format_tag("Machine Learning", CaseStyle::Kebab), "machine-learning");
    /// assert_eq!(TagNormalizer::format_tag("machine learning", CaseStyle::Pascal), "MachineLearning");
    /// assert_eq!(TagNormalizer::format_tag("travel/Eiffel Tower", CaseStyle::Snake), "travel/eiffel_tower");
    /// assert_eq!(TagNormalizer::format_tag("東京 タワー", CaseStyle::Kebab), "東京-タワー");
    /// assert_eq!(TagNormalizer::format_tag("HTMLParser", CaseStyle::Pascal), "HTMLParser");
    /// ```
    #[must_use]
    pub fn format_tag(tag: &str, style: CaseStyle) -> String {
        let latin = is_latin(tag);

        tag.split('/')
            .map(|segment| {
                if is_formatted(segment, style) {
                    return segment.to_string();
                }
                if latin {
                    join_latin(&split_latin_words(segment), style)
                } else {
                    join_script_preserving(&split_script_words(segment), style)
                }
            })
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Whether every character lies within Basic Latin through Latin Extended-B.
fn is_latin(tag: &str) -> bool {
    tag.chars().all(|c| ('\u{0020}'..='\u{024F}').contains(&c))
}

/// Whether `segment` already has the shape `style` produces: non-empty
/// alphanumeric words joined by the style's separator, cased the way the
/// style cases them. Joined words must satisfy this for any input.
fn is_formatted(segment: &str, style: CaseStyle) -> bool {
    let separator = style.separator();
    let words: Vec<&str> = if separator.is_empty() {
        vec![segment]
    } else {
        segment.split(separator).collect()
    };
    if words
        .iter()
        .any(|word| word.is_empty() || !word.chars().all(char::is_alphanumeric))
    {
        return false;
    }

    let starts = |word: &&str, cased: fn(char) -> bool| word.chars().next().is_some_and(cased);
    match style {
        CaseStyle::Kebab | CaseStyle::Snake => words.iter().flat_map(|w| w.chars()).all(is_lower),
        CaseStyle::Constant => words.iter().flat_map(|w| w.chars()).all(is_upper),
        CaseStyle::Camel => starts(&words[0], is_lower),
        CaseStyle::Pascal | CaseStyle::PascalSnake | CaseStyle::Train => {
            words.iter().all(|word| starts(word, is_upper))
        }
    }
}

/// Unchanged by lowercasing (digits and uncased letters included).
fn is_lower(c: char) -> bool {
    c.to_lowercase().eq(std::iter::once(c))
}

/// Unchanged by uppercasing (digits and uncased letters included).
fn is_upper(c: char) -> bool {
    c.to_uppercase().eq(std::iter::once(c))
}

/// Splits at separators, lower-to-upper transitions (`eiffelTower`) and the
/// end of acronyms (`HTMLParser` -> `HTML`, `Parser`). Digits have no case
/// and never start a word on their own (`2FA` stays one word).
fn split_latin_words(segment: &str) -> Vec<String> {
    let chars: Vec<char> = segment.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let lower_to_upper = prev.is_lowercase() && c.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if lower_to_upper || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Splits only at non-alphanumeric characters; case transitions carry no
/// meaning for most non-Latin scripts.
fn split_script_words(segment: &str) -> Vec<String> {
    segment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_latin(words: &[String], style: CaseStyle) -> String {
    let lowered: Vec<String> = words
        .iter()
        .map(|word| alphanumeric(&word.to_lowercase()))
        .filter(|word| !word.is_empty())
        .collect();
    let cased: Vec<String> = lowered
        .iter()
        .enumerate()
        .map(|(i, word)| match style {
            CaseStyle::Kebab | CaseStyle::Snake => word.clone(),
            CaseStyle::Constant => alphanumeric(&word.to_uppercase()),
            CaseStyle::Camel if i == 0 => word.clone(),
            CaseStyle::Pascal | CaseStyle::Camel | CaseStyle::PascalSnake | CaseStyle::Train => {
                alphanumeric(&capitalize(word))
            }
        })
        .collect();
    cased.join(style.separator())
}

fn join_script_preserving(words: &[String], style: CaseStyle) -> String {
    let cased: Vec<String> = words
        .iter()
        .enumerate()
        .map(|(i, word)| match style {
            CaseStyle::Kebab | CaseStyle::Snake => word.to_lowercase(),
            CaseStyle::Constant => word.to_uppercase(),
            CaseStyle::Camel if i == 0 => lowercase_first(word),
            CaseStyle::Pascal | CaseStyle::Camel | CaseStyle::PascalSnake | CaseStyle::Train => {
                capitalize(word)
            }
        })
        .map(|word| alphanumeric(&word))
        .filter(|word| !word.is_empty())
        .collect();
    cased.join(style.separator())
}

/// Drops characters case mapping may introduce that are not word characters
/// (combining marks such as the dot in lowercased `İ`).
fn alphanumeric(word: &str) -> String {
    word.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Uppercases the first character and leaves the rest untouched.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
