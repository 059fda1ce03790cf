use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Formatting convention applied to newly suggested tags.
///
/// Serialized with kebab-case names (`pascal-snake`), and also accepts the
/// camelCase names older configuration files used (`pascalSnakeCase`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStyle {
    /// `two-words`
    #[default]
    #[serde(alias = "kebabCase")]
    Kebab,
    /// `two_words`
    #[serde(alias = "snakeCase")]
    Snake,
    /// `TwoWords`
    #[serde(alias = "pascalCase")]
    Pascal,
    /// `twoWords`
    #[serde(alias = "camelCase")]
    Camel,
    /// `TWO_WORDS`
    #[serde(alias = "constantCase")]
    Constant,
    /// `Two_Words`
    #[serde(alias = "pascalSnakeCase")]
    PascalSnake,
    /// `Two-Words`
    #[serde(alias = "trainCase")]
    Train,
}

impl CaseStyle {
    /// Every supported style, in settings display order.
    pub const ALL: [CaseStyle; 7] = [
        Self::Kebab,
        Self::Snake,
        Self::Pascal,
        Self::Camel,
        Self::PascalSnake,
        Self::Train,
        Self::Constant,
    ];

    /// Returns the string placed between words.
    pub fn separator(self) -> &'static str {
        match self {
            Self::Kebab | Self::Train => "-",
            Self::Snake | Self::Constant | Self::PascalSnake => "_",
            Self::Pascal | Self::Camel => "",
        }
    }

    /// Returns an example rendering of the words "two words".
    pub fn example(self) -> &'static str {
        match self {
            Self::Kebab => "two-words",
            Self::Snake => "two_words",
            Self::Pascal => "TwoWords",
            Self::Camel => "twoWords",
            Self::Constant => "TWO_WORDS",
            Self::PascalSnake => "Two_Words",
            Self::Train => "Two-Words",
        }
    }
}

impl fmt::Display for CaseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Kebab => "kebab",
            Self::Snake => "snake",
            Self::Pascal => "pascal",
            Self::Camel => "camel",
            Self::Constant => "constant",
            Self::PascalSnake => "pascal-snake",
            Self::Train => "train",
        };
        write!(f, "{name}")
    }
}

impl FromStr for CaseStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kebab" | "kebabcase" => Ok(Self::Kebab),
            "snake" | "snakecase" => Ok(Self::Snake),
            "pascal" | "pascalcase" => Ok(Self::Pascal),
            "camel" | "camelcase" => Ok(Self::Camel),
            "constant" | "constantcase" => Ok(Self::Constant),
            "pascal-snake" | "pascalsnakecase" => Ok(Self::PascalSnake),
            "train" | "traincase" => Ok(Self::Train),
            other => Err(format!(
                "unknown tag format '{other}' (expected one of: kebab, snake, pascal, camel, constant, pascal-snake, train)"
            )),
        }
    }
}
