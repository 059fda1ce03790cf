//! Tag suggestion and normalization.
//!
//! [`AutoTagger`] sends note text to a model backend and runs every
//! suggestion through [`TagNormalizer`], so callers always receive tags in the
//! configured [`CaseStyle`](crate::CaseStyle).
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use autotag::autotagger::AutoTaggerBuilder;
//! use autotag::llm::OpenAiClientBuilder;
//! use autotag::CaseStyle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClientBuilder::new()
//!     .api_key(std::env::var("OPENAI_API_KEY")?)
//!     .model("gpt-4o-mini")
//!     .build()?;
//!
//! let tagger = AutoTaggerBuilder::new()
//!     .client(Arc::new(client))
//!     .style(CaseStyle::Kebab)
//!     .build()?;
//!
//! let tags = tagger
//!     .suggest_tags("The Eiffel Tower is in Paris, France.", &["travel".to_string()])
//!     .await?;
//! for tag in &tags {
//!     println!("{}", tag.hashtag());
//! }
//! # Ok(())
//! # }
//! ```

mod normalizer;
mod tagger;

pub use normalizer::{NormalizeError, TagNormalizer};
pub use tagger::{AutoTagger, AutoTaggerBuilder};
