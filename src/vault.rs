//! Markdown vault access: documents, the metadata index, known-tag
//! collection and tag insertion.
//!
//! The traits [`MetadataIndex`] and [`DocumentStore`] are the seams the
//! tagging flow depends on; [`Vault`] implements both over a directory.

mod document;
mod fs_vault;
pub mod frontmatter;
pub mod insertion;
pub mod known_tags;

pub use document::{Document, DocumentError, frontmatter_tags, inline_tags, strip_frontmatter};
pub use frontmatter::{TagKey, merge_into_mapping, merge_tags};
pub use fs_vault::{DocumentStore, MetadataIndex, Vault};
pub use insertion::{InsertLocation, Selection, insert_inline_tags, render_inline};
pub use known_tags::{TagScope, collect as collect_known_tags};
