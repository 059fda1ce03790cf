pub mod autotagger;
pub mod config;
pub mod debug_log;
pub mod error;
pub mod llm;
pub mod models;
pub mod service;
pub mod utils;
pub mod vault;

pub use config::{ConfigError, Provider, Settings};
pub use debug_log::{DebugLog, DebugLogEntry};
pub use error::AutoTagError;
pub use models::{CaseStyle, CostEstimate, ModelDescriptor, Tag};
pub use service::{TagService, TaggingReport, TaggingRequest, TaggingStatus};
pub use vault::{InsertLocation, Selection, TagKey, Vault};
