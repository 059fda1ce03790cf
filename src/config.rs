//! User settings.
//!
//! Settings live in a TOML file (see `utils::get_config_path`). Every field
//! has a default, so a missing file or a partial one is fine. A few values
//! can be overridden from the environment (or a `.env` file) so that secrets
//! don't have to be written to disk:
//!
//! | Variable           | Setting                                      |
//! |--------------------|----------------------------------------------|
//! | `OPENAI_API_KEY`   | `api_key`                                    |
//! | `AUTOTAG_BASE_URL` | `custom_base_url` (and `use_custom_base_url`)|
//! | `AUTOTAG_MODEL`    | `model`                                      |
//! | `AUTOTAG_PROVIDER` | `provider` (`openai` or `local`)             |
//!
//! `OLLAMA_HOST` and `OLLAMA_MODEL` are read by the local client when
//! `local_base_url` / `local_model` are unset.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::debug_log::DebugLog;
use crate::llm::{
    DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE, DemoClient, LlmError, LocalClientBuilder,
    OpenAiClientBuilder, TagModel,
};
use crate::models::{CaseStyle, ModelDescriptor, builtin_models, find_model};
use crate::vault::TagKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("Failed to create model client: {0}")]
    Client(#[from] LlmError),
}

/// Which backend answers tag requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI, or any OpenAI-compatible server behind `custom_base_url`
    #[default]
    OpenAi,
    /// A local Ollama server
    Local,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" | "ollama" => Ok(Self::Local),
            other => Err(format!("unknown provider '{other}' (expected openai or local)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Put generated tags under the `autotag/` namespace
    pub use_autotag_prefix: bool,
    /// Write to the `autotags` frontmatter key instead of `tags`
    pub use_frontmatter_autotags_key: bool,
    pub tags_format: CaseStyle,
    /// Show a cost estimate before each request
    pub check_cost_estimation: bool,
    /// Let the user review suggestions before they are written
    pub show_pre_update_dialog: bool,
    /// Print the inserted tags after writing
    pub show_post_update_dialog: bool,
    /// Use sample tags instead of calling a model
    pub demo_mode: bool,
    pub write_to_log_file: bool,
    /// Skip tags already under the frontmatter key when merging
    pub dedupe_against_existing: bool,

    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub custom_base_url: String,
    pub use_custom_base_url: bool,
    pub custom_models: Vec<ModelDescriptor>,

    pub local_base_url: Option<String>,
    pub local_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_autotag_prefix: true,
            use_frontmatter_autotags_key: false,
            tags_format: CaseStyle::Kebab,
            check_cost_estimation: true,
            show_pre_update_dialog: true,
            show_post_update_dialog: true,
            demo_mode: false,
            write_to_log_file: false,
            dedupe_against_existing: false,
            provider: Provider::OpenAi,
            api_key: String::new(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            custom_base_url: String::new(),
            use_custom_base_url: false,
            custom_models: Vec::new(),
            local_base_url: None,
            local_model: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse` if the file exists
    /// but cannot be read or is not valid TOML for these settings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Writes the settings to `path` as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }

    /// Applies `OPENAI_API_KEY`, `AUTOTAG_BASE_URL`, `AUTOTAG_MODEL` and
    /// `AUTOTAG_PROVIDER` when set and non-empty.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.api_key = key;
        }
        if let Some(url) = var("AUTOTAG_BASE_URL") {
            self.custom_base_url = url;
            self.use_custom_base_url = true;
        }
        if let Some(model) = var("AUTOTAG_MODEL") {
            self.model = model;
        }
        if let Some(provider) = var("AUTOTAG_PROVIDER") {
            self.provider = provider.parse().map_err(|reason| ConfigError::InvalidEnv {
                name: "AUTOTAG_PROVIDER",
                reason,
            })?;
        }
        Ok(())
    }

    pub fn frontmatter_key(&self) -> TagKey {
        if self.use_frontmatter_autotags_key {
            TagKey::Autotags
        } else {
            TagKey::Tags
        }
    }

    /// The custom base URL, when enabled and non-blank.
    pub fn custom_base_url(&self) -> Option<&str> {
        let url = self.custom_base_url.trim();
        (self.use_custom_base_url && !url.is_empty()).then_some(url)
    }

    /// Descriptor of the configured model, if it is built in or custom.
    pub fn selected_model(&self) -> Option<ModelDescriptor> {
        find_model(&self.model, &self.custom_models)
    }

    /// Built-in models followed by custom ones.
    pub fn available_models(&self) -> Vec<ModelDescriptor> {
        let mut models = builtin_models();
        models.extend(self.custom_models.iter().cloned());
        models
    }

    /// Whether a request can be made: demo mode and the local provider need
    /// nothing; the hosted provider needs an API key or a custom base URL.
    pub fn has_credentials(&self) -> bool {
        self.demo_mode
            || self.provider == Provider::Local
            || !self.api_key.trim().is_empty()
            || self.custom_base_url().is_some()
    }

    /// API key safe to print: a few leading and trailing characters only.
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.trim();
        let chars: Vec<char> = key.chars().collect();
        match chars.len() {
            0 => "(not set)".to_string(),
            1..=8 => "****".to_string(),
            n => format!(
                "{}...{}",
                chars[..3].iter().collect::<String>(),
                chars[n - 4..].iter().collect::<String>()
            ),
        }
    }

    /// Creates the model client these settings select.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Client` if the client cannot be built (for
    /// example an unparseable base URL).
    pub fn build_client(&self, debug_log: DebugLog) -> Result<Arc<dyn TagModel>, ConfigError> {
        if self.demo_mode {
            return Ok(Arc::new(DemoClient::default()));
        }

        match self.provider {
            Provider::OpenAi => {
                let mut builder = OpenAiClientBuilder::new()
                    .api_key(self.api_key.trim())
                    .model(&self.model)
                    .temperature(self.temperature)
                    .max_tokens(self.max_tokens)
                    .debug_log(debug_log);
                if let Some(url) = self.custom_base_url() {
                    builder = builder.custom_base_url(url);
                }
                Ok(Arc::new(builder.build()?))
            }
            Provider::Local => {
                let mut builder = LocalClientBuilder::new()
                    .temperature(self.temperature)
                    .debug_log(debug_log);
                if let Some(url) = &self.local_base_url {
                    builder = builder.base_url(url);
                }
                if let Some(model) = &self.local_model {
                    builder = builder.model(model);
                }
                Ok(Arc::new(builder.build()?))
            }
        }
    }
}
