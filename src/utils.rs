//! Shared path helpers for the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable pointing at an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "AUTOTAG_CONFIG";

/// Gets the settings file path.
///
/// Returns `AUTOTAG_CONFIG` when set, otherwise `{config_dir}/autotag/config.toml`
/// where `config_dir` is:
/// - Linux: `~/.config`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the configuration directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to determine configuration directory"))?;

    Ok(config_dir.join("autotag").join("config.toml"))
}

/// Gets the log file path, `{data_dir}/autotag/autotag.log`.
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_log_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("autotag").join("autotag.log"))
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
