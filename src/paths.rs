//! Path resolution for azrm
//!
//! # Environment Variables
//!
//! - `AZRM_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/azrm`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `AZRM_CONFIG_DIR` environment variable
//! 2. Existing `~/.config/azrm/`
//! 3. `XDG_CONFIG_HOME/azrm` (if set)
//! 4. Platform default:
//!    - Windows: `%APPDATA%\azrm`
//!    - macOS/Linux: `~/.config/azrm`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "AZRM_CONFIG_DIR";

const APP_DIR: &str = "azrm";

/// Get the azrm config directory path
pub fn config_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand_path(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    // 2. Check for existing ~/.config/azrm
    if let Some(home) = dirs::home_dir() {
        let dot_config = home.join(".config").join(APP_DIR);
        if dot_config.exists() {
            log::debug!("Using existing config dir: {}", dot_config.display());
            return Ok(dot_config);
        }
    }

    // 3. Check XDG_CONFIG_HOME
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 4. Platform default
    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join(APP_DIR);
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Whether a file should be parsed as JSON (by extension), TOML otherwise
pub fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
