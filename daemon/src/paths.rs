/// Canonical file paths for the daemon's data files.
///
/// Both files live in the per-user config directory (`dirs::config_dir()`):
///   - config.toml  Edited by the user, read by the daemon.
///   - status.toml  Written by the daemon for anything that wants to display its state.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "flstudio-presence";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";

/// Returns the application data directory, e.g. `~/.config/flstudio-presence/` on Linux
/// or `%APPDATA%\flstudio-presence\` on Windows.
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(base.join(APP_DIR_NAME))
}

/// Returns the default config file path inside [`app_data_dir`].
pub fn config_file_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE_NAME))
}

/// The status file sits next to whichever config file is in use.
pub fn status_file_path(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) => dir.join(STATUS_FILE_NAME),
        None => PathBuf::from(STATUS_FILE_NAME),
    }
}
