use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::DaemonEvent;

/// Application id of the public "FL Studio" Discord app, which hosts the art assets.
pub const DEFAULT_APPLICATION_ID: &str = "1395851731312836760";
/// Value shipped in hand-written sample configs; never a real application.
pub const PLACEHOLDER_APPLICATION_ID: &str = "YOUR_DISCORD_APP_ID_HERE";
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 3000;

/// Reasons a parsed config cannot be used.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("discord.application_id is empty")]
    MissingApplicationId,
    #[error("discord.application_id is still the placeholder \"{PLACEHOLDER_APPLICATION_ID}\"")]
    PlaceholderApplicationId,
    #[error("discord.application_id \"{0}\" is not a numeric Discord application id")]
    NonNumericApplicationId(String),
    #[error("detection.update_interval_ms must be greater than zero")]
    ZeroUpdateInterval,
}

/// Root configuration structure. Deserialized from `<config dir>/flstudio-presence/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordConfig {
    /// Discord application whose name and art assets the presence uses.
    #[serde(default = "default_application_id")]
    pub application_id: String,
    /// When false the daemon still detects FL Studio but never talks to Discord.
    #[serde(default = "default_true")]
    pub enable_rich_presence: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            enable_rich_presence: true,
        }
    }
}

/// What the presence is allowed to reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivacyConfig {
    #[serde(default = "default_true")]
    pub show_project_name: bool,
    #[serde(default = "default_true")]
    pub show_bpm: bool,
    #[serde(default = "default_true")]
    pub show_unsaved_changes: bool,
    /// Project names never shown, compared case-insensitively.
    #[serde(default)]
    pub hidden_projects: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            show_project_name: true,
            show_bpm: true,
            show_unsaved_changes: true,
            hidden_projects: Vec::new(),
        }
    }
}

impl PrivacyConfig {
    pub fn is_hidden(&self, project_name: &str) -> bool {
        let name = project_name.trim();
        self.hidden_projects
            .iter()
            .any(|hidden| hidden.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Minimum spacing between two process-table enumerations.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
        }
    }
}

/// Presentation overrides.  Unset messages fall back to the built-in wording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceConfig {
    /// Adds a "Get FL Studio" link button while a project is shown.
    #[serde(default = "default_true")]
    pub enable_buttons: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composing_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playing_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_message: Option<String>,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enable_buttons: true,
            idle_message: None,
            composing_message: None,
            playing_message: None,
            recording_message: None,
            paused_message: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = self.discord.application_id.trim();
        if id.is_empty() {
            return Err(ConfigError::MissingApplicationId);
        }
        if id == PLACEHOLDER_APPLICATION_ID {
            return Err(ConfigError::PlaceholderApplicationId);
        }
        if !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::NonNumericApplicationId(id.to_string()));
        }
        if self.detection.update_interval_ms == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.detection.update_interval_ms)
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Like [`load_or_default`], but a missing file is first populated with the defaults so
/// users have something to edit.  Failing to write it is only logged.
pub fn load_or_create(path: &Path) -> Result<Config> {
    if !path.exists() {
        match write_default(path) {
            Ok(()) => tracing::info!(path = %path.display(), "wrote default config"),
            Err(e) => tracing::warn!("could not write default config: {e:#}"),
        }
        return Ok(Config::default());
    }
    load_or_default(path)
}

fn write_default(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified and still validates, sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<DaemonEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!("failed to create config watcher: {e}");
            return;
        }
    };

    // Watch the directory so editor-style atomic saves (write-new + rename) are seen.
    let watch_dir = match path.parent() {
        Some(d) => d.to_path_buf(),
        None => {
            tracing::error!(path = %path.display(), "config path has no parent directory");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::error!("failed to watch config directory: {e}");
        return;
    }

    let mut last_sent: Option<Config> = None;
    while let Some(event) = watch_rx.recv().await {
        let affects_config = event.paths.iter().any(|p| p == path.as_path());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );
        if !(affects_config && is_write) {
            continue;
        }

        let config = match load_or_default(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config change: {e:#}");
                continue;
            }
        };
        if let Err(e) = config.validate() {
            tracing::warn!("ignoring invalid config: {e}");
            continue;
        }
        // One save often produces several modify events.
        if last_sent.as_ref() == Some(&config) {
            continue;
        }
        last_sent = Some(config.clone());
        if tx.send(DaemonEvent::ConfigReloaded(config)).await.is_err() {
            break;
        }
    }
}

fn default_application_id() -> String {
    DEFAULT_APPLICATION_ID.to_string()
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_true() -> bool {
    true
}
