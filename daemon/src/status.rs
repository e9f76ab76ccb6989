use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::snapshot::{ActivitySnapshot, DawState};

/// Runtime status written by the daemon to `status.toml` next to the config.
/// Other tools read this file (read-only) to display daemon state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DaemonStatus {
    /// Daemon binary version (set from Cargo.toml at compile time).
    pub version: String,
    /// What FL Studio is doing, as last detected.
    pub state: DawState,
    /// Project currently open, if any.  Written even when hidden from Discord.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Detected FL Studio version label, e.g. "FL Studio 21".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daw_version: Option<String>,
    /// Whether the last presence update reached Discord.
    pub presence_connected: bool,
    /// RFC 3339 timestamp of the last presence emission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// Human-readable error message if the last presence update failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonStatus {
    /// Constructs the initial status on daemon startup.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: DawState::NotRunning,
            project_name: None,
            daw_version: None,
            presence_connected: false,
            last_update: None,
            error: None,
        }
    }

    /// Copies the detection fields of `snapshot` and stamps the update time.
    pub fn apply_snapshot(&mut self, snapshot: &ActivitySnapshot, now: DateTime<Utc>) {
        self.state = snapshot.state();
        self.project_name = Some(snapshot.project_name.clone()).filter(|p| !p.is_empty());
        self.daw_version =
            Some(snapshot.version.clone()).filter(|v| snapshot.is_running && !v.is_empty());
        self.last_update = Some(now.to_rfc3339());
    }
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged and swallowed; a status write never stops the daemon.
pub fn write_status(path: &Path, status: &DaemonStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("failed to create directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::warn!("failed to write status file: {e}");
            }
        }
        Err(e) => tracing::warn!("failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn running(project: &str) -> ActivitySnapshot {
        ActivitySnapshot {
            is_running: true,
            is_idle: project.is_empty(),
            project_name: project.to_string(),
            version: "FL Studio 21".to_string(),
            process_id: 42,
            ..ActivitySnapshot::not_running()
        }
    }

    // ── DaemonStatus::new ─────────────────────────────────────────────────────

    #[test]
    fn new_starts_not_running() {
        let s = DaemonStatus::new();
        assert_eq!(s.state, DawState::NotRunning);
        assert!(!s.presence_connected);
    }

    #[test]
    fn new_has_no_optional_fields() {
        let s = DaemonStatus::new();
        assert!(s.project_name.is_none());
        assert!(s.daw_version.is_none());
        assert!(s.last_update.is_none());
        assert!(s.error.is_none());
    }

    #[test]
    fn new_version_matches_cargo_pkg() {
        let s = DaemonStatus::new();
        assert_eq!(s.version, env!("CARGO_PKG_VERSION"));
    }

    // ── apply_snapshot ────────────────────────────────────────────────────────

    #[test]
    fn apply_snapshot_copies_detection_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut s = DaemonStatus::new();
        s.apply_snapshot(&running("Beat"), now);
        assert_eq!(s.state, DawState::Composing);
        assert_eq!(s.project_name.as_deref(), Some("Beat"));
        assert_eq!(s.daw_version.as_deref(), Some("FL Studio 21"));
        assert_eq!(s.last_update.as_deref(), Some("2024-05-01T12:00:00+00:00"));
    }

    #[test]
    fn apply_snapshot_clears_fields_when_fl_exits() {
        let now = Utc::now();
        let mut s = DaemonStatus::new();
        s.apply_snapshot(&running("Beat"), now);
        s.apply_snapshot(&ActivitySnapshot::not_running(), now);
        assert_eq!(s.state, DawState::NotRunning);
        assert!(s.project_name.is_none());
        assert!(s.daw_version.is_none());
    }

    // ── serialization ─────────────────────────────────────────────────────────

    #[test]
    fn state_serializes_to_snake_case() {
        // TOML requires a root table, so verify the value via DaemonStatus.
        let mut s = DaemonStatus::new();
        let idle = toml::to_string_pretty(&s).unwrap();
        assert!(idle.contains("state = \"not_running\""));

        s.state = DawState::Recording;
        let recording = toml::to_string_pretty(&s).unwrap();
        assert!(recording.contains("state = \"recording\""));
    }

    // ── write_status ──────────────────────────────────────────────────────────

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("status.toml");
        write_status(&path, &DaemonStatus::new());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = DaemonStatus::new();
        original.apply_snapshot(&running("Beat"), Utc::now());
        original.presence_connected = true;

        write_status(&path, &original);

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: DaemonStatus = toml::from_str(&content).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &DaemonStatus::new());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("project_name"));
        assert!(!content.contains("daw_version"));
        assert!(!content.contains("last_update"));
        assert!(!content.contains("error"));
    }

    #[test]
    fn write_status_to_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is expected.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        write_status(&blocker.join("status.toml"), &DaemonStatus::new());
    }
}
