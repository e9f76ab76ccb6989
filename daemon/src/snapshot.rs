//! Point-in-time view of the detected FL Studio instance.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::ProcessRecord;
use crate::title::{self, ParsedTitle};

/// Everything known about FL Studio at the end of one poll.
///
/// Built once per admitted poll by [`build_snapshot`] and never mutated afterwards;
/// callers get clones.  When `is_running` is false every DAW-specific field holds its
/// default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub is_running: bool,
    pub is_playing: bool,
    pub is_recording: bool,
    pub is_paused: bool,
    pub is_idle: bool,
    pub has_unsaved_changes: bool,

    pub project_name: String,
    pub project_path: String,
    pub version: String,
    pub window_title: String,
    pub executable_path: String,

    pub process_id: u32,

    /// Not detectable from the title; kept at 0 until a source exists.
    pub bpm: u32,
    pub current_pattern: u32,

    /// Start of the current FL Studio session, stable while the pid is unchanged.
    pub session_start_time: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ActivitySnapshot {
    /// The snapshot reported when no FL Studio process is found.
    pub fn not_running() -> Self {
        Self {
            is_running: false,
            is_playing: false,
            is_recording: false,
            is_paused: false,
            is_idle: true,
            has_unsaved_changes: false,
            project_name: String::new(),
            project_path: String::new(),
            version: String::new(),
            window_title: String::new(),
            executable_path: String::new(),
            process_id: 0,
            bpm: 0,
            current_pattern: 0,
            session_start_time: None,
            last_activity: None,
        }
    }

    /// The subset of fields whose change warrants an outbound presence update.
    pub fn significant(&self) -> SignificantState {
        SignificantState {
            project_name: self.project_name.clone(),
            is_playing: self.is_playing,
            is_recording: self.is_recording,
            is_paused: self.is_paused,
            is_running: self.is_running,
            has_unsaved_changes: self.has_unsaved_changes,
        }
    }

    pub fn state(&self) -> DawState {
        DawState::from(self)
    }
}

impl Default for ActivitySnapshot {
    fn default() -> Self {
        Self::not_running()
    }
}

/// Significant fields of a snapshot.  Two snapshots with equal `SignificantState`
/// describe the same presence, whatever their titles or timestamps say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignificantState {
    pub project_name: String,
    pub is_playing: bool,
    pub is_recording: bool,
    pub is_paused: bool,
    pub is_running: bool,
    pub has_unsaved_changes: bool,
}

/// Display classification of a snapshot.  Derived only; never drives control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DawState {
    NotRunning,
    Idle,
    Composing,
    Playing,
    Recording,
    Paused,
}

impl From<&ActivitySnapshot> for DawState {
    fn from(snapshot: &ActivitySnapshot) -> Self {
        if !snapshot.is_running {
            DawState::NotRunning
        } else if snapshot.is_recording {
            DawState::Recording
        } else if snapshot.is_playing {
            DawState::Playing
        } else if snapshot.is_paused {
            DawState::Paused
        } else if !snapshot.project_name.is_empty() {
            DawState::Composing
        } else {
            DawState::Idle
        }
    }
}

impl fmt::Display for DawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DawState::NotRunning => "not running",
            DawState::Idle => "idle",
            DawState::Composing => "composing",
            DawState::Playing => "playing",
            DawState::Recording => "recording",
            DawState::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Composes the snapshot for one poll.
///
/// `previous` supplies session continuity: its `session_start_time` carries over only
/// when it describes the same pid.  PID reuse by a restarted process inside one poll
/// interval is not detected.
pub fn build_snapshot(
    candidate: Option<&ProcessRecord>,
    parsed: &ParsedTitle,
    previous: &ActivitySnapshot,
    now: DateTime<Utc>,
) -> ActivitySnapshot {
    let Some(process) = candidate else {
        return ActivitySnapshot::not_running();
    };

    let session_start_time = match previous.session_start_time {
        Some(start) if previous.is_running && previous.process_id == process.pid => start,
        _ => now,
    };
    let project_name = parsed.project_name.clone().unwrap_or_default();

    ActivitySnapshot {
        is_running: true,
        is_playing: false,
        is_recording: false,
        is_paused: false,
        is_idle: project_name.is_empty(),
        has_unsaved_changes: parsed.has_unsaved_changes,
        project_name,
        project_path: String::new(),
        version: title::resolve_version(parsed.version, &process.name).to_string(),
        window_title: process.window_title.clone(),
        executable_path: process.executable_path.clone(),
        process_id: process.pid,
        bpm: 0,
        current_pattern: 0,
        session_start_time: Some(session_start_time),
        last_activity: Some(now),
    }
}
