//! Turns a snapshot into the text and artwork Discord displays.
use crate::config::{PresenceConfig, PrivacyConfig};
use crate::snapshot::{ActivitySnapshot, DawState};

/// Art asset keys uploaded to the Discord application.
pub mod assets {
    pub const FL_STUDIO_LOGO: &str = "fl_studio_logo";
    pub const PLAYING: &str = "playing";
    pub const RECORDING: &str = "recording";
    pub const COMPOSING: &str = "composing";
    pub const PAUSED: &str = "paused";
    pub const IDLE: &str = "idle";
}

const LARGE_TEXT: &str = "FL Studio";
const BUTTON_LABEL: &str = "Get FL Studio";
const BUTTON_URL: &str = "https://www.image-line.com/";
const SEPARATOR: &str = " • ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

/// Presence payload, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// First line, e.g. "Working on Beat".
    pub details: String,
    /// Second line, e.g. "FL Studio 21 • Unsaved changes".
    pub state: String,
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
    /// Session start as a Unix timestamp in seconds.
    pub start_timestamp: Option<i64>,
    pub buttons: Vec<ActivityButton>,
}

impl Activity {
    /// Builds the activity for `snapshot`, or `None` when FL Studio is not running and
    /// the presence should be cleared instead.
    pub fn from_snapshot(
        snapshot: &ActivitySnapshot,
        privacy: &PrivacyConfig,
        presence: &PresenceConfig,
    ) -> Option<Self> {
        let daw_state = snapshot.state();
        if daw_state == DawState::NotRunning {
            return None;
        }

        let shown_project = visible_project(snapshot, privacy);
        let details = match shown_project {
            Some(project) => format!("Working on {project}"),
            None => state_message(daw_state, presence).to_string(),
        };

        let (small_image, small_text) = small_asset(daw_state);
        let buttons = if presence.enable_buttons && shown_project.is_some() {
            vec![ActivityButton {
                label: BUTTON_LABEL.to_string(),
                url: BUTTON_URL.to_string(),
            }]
        } else {
            Vec::new()
        };

        Some(Self {
            details,
            state: state_line(snapshot, privacy),
            large_image: assets::FL_STUDIO_LOGO.to_string(),
            large_text: LARGE_TEXT.to_string(),
            small_image: small_image.to_string(),
            small_text: small_text.to_string(),
            start_timestamp: snapshot
                .session_start_time
                .map(|t| t.timestamp())
                .filter(|secs| *secs > 0),
            buttons,
        })
    }
}

/// The project name if one is known and privacy settings allow showing it.
fn visible_project<'a>(snapshot: &'a ActivitySnapshot, privacy: &PrivacyConfig) -> Option<&'a str> {
    let name = snapshot.project_name.as_str();
    if !privacy.show_project_name || name.is_empty() || privacy.is_hidden(name) {
        None
    } else {
        Some(name)
    }
}

fn state_message(state: DawState, presence: &PresenceConfig) -> &str {
    let (custom, default) = match state {
        DawState::Recording => (&presence.recording_message, "Recording"),
        DawState::Playing => (&presence.playing_message, "Playing"),
        DawState::Paused => (&presence.paused_message, "Paused"),
        DawState::Composing => (&presence.composing_message, "Composing"),
        DawState::Idle | DawState::NotRunning => (&presence.idle_message, "Idle"),
    };
    custom.as_deref().filter(|m| !m.trim().is_empty()).unwrap_or(default)
}

fn state_line(snapshot: &ActivitySnapshot, privacy: &PrivacyConfig) -> String {
    let mut line = if snapshot.version.is_empty() {
        LARGE_TEXT.to_string()
    } else {
        snapshot.version.clone()
    };
    if privacy.show_bpm && snapshot.bpm > 0 {
        line.push_str(&format!("{SEPARATOR}{} BPM", snapshot.bpm));
    }
    if privacy.show_unsaved_changes && snapshot.has_unsaved_changes {
        line.push_str(SEPARATOR);
        line.push_str("Unsaved changes");
    }
    line
}

fn small_asset(state: DawState) -> (&'static str, &'static str) {
    match state {
        DawState::Recording => (assets::RECORDING, "Recording"),
        DawState::Playing => (assets::PLAYING, "Playing"),
        DawState::Paused => (assets::PAUSED, "Paused"),
        DawState::Composing => (assets::COMPOSING, "Composing"),
        DawState::Idle | DawState::NotRunning => (assets::IDLE, "Idle"),
    }
}
