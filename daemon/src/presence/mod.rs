//! Outbound presence: what gets shown, and the client that shows it.
//!
//! The monitor only ever talks to [`PresenceClient`]; [`ipc::DiscordIpcClient`] is the
//! production implementation.
pub mod activity;
pub mod ipc;

use async_trait::async_trait;

pub use activity::Activity;

/// Errors reported by a presence client.  None of them are fatal to the daemon.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("no Discord client is listening on any IPC socket")]
    NotAvailable,

    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed IPC payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Discord closed the connection ({code}): {message}")]
    Closed { code: i64, message: String },

    #[error("Discord rejected the activity: {0}")]
    Rejected(String),

    #[error("timed out waiting for Discord")]
    Timeout,

    #[error("unexpected IPC message: {0}")]
    Protocol(String),
}

/// A presence-broadcasting service.
///
/// `update_activity` resolves once the service has accepted or refused the update;
/// callers log the outcome and move on.
#[async_trait]
pub trait PresenceClient: Send {
    async fn update_activity(&mut self, activity: &Activity) -> Result<(), PresenceError>;

    /// Removes any activity previously set by this client.
    async fn clear_activity(&mut self) -> Result<(), PresenceError>;

    /// Whether a live session to the service exists right now.  A successful
    /// `clear_activity` with no session sends nothing, so callers check this too.
    fn is_connected(&self) -> bool;

    /// Clears the activity if possible and releases the connection.
    async fn shutdown(&mut self);
}
