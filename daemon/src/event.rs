use crate::config::Config;

#[derive(Debug)]
pub enum DaemonEvent {
    /// The config file changed on disk, re-parsed, and passed validation.
    ConfigReloaded(Config),
    /// Ctrl+C or SIGTERM received; the daemon should clear its presence and exit.
    Shutdown,
}
