use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::detector::Detector;
use crate::emission::EmissionGate;
use crate::presence::{Activity, PresenceClient, PresenceError};
use crate::process::ProcessSource;
use crate::snapshot::ActivitySnapshot;
use crate::status::{self, DaemonStatus};

/// Sleep between loop iterations.  Kept short so stopping is quick no matter how long
/// the detector's update interval is; the detector does its own throttling.
pub const LOOP_TICK: Duration = Duration::from_millis(100);

/// A running monitor task.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signals the loop to stop and waits for it to clear the presence and exit.
    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.task.await {
            tracing::error!("monitor task ended abnormally: {e}");
        }
    }
}

/// Spawns [`run`] on the current runtime.  `presence` is `None` when rich presence is
/// disabled; detection and the status file keep working.
pub fn spawn<S, P>(
    detector: Arc<Detector<S>>,
    presence: Option<P>,
    config: Config,
    status_path: PathBuf,
) -> MonitorHandle
where
    S: ProcessSource + 'static,
    P: PresenceClient + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(run(detector, presence, config, Arc::clone(&stop), status_path));
    MonitorHandle { stop, task }
}

/// Polls `detector` every [`LOOP_TICK`] until `stop` is set.  Snapshots that pass the
/// [`EmissionGate`] are pushed to `presence` and recorded in the status file.
pub async fn run<S, P>(
    detector: Arc<Detector<S>>,
    mut presence: Option<P>,
    config: Config,
    stop: Arc<AtomicBool>,
    status_path: PathBuf,
) where
    S: ProcessSource + 'static,
    P: PresenceClient,
{
    tracing::info!(
        interval_ms = detector.update_interval().as_millis() as u64,
        rich_presence = presence.is_some(),
        "monitor started"
    );

    let mut gate = EmissionGate::new();
    let mut daemon_status = DaemonStatus::new();
    status::write_status(&status_path, &daemon_status);

    let startup = Arc::clone(&detector);
    if let Ok(false) = tokio::task::spawn_blocking(move || startup.is_running()).await {
        tracing::info!("waiting for FL Studio to start");
    }

    while !stop.load(Ordering::SeqCst) {
        let poller = Arc::clone(&detector);
        match tokio::task::spawn_blocking(move || poller.current_snapshot()).await {
            Ok(snapshot) => {
                if gate.check(&snapshot, Instant::now()) {
                    daemon_status.apply_snapshot(&snapshot, Utc::now());
                    if let Some(client) = presence.as_mut() {
                        let result = emit(client, &snapshot, &config).await;
                        // Clearing with no session succeeds without reaching Discord.
                        daemon_status.presence_connected = result.is_ok() && client.is_connected();
                        daemon_status.error = result.err().map(|e| e.to_string());
                    }
                    status::write_status(&status_path, &daemon_status);
                }
            }
            // A panicked poll counts as "no change this cycle".
            Err(e) => tracing::error!("detection poll failed: {e}"),
        }
        tokio::time::sleep(LOOP_TICK).await;
    }

    if let Some(client) = presence.as_mut() {
        client.shutdown().await;
    }
    daemon_status.presence_connected = false;
    status::write_status(&status_path, &daemon_status);
    tracing::info!("monitor stopped");
}

/// Sends `snapshot` to the presence client: an activity while FL Studio runs, a clear
/// otherwise.  The outcome is logged here and returned for the status file.
async fn emit<P: PresenceClient>(
    client: &mut P,
    snapshot: &ActivitySnapshot,
    config: &Config,
) -> Result<(), PresenceError> {
    let result = match Activity::from_snapshot(snapshot, &config.privacy, &config.presence) {
        Some(activity) => client.update_activity(&activity).await,
        None => client.clear_activity().await,
    };
    match &result {
        Ok(()) => tracing::debug!(
            state = %snapshot.state(),
            project = %snapshot.project_name,
            "presence updated"
        ),
        Err(PresenceError::NotAvailable) => tracing::debug!("Discord is not running"),
        Err(e) => tracing::warn!("presence update failed: {e}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::{fl, FakeSource};
    use crate::presence::ipc::DiscordIpcClient;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Update(Activity),
        Clear,
        Shutdown,
    }

    /// Records every call.  `unavailable` behaves like a client that cannot reach Discord:
    /// updates fail, clears succeed without sending anything.
    #[derive(Clone, Default)]
    struct RecordingPresence {
        calls: Arc<Mutex<Vec<Call>>>,
        unavailable: bool,
    }

    impl RecordingPresence {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn updates(&self) -> Vec<Activity> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Update(a) => Some(a),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl PresenceClient for RecordingPresence {
        async fn update_activity(&mut self, activity: &Activity) -> Result<(), PresenceError> {
            self.calls.lock().unwrap().push(Call::Update(activity.clone()));
            if self.unavailable {
                Err(PresenceError::NotAvailable)
            } else {
                Ok(())
            }
        }

        async fn clear_activity(&mut self) -> Result<(), PresenceError> {
            self.calls.lock().unwrap().push(Call::Clear);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.unavailable
        }

        async fn shutdown(&mut self) {
            self.calls.lock().unwrap().push(Call::Shutdown);
        }
    }

    fn detector(source: &FakeSource) -> Arc<Detector<FakeSource>> {
        Arc::new(Detector::new(source.clone(), Duration::from_millis(10)))
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn read_status(path: &std::path::Path) -> DaemonStatus {
        toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    /// For polling while the monitor may be mid-write.
    fn try_read_status(path: &std::path::Path) -> Option<DaemonStatus> {
        toml::from_str(&std::fs::read_to_string(path).ok()?).ok()
    }

    #[tokio::test]
    async fn static_state_is_emitted_once_then_shut_down() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();
        source.set(vec![fl(42, "FL Studio 21 - Beat.flp")]);
        let presence = RecordingPresence::default();

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| source.calls() >= 4).await;
        handle.stop().await;

        let calls = presence.calls();
        assert_eq!(calls.len(), 2, "{calls:?}");
        match &calls[0] {
            Call::Update(a) => assert_eq!(a.details, "Working on Beat"),
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(calls[1], Call::Shutdown);

        let status = read_status(&status_path);
        assert_eq!(status.project_name.as_deref(), Some("Beat"));
        assert!(!status.presence_connected);
    }

    #[tokio::test]
    async fn not_running_clears_then_start_updates() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::default();
        let presence = RecordingPresence::default();

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            dir.path().join("status.toml"),
        );
        wait_for(|| presence.calls().contains(&Call::Clear)).await;

        source.set(vec![fl(7, "FL Studio 21 - Song.flp *")]);
        wait_for(|| !presence.updates().is_empty()).await;
        handle.stop().await;

        let update = &presence.updates()[0];
        assert_eq!(update.details, "Working on Song");
        assert_eq!(update.state, "FL Studio 21 • Unsaved changes");
        assert_eq!(presence.calls()[0], Call::Clear);
    }

    #[tokio::test]
    async fn failed_update_is_recorded_in_status() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();
        source.set(vec![fl(42, "FL Studio 21 - Beat.flp")]);
        let presence = RecordingPresence { unavailable: true, ..Default::default() };

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| !presence.updates().is_empty()).await;
        wait_for(|| try_read_status(&status_path).is_some_and(|s| s.error.is_some())).await;
        handle.stop().await;

        let status = read_status(&status_path);
        assert!(status.error.unwrap().contains("Discord"));
        // The failed emission still counts; no retry storm before the keep-alive.
        assert_eq!(presence.updates().len(), 1);
    }

    #[tokio::test]
    async fn disabled_presence_still_tracks_status() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();
        source.set(vec![fl(42, "FL Studio 21 - Beat.flp")]);

        let handle = spawn::<_, RecordingPresence>(
            detector(&source),
            None,
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| try_read_status(&status_path).is_some_and(|s| s.project_name.is_some())).await;
        handle.stop().await;

        let status = read_status(&status_path);
        assert_eq!(status.daw_version.as_deref(), Some("FL Studio 21"));
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn privacy_settings_flow_into_activity() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::default();
        source.set(vec![fl(42, "FL Studio 21 - Beat.flp")]);
        let presence = RecordingPresence::default();
        let mut config = Config::default();
        config.privacy.show_project_name = false;

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            config,
            dir.path().join("status.toml"),
        );
        wait_for(|| !presence.updates().is_empty()).await;
        handle.stop().await;

        let update = &presence.updates()[0];
        assert_eq!(update.details, "Composing");
        assert!(update.buttons.is_empty());
    }

    #[tokio::test]
    async fn clear_without_discord_is_not_reported_as_connected() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();
        let presence = RecordingPresence { unavailable: true, ..Default::default() };

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| presence.calls().contains(&Call::Clear)).await;
        wait_for(|| try_read_status(&status_path).is_some_and(|s| s.last_update.is_some())).await;

        let status = read_status(&status_path);
        assert_eq!(status.state, crate::snapshot::DawState::NotRunning);
        assert!(!status.presence_connected);
        assert!(status.error.is_none());
        handle.stop().await;
    }

    #[tokio::test]
    async fn ipc_client_that_never_connected_is_not_reported_as_connected() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();

        // FL Studio never runs, so the client only ever clears and opens no socket.
        let handle = spawn(
            detector(&source),
            Some(DiscordIpcClient::new("1234")),
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| try_read_status(&status_path).is_some_and(|s| s.last_update.is_some())).await;

        let status = read_status(&status_path);
        assert_eq!(status.state, crate::snapshot::DawState::NotRunning);
        assert!(!status.presence_connected);
        handle.stop().await;
    }

    #[tokio::test]
    async fn clear_over_live_session_is_reported_as_connected() {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status.toml");
        let source = FakeSource::default();
        let presence = RecordingPresence::default();

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            status_path.clone(),
        );
        wait_for(|| try_read_status(&status_path).is_some_and(|s| s.last_update.is_some())).await;

        assert!(read_status(&status_path).presence_connected);
        handle.stop().await;
    }

    #[tokio::test]
    async fn startup_check_runs_inside_the_monitor_task() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::default();
        let presence = RecordingPresence::default();

        let handle = spawn(
            detector(&source),
            Some(presence.clone()),
            Config::default(),
            dir.path().join("status.toml"),
        );
        assert_eq!(source.calls(), 0, "spawn must not enumerate on the caller");

        wait_for(|| presence.calls().contains(&Call::Clear)).await;
        // One unthrottled running check, then at least one admitted poll.
        assert!(source.calls() >= 2);
        handle.stop().await;
    }
}
