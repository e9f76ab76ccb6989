//! Detection engine: throttled enumerate → filter → parse → build.
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::filter;
use crate::process::ProcessSource;
use crate::snapshot::{self, ActivitySnapshot};
use crate::title;

/// Mutable engine state.  Guarded by one lock that is never held across enumeration.
struct PollerState {
    last_snapshot: ActivitySnapshot,
    /// `None` until the first admitted poll.
    last_poll_time: Option<Instant>,
}

/// Owns the poll state for one FL Studio detector.
///
/// Polls arriving less than `update_interval` after the previous admitted poll return
/// the cached snapshot without touching the OS.
pub struct Detector<S> {
    source: S,
    update_interval: Duration,
    state: Mutex<PollerState>,
}

impl<S: ProcessSource> Detector<S> {
    pub fn new(source: S, update_interval: Duration) -> Self {
        Self {
            source,
            update_interval,
            state: Mutex::new(PollerState {
                last_snapshot: ActivitySnapshot::not_running(),
                last_poll_time: None,
            }),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Polls now.  Blocking: may enumerate the OS process table.
    pub fn current_snapshot(&self) -> ActivitySnapshot {
        self.poll_at(Instant::now(), Utc::now())
    }

    /// Polls with explicit monotonic and wall-clock times.
    pub fn poll_at(&self, now: Instant, wall_now: DateTime<Utc>) -> ActivitySnapshot {
        // Admission: claim the poll slot under the lock, then release it for the
        // enumeration itself.
        let previous = {
            let mut state = self.lock_state();
            if let Some(last) = state.last_poll_time {
                if now.saturating_duration_since(last) < self.update_interval {
                    return state.last_snapshot.clone();
                }
            }
            state.last_poll_time = Some(now);
            state.last_snapshot.clone()
        };

        let records = self.source.list_processes();
        let candidates = filter::find_target_processes(&records);
        if candidates.len() > 1 {
            tracing::debug!(
                count = candidates.len(),
                pid = candidates[0].pid,
                "multiple FL Studio candidates; using the first"
            );
        }
        let candidate = candidates.first();
        let parsed = candidate
            .map(|c| title::parse_title(&c.window_title))
            .unwrap_or_default();
        let snapshot = snapshot::build_snapshot(candidate, &parsed, &previous, wall_now);

        if snapshot.process_id != previous.process_id {
            if snapshot.is_running {
                tracing::info!(
                    pid = snapshot.process_id,
                    version = %snapshot.version,
                    "FL Studio detected"
                );
            } else {
                tracing::info!(pid = previous.process_id, "FL Studio exited");
            }
        }

        self.lock_state().last_snapshot = snapshot.clone();
        snapshot
    }

    /// Unthrottled check for any FL Studio candidate.
    pub fn is_running(&self) -> bool {
        let records = self.source.list_processes();
        records.iter().any(filter::is_candidate)
    }

    fn lock_state(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
