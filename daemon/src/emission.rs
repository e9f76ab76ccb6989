//! Decides whether a freshly polled snapshot is worth sending to the presence service.
use std::time::{Duration, Instant};

use crate::snapshot::{ActivitySnapshot, SignificantState};

/// Maximum silence towards the presence service.  Discord drops an activity it has not
/// heard about for a while, so static state is re-sent after this long.
pub const KEEPALIVE_CEILING: Duration = Duration::from_secs(30);

/// Remembers what was last emitted and when.
#[derive(Debug, Default)]
pub struct EmissionGate {
    last: Option<(SignificantState, Instant)>,
}

impl EmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `snapshot` differs significantly from the last emission, nothing has
    /// been emitted yet, or the keep-alive ceiling has been exceeded.
    pub fn should_emit(&self, snapshot: &ActivitySnapshot, now: Instant) -> bool {
        match &self.last {
            None => true,
            Some((state, at)) => {
                *state != snapshot.significant()
                    || now.saturating_duration_since(*at) > KEEPALIVE_CEILING
            }
        }
    }

    /// Records that `snapshot` was handed to the presence client at `now`.
    pub fn record(&mut self, snapshot: &ActivitySnapshot, now: Instant) {
        self.last = Some((snapshot.significant(), now));
    }

    /// [`should_emit`](Self::should_emit) followed by [`record`](Self::record) when it
    /// returns true.
    pub fn check(&mut self, snapshot: &ActivitySnapshot, now: Instant) -> bool {
        let emit = self.should_emit(snapshot, now);
        if emit {
            self.record(snapshot, now);
        }
        emit
    }
}
