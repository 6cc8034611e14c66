use crate::api::{FollowerStats, Message};
use std::sync::Mutex;
use tokio::time::Instant;

/// Shared by a peer's stream writers and pipeline. Only appends are counted.
#[derive(Default)]
pub(crate) struct FollowerStatsRecorder {
    stats: Mutex<FollowerStats>,
}

impl FollowerStatsRecorder {
    pub(crate) fn record<T, E>(&self, message: &Message, started: Instant, result: &Result<T, E>) {
        if !message.is_append() {
            return;
        }
        let mut stats = self.stats.lock().expect("FollowerStatsRecorder.record() mutex guard poison");
        match result {
            Ok(_) => stats.record_success(started.elapsed()),
            Err(_) => stats.record_failure(),
        }
    }

    pub(crate) fn snapshot(&self) -> FollowerStats {
        self.stats
            .lock()
            .expect("FollowerStatsRecorder.snapshot() mutex guard poison")
            .clone()
    }
}
