use tokio::time::Duration;

/// How appends sent to one follower have fared, as seen by the leader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FollowerStats {
    pub success: u64,
    pub fail: u64,
    pub latency: LatencyStats,
}

/// Time to hand an append to the follower's connection. Zero until the first success.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatencyStats {
    pub current: Duration,
    pub average: Duration,
    pub minimum: Duration,
    pub maximum: Duration,
    total: Duration,
}

impl FollowerStats {
    pub(crate) fn record_success(&mut self, latency: Duration) {
        self.success += 1;

        let stats = &mut self.latency;
        stats.current = latency;
        stats.total = stats.total.saturating_add(latency);
        stats.average = Duration::from_nanos((stats.total.as_nanos() / u128::from(self.success)) as u64);
        if self.success == 1 || latency < stats.minimum {
            stats.minimum = latency;
        }
        if latency > stats.maximum {
            stats.maximum = latency;
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.fail += 1;
    }
}
