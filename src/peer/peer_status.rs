use crate::api::PeerId;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Where and how talking to the peer failed, for log lines.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Failure {
    pub(crate) source: &'static str,
    pub(crate) action: &'static str,
}

/// PeerStatus tracks whether the connection with a peer is working. It is shared by every
/// sender and reader of that peer; each success activates it and each failure deactivates it,
/// but only the transitions are logged loudly.
pub(crate) struct PeerStatus {
    logger: slog::Logger,
    id: PeerId,
    inner: Mutex<Inner>,
}

struct Inner {
    active: bool,
    since: Option<DateTime<Utc>>,
    // Whether the "sending buffer is full" warning was already logged in this active period.
    drop_warned: bool,
}

impl PeerStatus {
    pub(crate) fn new(logger: slog::Logger, id: PeerId) -> Self {
        PeerStatus {
            logger,
            id,
            inner: Mutex::new(Inner {
                active: false,
                since: None,
                drop_warned: false,
            }),
        }
    }

    pub(crate) fn activate(&self) {
        let mut inner = self.inner.lock().expect("PeerStatus.activate() mutex guard poison");
        if !inner.active {
            slog::info!(self.logger, "The connection with {} became active", self.id);
            inner.active = true;
            inner.since = Some(Utc::now());
            inner.drop_warned = false;
        }
    }

    pub(crate) fn deactivate(&self, failure: Failure, reason: &str) {
        let mut inner = self.inner.lock().expect("PeerStatus.deactivate() mutex guard poison");
        if inner.active {
            slog::error!(
                self.logger,
                "Failed to {} {} on {} ({})",
                failure.action,
                self.id,
                failure.source,
                reason
            );
            slog::info!(self.logger, "The connection with {} became inactive", self.id);
            inner.active = false;
            inner.since = None;
            return;
        }

        slog::debug!(
            self.logger,
            "Failed to {} {} on {} ({})",
            failure.action,
            self.id,
            failure.source,
            reason
        );
    }

    pub(crate) fn is_active(&self) -> bool {
        self.inner.lock().expect("PeerStatus.is_active() mutex guard poison").active
    }

    pub(crate) fn active_since(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().expect("PeerStatus.active_since() mutex guard poison").since
    }

    /// Returns true at most once per active period: the first time a message is dropped while
    /// the peer looks healthy. Later drops are only worth a debug line.
    pub(crate) fn should_warn_drop(&self) -> bool {
        let mut inner = self.inner.lock().expect("PeerStatus.should_warn_drop() mutex guard poison");
        if inner.active && !inner.drop_warned {
            inner.drop_warned = true;
            return true;
        }
        false
    }
}
