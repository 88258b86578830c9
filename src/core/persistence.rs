//! Fire-and-forget relay of finalized transcript lines to backend storage.
//!
//! Sends are rate-limited per `(session, role)`: a line arriving within the cooldown window of
//! the previous accepted line for the same pair is dropped, not queued. Failures never reach the
//! caller; they are logged and counted in [`RelayStats`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::core::backend::{ConversationBackend, ConversationMessage};
use crate::core::realtime::TranscriptRole;

/// What happened to a relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Post spawned
    Dispatched,
    /// Dropped inside the cooldown window
    Throttled,
    /// No session or empty content
    Skipped,
}

/// Snapshot of relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sent: u64,
    pub throttled: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

/// Rate-limited persistence of transcript lines.
pub struct PersistenceRelay {
    backend: Arc<dyn ConversationBackend>,
    cooldown: Duration,
    ledger: Mutex<HashMap<(String, TranscriptRole), Instant>>,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl PersistenceRelay {
    pub fn new(backend: Arc<dyn ConversationBackend>, cooldown: Duration) -> Self {
        Self {
            backend,
            cooldown,
            ledger: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Queue `content` for storage unless throttled. Never blocks on the network.
    pub fn relay(
        &self,
        session_id: Option<&str>,
        role: TranscriptRole,
        content: &str,
    ) -> RelayOutcome {
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return RelayOutcome::Skipped;
        };
        if content.is_empty() {
            return RelayOutcome::Skipped;
        }

        if !self.admit(session_id, role) {
            self.counters.throttled.fetch_add(1, Ordering::Relaxed);
            warn!(
                session_id = %session_id,
                role = %role,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Persistence throttled, message dropped"
            );
            return RelayOutcome::Throttled;
        }

        let message = ConversationMessage {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
        };
        let backend = self.backend.clone();
        let counters = self.counters.clone();

        self.tracker.spawn(async move {
            match backend.save_message(&message).await {
                Ok(()) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                    debug!(session_id = %message.session_id, role = %message.role, "Message persisted");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        session_id = %message.session_id,
                        role = %message.role,
                        error = %e,
                        "Failed to save message"
                    );
                }
            }
        });

        RelayOutcome::Dispatched
    }

    fn admit(&self, session_id: &str, role: TranscriptRole) -> bool {
        let now = Instant::now();
        let mut ledger = self.ledger.lock();
        let key = (session_id.to_string(), role);

        if let Some(last) = ledger.get(&key)
            && now.duration_since(*last) < self.cooldown
        {
            return false;
        }
        ledger.insert(key, now);
        true
    }

    /// Wait for every dispatched post to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            sent: self.counters.sent.load(Ordering::Relaxed),
            throttled: self.counters.throttled.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl std::fmt::Debug for PersistenceRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceRelay")
            .field("cooldown", &self.cooldown)
            .field("stats", &self.stats())
            .finish()
    }
}
