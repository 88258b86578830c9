//! One-shot completion signal with several producers.
//!
//! The first call to [`CompletionSignal::complete`] wins; every later call is a no-op that
//! returns `false`. Consumers either poll [`is_completed`](CompletionSignal::is_completed) or
//! await [`wait`](CompletionSignal::wait).
//!
//! # Example
//!
//! ```rust,ignore
//! let signal = CompletionSignal::new();
//! let timer = signal.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(fallback).await;
//!     timer.complete(TeardownTrigger::FallbackTimer);
//! });
//! // elsewhere, on media end:
//! if signal.complete(TeardownTrigger::MediaEnded) { stop_session().await; }
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

/// What ended the wait for the spoken summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownTrigger {
    /// Remote audio playback ended
    MediaEnded,
    /// The fallback delay elapsed
    FallbackTimer,
    /// The session stopped for another reason first
    Cancelled,
}

impl fmt::Display for TeardownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownTrigger::MediaEnded => write!(f, "media_ended"),
            TeardownTrigger::FallbackTimer => write!(f, "fallback_timer"),
            TeardownTrigger::Cancelled => write!(f, "cancelled"),
        }
    }
}

struct Inner<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

/// Cloneable one-shot signal; all clones share the same state.
pub struct CompletionSignal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> CompletionSignal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Complete with `value`. Returns `true` only for the first writer.
    pub fn complete(&self, value: T) -> bool {
        {
            let mut slot = self.inner.value.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        self.inner.notify.notify_waiters();
        true
    }

    pub fn is_completed(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    /// The winning value, if any.
    pub fn value(&self) -> Option<T> {
        self.inner.value.lock().clone()
    }

    /// Wait for the winning value.
    pub async fn wait(&self) -> T {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.value() {
                return value;
            }
            notified.await;
        }
    }
}

impl<T: Clone> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CompletionSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_writer_wins() {
        let signal = CompletionSignal::new();
        let other = signal.clone();

        assert!(!signal.is_completed());
        assert!(signal.complete(TeardownTrigger::MediaEnded));
        assert!(!other.complete(TeardownTrigger::FallbackTimer));

        assert_eq!(other.value(), Some(TeardownTrigger::MediaEnded));
    }

    #[tokio::test]
    async fn test_wait_receives_value() {
        let signal = CompletionSignal::new();
        let producer = signal.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.complete(TeardownTrigger::FallbackTimer);
        });

        let value = tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .unwrap();
        assert_eq!(value, TeardownTrigger::FallbackTimer);
    }

    #[tokio::test]
    async fn test_wait_after_completion_returns_immediately() {
        let signal = CompletionSignal::new();
        signal.complete(TeardownTrigger::Cancelled);
        assert_eq!(signal.wait().await, TeardownTrigger::Cancelled);
    }

    #[tokio::test]
    async fn test_racing_producers_single_winner() {
        let signal = CompletionSignal::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let signal = signal.clone();
            handles.push(tokio::spawn(async move { signal.complete(i) }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
