//! In-process progress bus with per-subscriber queues.
//!
//! [`ProgressBus`] fans every published [`ProgressEvent`] out to each live
//! subscriber whose filter matches. Each subscriber owns an unbounded queue,
//! so a slow consumer delays only itself and never loses events. Events of
//! one run arrive in publish order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use auditflow_core::run_state::RunStatus;
use auditflow_core::types::RunId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// A coarse status update for one run.
///
/// Running events carry the line that caused them in `stdout`/`stderr`;
/// terminal events carry the full captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub run_id: RunId,
    pub progress: u8,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl ProgressEvent {
    /// A bare event with no message, error or output attached.
    pub fn new(run_id: RunId, progress: u8, status: RunStatus) -> Self {
        Self {
            run_id,
            progress,
            status,
            message: None,
            error: None,
            stdout: None,
            stderr: None,
        }
    }

    pub fn running(run_id: RunId, progress: u8) -> Self {
        Self::new(run_id, progress, RunStatus::Running)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// ProgressBus
// ---------------------------------------------------------------------------

struct Subscriber {
    filter: Option<RunId>,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl Subscriber {
    fn wants(&self, event: &ProgressEvent) -> bool {
        self.filter.map_or(true, |run_id| run_id == event.run_id)
    }
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, filter: Option<RunId>) -> (u64, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Subscriber { filter, tx });
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }
}

/// Publish/subscribe hub for [`ProgressEvent`]s.
///
/// Share it via `Arc<ProgressBus>`. Subscriptions hold only a weak
/// reference, so dropping the bus ends every subscription.
#[derive(Default)]
pub struct ProgressBus {
    registry: Arc<Registry>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Subscribers whose receiving side is gone are pruned. Publishing with
    /// no subscribers is a no-op.
    pub fn publish(&self, event: ProgressEvent) {
        let mut subscribers = self.registry.lock();
        subscribers.retain(|id, sub| {
            if !sub.wants(&event) || sub.tx.send(event.clone()).is_ok() {
                return true;
            }
            tracing::debug!(
                subscriber = *id,
                run_id = %event.run_id,
                "Dropping closed progress subscriber",
            );
            false
        });
    }

    /// Run `handler` for every matching event on a dedicated task.
    ///
    /// `run_id = None` subscribes to all runs. The handler stops receiving
    /// once the returned [`Subscription`] is dropped or
    /// [`unsubscribed`](Subscription::unsubscribe); events already queued
    /// at that point are still handled. Must be called inside a Tokio
    /// runtime.
    pub fn subscribe<F>(&self, run_id: Option<RunId>, mut handler: F) -> Subscription
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        let (id, mut rx) = self.registry.insert(run_id);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler(event);
            }
        });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Subscribe with a receiver instead of a callback.
    pub fn subscribe_channel(&self, run_id: Option<RunId>) -> ProgressReceiver {
        let (id, rx) = self.registry.insert(run_id);
        ProgressReceiver {
            rx,
            _subscription: Subscription {
                id,
                registry: Arc::downgrade(&self.registry),
            },
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

/// Handle for a callback subscription. Detaches on drop.
#[must_use = "dropping a Subscription detaches its handler immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Receiving side of [`ProgressBus::subscribe_channel`]. Detaches on drop.
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
    _subscription: Subscription,
}

impl ProgressReceiver {
    /// Next matching event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
