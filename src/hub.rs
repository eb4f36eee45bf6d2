use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Default)]
struct HubInner {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<()>>>,
    next_id: AtomicU64,
}

impl HubInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<()>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fan-out point for "something changed" signals.
///
/// Each subscriber holds at most one pending notification; broadcasts that
/// arrive while one is pending are dropped.
#[derive(Debug, Clone, Default)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

/// What ended a wait on a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Changed,
    Closed,
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<()>,
    hub: Weak<HubInner>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel::<()>(1);
        self.inner.registry().insert(id, sender);
        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.inner.registry().remove(&subscription.id);
    }

    /// Signals every subscriber without blocking. Returns how many received
    /// a fresh notification (subscribers with one already pending are skipped).
    pub fn broadcast(&self) -> usize {
        let mut registry = self.inner.registry();
        let mut delivered = 0;
        registry.retain(|id, sender| match sender.try_send(()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => {
                tracing::debug!(subscriber = id, "dropping closed subscriber");
                false
            }
        });
        tracing::debug!(delivered, subscribers = registry.len(), "change broadcast");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry().len()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next notification. Returns `false` once the subscription
    /// has been removed from the hub or the hub is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.recv().await.is_some()
    }

    /// Consumes a pending notification without waiting.
    pub fn try_changed(&mut self) -> bool {
        self.receiver.try_recv().is_ok()
    }

    /// One turn of a live-update connection: resolves on a change or when
    /// `closed` (the client's disconnect signal) completes, whichever is first.
    pub async fn next_or_closed<F>(&mut self, closed: F) -> Update
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            changed = self.receiver.recv() => {
                if changed.is_some() { Update::Changed } else { Update::Closed }
            }
            _ = closed => Update::Closed,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.registry().remove(&self.id);
        }
    }
}
