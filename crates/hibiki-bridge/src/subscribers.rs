//! Subscriber registry - fan-out of inbound notifications.
//!
//! Listeners run synchronously on the inbound reader task, in registration
//! order. A slow listener delays every notification behind it, so listeners
//! must not block; hand work off to a channel instead.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type Listener<N> = Arc<dyn Fn(&N) + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

pub struct SubscriberRegistry<N> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<N>)>>,
}

impl<N> Default for SubscriberRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> SubscriberRegistry<N> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Append a listener. The same closure may be added more than once.
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&N) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        tracing::debug!(%id, "Listener registered");
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        match listeners.iter().position(|(lid, _)| *lid == id) {
            Some(pos) => {
                listeners.remove(pos);
                tracing::debug!(%id, "Listener removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `notification` to every listener registered at call time.
    ///
    /// The lock is held only to copy the list. A panicking listener is
    /// logged and skipped. Returns how many listeners completed normally.
    pub fn dispatch(&self, notification: &N) -> usize {
        let snapshot: Vec<(ListenerId, Listener<N>)> = self.lock().clone();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(notification))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(%id, panic = %panic_message(&*payload), "Listener panicked");
                }
            }
        }
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener<N>)>> {
        // Listeners never run under the lock, so a poisoned list is still consistent.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}
