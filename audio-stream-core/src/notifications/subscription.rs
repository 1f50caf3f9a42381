use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// Identifier returned by every `subscribe_*` call.
pub type SubscriptionId = u64;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonically increasing id, never 0 and never reused.
pub(crate) fn next_subscription_id() -> SubscriptionId {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Run one subscriber callback, containing any panic it raises.
///
/// Returns false if the callback panicked.
pub(crate) fn invoke_isolated(id: SubscriptionId, callback: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("subscriber {} panicked during dispatch", id);
            false
        }
    }
}

/// Hubs that can drop a subscription by id.
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Unsubscribes when dropped.
///
/// Holds the hub weakly, so an outstanding guard never keeps a hub alive.
pub struct SubscriptionGuard {
    hub: Weak<dyn Unsubscribe>,
    id: SubscriptionId,
}

impl SubscriptionGuard {
    pub fn new(hub: Weak<dyn Unsubscribe>, id: SubscriptionId) -> Self {
        Self { hub, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_nonzero() {
        let ids: Vec<SubscriptionId> = (0..1000).map(|_| next_subscription_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.iter().all(|&id| id != 0));
    }

    #[test]
    fn panics_are_contained() {
        assert!(invoke_isolated(1, || {}));
        assert!(!invoke_isolated(2, || panic!("subscriber failure")));
    }
}
