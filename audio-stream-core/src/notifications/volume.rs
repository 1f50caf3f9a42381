use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::models::device_event::VolumeInfo;

use super::subscription::{invoke_isolated, next_subscription_id, SubscriptionGuard, SubscriptionId, Unsubscribe};

pub type VolumeCallback = Arc<dyn Fn(VolumeInfo) + Send + Sync + 'static>;

/// Fans endpoint volume changes out to subscribers.
#[derive(Default)]
pub struct VolumeNotificationHub {
    subscribers: RwLock<HashMap<SubscriptionId, VolumeCallback>>,
}

impl VolumeNotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_volume_changes<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(VolumeInfo) + Send + Sync + 'static,
    {
        let id = next_subscription_id();
        self.subscribers.write().insert(id, Arc::new(callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
    }

    pub fn guard(self: &Arc<Self>, id: SubscriptionId) -> SubscriptionGuard {
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        SubscriptionGuard::new(weak, id)
    }

    pub fn notify(&self, info: VolumeInfo) {
        let callbacks: Vec<(SubscriptionId, VolumeCallback)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        log::trace!(
            "volume {:.3} muted={} to {} subscribers",
            info.master_volume,
            info.muted,
            callbacks.len()
        );
        for (id, callback) in callbacks {
            invoke_isolated(id, || callback(info));
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Unsubscribe for VolumeNotificationHub {
    fn unsubscribe(&self, id: SubscriptionId) {
        VolumeNotificationHub::unsubscribe(self, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    #[test]
    fn subscribers_receive_volume_changes() {
        let hub = VolumeNotificationHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.subscribe_volume_changes(move |info| sink.lock().push(info));

        hub.notify(VolumeInfo { muted: false, master_volume: 0.5 });
        hub.notify(VolumeInfo { muted: true, master_volume: 0.25 });

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_relative_eq!(seen[0].master_volume, 0.5);
        assert!(seen[1].muted);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = VolumeNotificationHub::new();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let id = hub.subscribe_volume_changes(move |_| *sink.lock() += 1);
        hub.unsubscribe(id);
        hub.unsubscribe(id);

        hub.notify(VolumeInfo { muted: false, master_volume: 1.0 });
        assert_eq!(*seen.lock(), 0);
        assert_eq!(hub.subscription_count(), 0);
    }

    #[test]
    fn guard_outliving_hub_is_harmless() {
        let hub = Arc::new(VolumeNotificationHub::new());
        let guard = hub.guard(hub.subscribe_volume_changes(|_| {}));
        drop(hub);
        drop(guard);
    }
}
