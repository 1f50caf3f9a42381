use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::models::device_event::DeviceEvent;
use crate::models::frame::Direction;
use crate::traits::device_listener::DeviceNotificationListener;

use super::subscription::{invoke_isolated, next_subscription_id, SubscriptionGuard, SubscriptionId, Unsubscribe};

/// Callback for events on one specific device.
pub type DeviceEventCallback = Arc<dyn Fn(DeviceEvent) + Send + Sync + 'static>;

/// Callback for events on any device.
pub type GlobalDeviceEventCallback = Arc<dyn Fn(&str, DeviceEvent) + Send + Sync + 'static>;

#[derive(Default)]
struct Subscriptions {
    /// device id → subscriptions scoped to it
    by_device: HashMap<String, HashSet<SubscriptionId>>,
    device: HashMap<SubscriptionId, (String, DeviceEventCallback)>,
    global: HashMap<SubscriptionId, GlobalDeviceEventCallback>,
}

/// Fans device hot-plug events out to subscribers.
///
/// Subscriptions can be added or removed from any thread while
/// `notify_change` dispatches from the OS notification thread. Dispatch
/// snapshots the matching callbacks under a read lock and invokes them
/// after releasing it, so callbacks may themselves subscribe or
/// unsubscribe. A panicking callback does not stop the remaining ones.
#[derive(Default)]
pub struct NotificationHub {
    subscriptions: RwLock<Subscriptions>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_to_device_events<F>(&self, device_id: &str, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceEvent) + Send + Sync + 'static,
    {
        let id = next_subscription_id();
        let mut subs = self.subscriptions.write();
        subs.by_device.entry(device_id.to_string()).or_default().insert(id);
        subs.device.insert(id, (device_id.to_string(), Arc::new(callback)));
        id
    }

    pub fn subscribe_to_global_events<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, DeviceEvent) + Send + Sync + 'static,
    {
        let id = next_subscription_id();
        self.subscriptions.write().global.insert(id, Arc::new(callback));
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if subs.global.remove(&id).is_some() {
            return;
        }
        if let Some((device_id, _)) = subs.device.remove(&id) {
            if let Some(ids) = subs.by_device.get_mut(&device_id) {
                ids.remove(&id);
                if ids.is_empty() {
                    subs.by_device.remove(&device_id);
                }
            }
        }
    }

    /// Subscription that is removed when the returned guard drops.
    pub fn guard(self: &Arc<Self>, id: SubscriptionId) -> SubscriptionGuard {
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        SubscriptionGuard::new(weak, id)
    }

    /// Deliver `event` to every subscriber of `device_id`, then to every
    /// global subscriber. Each live subscription runs exactly once.
    pub fn notify_change(&self, device_id: &str, event: DeviceEvent) {
        let (device_callbacks, global_callbacks) = {
            let subs = self.subscriptions.read();
            let device_callbacks: Vec<(SubscriptionId, DeviceEventCallback)> = subs
                .by_device
                .get(device_id)
                .into_iter()
                .flatten()
                .filter_map(|id| subs.device.get(id).map(|(_, cb)| (*id, Arc::clone(cb))))
                .collect();
            let global_callbacks: Vec<(SubscriptionId, GlobalDeviceEventCallback)> = subs
                .global
                .iter()
                .map(|(id, cb)| (*id, Arc::clone(cb)))
                .collect();
            (device_callbacks, global_callbacks)
        };

        log::debug!(
            "device {} {:?}: {} device, {} global subscribers",
            device_id,
            event,
            device_callbacks.len(),
            global_callbacks.len()
        );

        for (id, callback) in device_callbacks {
            invoke_isolated(id, || callback(event));
        }
        for (id, callback) in global_callbacks {
            invoke_isolated(id, || callback(device_id, event));
        }
    }

    /// Live subscriptions, device-scoped and global.
    pub fn subscription_count(&self) -> usize {
        let subs = self.subscriptions.read();
        subs.device.len() + subs.global.len()
    }
}

impl Unsubscribe for NotificationHub {
    fn unsubscribe(&self, id: SubscriptionId) {
        NotificationHub::unsubscribe(self, id);
    }
}

impl DeviceNotificationListener for NotificationHub {
    fn on_default_device_changed(&self, _direction: Direction, device_id: Option<&str>) {
        if let Some(device_id) = device_id {
            self.notify_change(device_id, DeviceEvent::PropertyChanged);
        }
    }

    fn on_device_added(&self, device_id: &str) {
        self.notify_change(device_id, DeviceEvent::Connected);
    }

    fn on_device_removed(&self, device_id: &str) {
        self.notify_change(device_id, DeviceEvent::Disconnected);
    }

    fn on_device_state_changed(&self, device_id: &str, state: u32) {
        self.notify_change(device_id, DeviceEvent::from_state_bits(state));
    }

    fn on_property_value_changed(&self, device_id: &str) {
        self.notify_change(device_id, DeviceEvent::PropertyChanged);
    }
}
