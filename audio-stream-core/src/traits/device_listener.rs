use crate::models::frame::Direction;

/// Receiver for OS-level endpoint notifications.
///
/// Platform notification clients forward into this trait; the core never
/// registers with the OS itself. Called on the OS notification thread.
pub trait DeviceNotificationListener: Send + Sync {
    /// The default endpoint for `direction` changed. `device_id` is None
    /// when no endpoint is left for that role.
    fn on_default_device_changed(&self, direction: Direction, device_id: Option<&str>);

    fn on_device_added(&self, device_id: &str);

    fn on_device_removed(&self, device_id: &str);

    /// `state` holds the raw endpoint state bits.
    fn on_device_state_changed(&self, device_id: &str, state: u32);

    fn on_property_value_changed(&self, device_id: &str);
}
