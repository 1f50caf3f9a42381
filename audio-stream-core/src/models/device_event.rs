use serde::{Deserialize, Serialize};

/// Endpoint state bits as reported by the OS device layer.
pub const DEVICE_STATE_ACTIVE: u32 = 0x1;
pub const DEVICE_STATE_DISABLED: u32 = 0x2;
pub const DEVICE_STATE_NOTPRESENT: u32 = 0x4;
pub const DEVICE_STATE_UNPLUGGED: u32 = 0x8;

/// Hot-plug and property events delivered to notification subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEvent {
    Enabled,
    Disabled,
    Connected,
    Disconnected,
    NotPresent,
    PropertyChanged,
    Unknown,
}

impl DeviceEvent {
    /// Maps a raw endpoint state to the event it represents.
    pub fn from_state_bits(state: u32) -> Self {
        match state {
            DEVICE_STATE_ACTIVE => Self::Enabled,
            DEVICE_STATE_DISABLED => Self::Disabled,
            DEVICE_STATE_NOTPRESENT => Self::NotPresent,
            DEVICE_STATE_UNPLUGGED => Self::Disconnected,
            _ => Self::Unknown,
        }
    }
}

/// Endpoint volume, delivered on volume-change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub muted: bool,
    /// Scalar master volume, 0.0–1.0.
    pub master_volume: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_bits_map_to_events() {
        assert_eq!(DeviceEvent::from_state_bits(DEVICE_STATE_ACTIVE), DeviceEvent::Enabled);
        assert_eq!(DeviceEvent::from_state_bits(DEVICE_STATE_DISABLED), DeviceEvent::Disabled);
        assert_eq!(DeviceEvent::from_state_bits(DEVICE_STATE_NOTPRESENT), DeviceEvent::NotPresent);
        assert_eq!(DeviceEvent::from_state_bits(DEVICE_STATE_UNPLUGGED), DeviceEvent::Disconnected);
        assert_eq!(DeviceEvent::from_state_bits(0x10), DeviceEvent::Unknown);
        assert_eq!(DeviceEvent::from_state_bits(0), DeviceEvent::Unknown);
    }

    #[test]
    fn events_serialize_as_snake_case() {
        let json = serde_json::to_string(&DeviceEvent::PropertyChanged).unwrap();
        assert_eq!(json, "\"property_changed\"");
        let parsed: DeviceEvent = serde_json::from_str("\"not_present\"").unwrap();
        assert_eq!(parsed, DeviceEvent::NotPresent);
    }
}
