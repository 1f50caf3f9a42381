//! `IMMNotificationClient` bridge into a `DeviceNotificationListener`.

use std::sync::Arc;

use windows::core::{Result as WinResult, PCWSTR};
use windows_core::implement;
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::Media::Audio::{
    EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient, IMMNotificationClient_Impl, DEVICE_STATE,
};

use audio_stream_core::models::error::InitError;
use audio_stream_core::traits::device_listener::DeviceNotificationListener;

use crate::endpoint_locator::{direction_of, pcwstr_to_string, EndpointLocator};

#[implement(IMMNotificationClient)]
struct NotificationClient {
    listener: Arc<dyn DeviceNotificationListener>,
}

impl IMMNotificationClient_Impl for NotificationClient_Impl {
    fn OnDeviceStateChanged(&self, pwstrdeviceid: &PCWSTR, dwnewstate: DEVICE_STATE) -> WinResult<()> {
        if let Some(id) = pcwstr_to_string(pwstrdeviceid) {
            self.listener.on_device_state_changed(&id, dwnewstate.0);
        }
        Ok(())
    }

    fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> WinResult<()> {
        if let Some(id) = pcwstr_to_string(pwstrdeviceid) {
            self.listener.on_device_added(&id);
        }
        Ok(())
    }

    fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> WinResult<()> {
        if let Some(id) = pcwstr_to_string(pwstrdeviceid) {
            self.listener.on_device_removed(&id);
        }
        Ok(())
    }

    fn OnDefaultDeviceChanged(&self, flow: EDataFlow, _role: ERole, pwstrdefaultdeviceid: &PCWSTR) -> WinResult<()> {
        if let Some(direction) = direction_of(flow) {
            let id = pcwstr_to_string(pwstrdefaultdeviceid);
            self.listener.on_default_device_changed(direction, id.as_deref());
        }
        Ok(())
    }

    fn OnPropertyValueChanged(&self, pwstrdeviceid: &PCWSTR, _key: &PROPERTYKEY) -> WinResult<()> {
        if let Some(id) = pcwstr_to_string(pwstrdeviceid) {
            self.listener.on_property_value_changed(&id);
        }
        Ok(())
    }
}

/// Live registration of a device listener with the OS.
///
/// Callbacks arrive on an OS thread. Unregisters on drop.
pub struct DeviceNotificationRegistration {
    enumerator: IMMDeviceEnumerator,
    client: IMMNotificationClient,
}

// SAFETY: Both interfaces live in the MTA; see `WasapiEndpoint`.
unsafe impl Send for DeviceNotificationRegistration {}

impl DeviceNotificationRegistration {
    pub fn register(
        locator: &EndpointLocator,
        listener: Arc<dyn DeviceNotificationListener>,
    ) -> Result<Self, InitError> {
        let enumerator = locator.enumerator().clone();
        let client: IMMNotificationClient = NotificationClient { listener }.into();
        unsafe { enumerator.RegisterEndpointNotificationCallback(&client) }
            .map_err(|e| InitError::ServiceUnavailable(format!("RegisterEndpointNotificationCallback failed: {}", e)))?;
        log::debug!("device notifications registered");
        Ok(Self { enumerator, client })
    }
}

impl Drop for DeviceNotificationRegistration {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.enumerator.UnregisterEndpointNotificationCallback(&self.client) } {
            log::warn!("failed to unregister device notifications: {}", e);
        }
    }
}
