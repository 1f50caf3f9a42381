//! Endpoint lookup via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to resolve the default endpoint for a
//! direction, open an endpoint by id, and list active endpoints with their
//! friendly names.

use windows::core::{Interface, PCWSTR, PWSTR};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, EDataFlow, IMMDevice, IMMDeviceEnumerator, IMMEndpoint, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM_READ};
use windows::Win32::System::Variant::VT_LPWSTR;

use audio_stream_core::models::error::InitError;
use audio_stream_core::models::frame::Direction;

use crate::com;
use crate::wasapi_endpoint::WasapiEndpoint;

/// An active endpoint as listed by `EndpointLocator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub is_default: bool,
}

pub(crate) fn data_flow(direction: Direction) -> EDataFlow {
    match direction {
        Direction::Capture => eCapture,
        Direction::Render => eRender,
    }
}

pub(crate) fn direction_of(flow: EDataFlow) -> Option<Direction> {
    if flow == eCapture {
        Some(Direction::Capture)
    } else if flow == eRender {
        Some(Direction::Render)
    } else {
        None
    }
}

/// Take ownership of a COM-allocated wide string.
///
/// # Safety
/// `pwstr` must be null or a `CoTaskMemAlloc`ed, NUL-terminated string.
pub(crate) unsafe fn take_pwstr(pwstr: PWSTR) -> Option<String> {
    if pwstr.is_null() {
        return None;
    }
    let value = pwstr.to_string().ok();
    CoTaskMemFree(Some(pwstr.0 as *const _));
    value
}

/// Borrowed wide string from a notification callback.
pub(crate) fn pcwstr_to_string(value: &PCWSTR) -> Option<String> {
    if value.is_null() {
        return None;
    }
    unsafe { value.to_string().ok() }
}

/// Audio endpoint lookup using the Windows MMDevice API.
pub struct EndpointLocator {
    enumerator: IMMDeviceEnumerator,
}

// SAFETY: Created in the MTA; see `WasapiEndpoint`.
unsafe impl Send for EndpointLocator {}

impl EndpointLocator {
    /// Create a locator, joining the MTA on the calling thread if needed.
    pub fn new() -> Result<Self, InitError> {
        com::ensure_mta().map_err(|e| InitError::ActivationFailed(format!("CoInitializeEx failed: {}", e)))?;
        let enumerator: IMMDeviceEnumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(|e| InitError::ActivationFailed(format!("failed to create enumerator: {}", e)))?;
        Ok(Self { enumerator })
    }

    pub(crate) fn enumerator(&self) -> &IMMDeviceEnumerator {
        &self.enumerator
    }

    /// The console-role default endpoint for `direction`.
    pub fn default_endpoint(&self, direction: Direction) -> Result<WasapiEndpoint, InitError> {
        let device = unsafe { self.enumerator.GetDefaultAudioEndpoint(data_flow(direction), eConsole) }
            .map_err(|e| InitError::ActivationFailed(format!("no default {} endpoint: {}", direction, e)))?;
        let id = device_id(&device)?;
        log::debug!("default {} endpoint: {}", direction, id);
        Ok(WasapiEndpoint::new(device, id, direction))
    }

    pub fn endpoint_by_id(&self, id: &str) -> Result<WasapiEndpoint, InitError> {
        let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        let device = unsafe { self.enumerator.GetDevice(PCWSTR(wide.as_ptr())) }
            .map_err(|e| InitError::ActivationFailed(format!("endpoint {} not found: {}", id, e)))?;

        let flow = unsafe { device.cast::<IMMEndpoint>().and_then(|endpoint| endpoint.GetDataFlow()) }
            .map_err(|e| InitError::ActivationFailed(format!("GetDataFlow failed: {}", e)))?;
        let direction = direction_of(flow)
            .ok_or_else(|| InitError::ActivationFailed(format!("endpoint {} has no single direction", id)))?;
        Ok(WasapiEndpoint::new(device, id.to_string(), direction))
    }

    /// Active endpoints for `direction`.
    pub fn list_endpoints(&self, direction: Direction) -> Result<Vec<EndpointInfo>, InitError> {
        let flow = data_flow(direction);
        let collection = unsafe { self.enumerator.EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE) }
            .map_err(|e| InitError::ActivationFailed(format!("EnumAudioEndpoints failed: {}", e)))?;
        let count = unsafe { collection.GetCount() }
            .map_err(|e| InitError::ActivationFailed(format!("GetCount failed: {}", e)))?;

        let default_id = unsafe { self.enumerator.GetDefaultAudioEndpoint(flow, eConsole) }
            .ok()
            .and_then(|device| device_id(&device).ok());

        let mut endpoints = Vec::with_capacity(count as usize);
        for i in 0..count {
            let Ok(device) = (unsafe { collection.Item(i) }) else {
                continue;
            };
            let Ok(id) = device_id(&device) else {
                continue;
            };
            let name = friendly_name(&device).unwrap_or_else(|| format!("Endpoint {}", i));
            let is_default = default_id.as_deref() == Some(id.as_str());
            endpoints.push(EndpointInfo {
                id,
                name,
                direction,
                is_default,
            });
        }
        Ok(endpoints)
    }
}

fn device_id(device: &IMMDevice) -> Result<String, InitError> {
    let id = unsafe { device.GetId() }.map_err(|e| InitError::ActivationFailed(format!("GetId failed: {}", e)))?;
    unsafe { take_pwstr(id) }.ok_or_else(|| InitError::ActivationFailed("endpoint id is not valid UTF-16".into()))
}

/// Read `PKEY_Device_FriendlyName` from the device's property store.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store
            .GetValue(&PKEY_Device_FriendlyName as *const _ as *const _)
            .ok()?;

        let raw = &value.as_raw().Anonymous.Anonymous;
        if raw.vt != VT_LPWSTR.0 {
            return None;
        }
        // The union holds an LPWSTR for VT_LPWSTR; the variant frees it on drop.
        let pwsz = *(&raw.Anonymous as *const _ as *const *const u16);
        if pwsz.is_null() {
            return None;
        }
        PCWSTR(pwsz).to_string().ok()
    }
}
