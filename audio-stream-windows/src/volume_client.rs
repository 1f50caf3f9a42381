//! `IAudioEndpointVolumeCallback` bridge into a `VolumeNotificationHub`.

use std::sync::Arc;

use windows::core::Result as WinResult;
use windows_core::implement;
use windows::Win32::Media::Audio::Endpoints::{
    IAudioEndpointVolume, IAudioEndpointVolumeCallback, IAudioEndpointVolumeCallback_Impl,
};
use windows::Win32::Media::Audio::AUDIO_VOLUME_NOTIFICATION_DATA;
use windows::Win32::System::Com::CLSCTX_ALL;

use audio_stream_core::models::device_event::VolumeInfo;
use audio_stream_core::models::error::InitError;
use audio_stream_core::notifications::volume::VolumeNotificationHub;

use crate::com;
use crate::wasapi_endpoint::WasapiEndpoint;

#[implement(IAudioEndpointVolumeCallback)]
struct VolumeCallback {
    hub: Arc<VolumeNotificationHub>,
}

impl IAudioEndpointVolumeCallback_Impl for VolumeCallback_Impl {
    fn OnNotify(&self, pnotify: *mut AUDIO_VOLUME_NOTIFICATION_DATA) -> WinResult<()> {
        if pnotify.is_null() {
            return Ok(());
        }
        // SAFETY: Non-null and valid for the duration of the callback.
        let data = unsafe { &*pnotify };
        self.hub.notify(VolumeInfo {
            muted: data.bMuted.as_bool(),
            master_volume: data.fMasterVolume,
        });
        Ok(())
    }
}

/// Live volume-change registration on one endpoint. Unregisters on drop.
pub struct VolumeNotificationRegistration {
    volume: IAudioEndpointVolume,
    callback: IAudioEndpointVolumeCallback,
}

// SAFETY: Both interfaces live in the MTA; see `WasapiEndpoint`.
unsafe impl Send for VolumeNotificationRegistration {}

impl VolumeNotificationRegistration {
    pub fn register(endpoint: &WasapiEndpoint, hub: Arc<VolumeNotificationHub>) -> Result<Self, InitError> {
        com::ensure_mta().map_err(|e| InitError::ActivationFailed(format!("CoInitializeEx failed: {}", e)))?;
        let volume: IAudioEndpointVolume = unsafe { endpoint.device().Activate(CLSCTX_ALL, None) }
            .map_err(|e| InitError::ServiceUnavailable(format!("IAudioEndpointVolume: {}", e)))?;
        let callback: IAudioEndpointVolumeCallback = VolumeCallback { hub }.into();
        unsafe { volume.RegisterControlChangeNotify(&callback) }
            .map_err(|e| InitError::ServiceUnavailable(format!("RegisterControlChangeNotify failed: {}", e)))?;
        Ok(Self { volume, callback })
    }

    /// Current endpoint volume.
    pub fn current(&self) -> Result<VolumeInfo, InitError> {
        let (muted, master_volume) = unsafe { (self.volume.GetMute(), self.volume.GetMasterVolumeLevelScalar()) };
        let muted = muted.map_err(|e| InitError::ServiceUnavailable(format!("GetMute failed: {}", e)))?;
        let master_volume =
            master_volume.map_err(|e| InitError::ServiceUnavailable(format!("GetMasterVolumeLevelScalar failed: {}", e)))?;
        Ok(VolumeInfo {
            muted: muted.as_bool(),
            master_volume,
        })
    }
}

impl Drop for VolumeNotificationRegistration {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.volume.UnregisterControlChangeNotify(&self.callback) } {
            log::warn!("failed to unregister volume notifications: {}", e);
        }
    }
}
