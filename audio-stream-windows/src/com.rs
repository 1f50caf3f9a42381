//! Per-thread COM apartment management.
//!
//! Engine polling threads are spawned by the core crate, which knows
//! nothing about COM, so every WASAPI entry point calls `ensure_mta` first.
//! The apartment is entered once per thread and left when the thread exits.

use std::cell::RefCell;

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::{CoInitializeEx, CoTaskMemFree, CoUninitialize, COINIT_MULTITHREADED};

/// Membership in the multithreaded apartment, left on drop.
pub struct Apartment {
    owned: bool,
}

impl Apartment {
    /// Enter the MTA on the calling thread.
    ///
    /// A thread already in a single-threaded apartment keeps it; COM
    /// objects created there still work, they just are not uninitialized
    /// by this guard.
    pub fn enter_mta() -> windows::core::Result<Self> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            log::debug!("thread already in a single-threaded apartment");
            return Ok(Self { owned: false });
        }
        hr.ok()?;
        Ok(Self { owned: true })
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

thread_local! {
    static APARTMENT: RefCell<Option<Apartment>> = const { RefCell::new(None) };
}

/// Make sure the calling thread has joined a COM apartment.
pub fn ensure_mta() -> windows::core::Result<()> {
    APARTMENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(Apartment::enter_mta()?);
        }
        Ok(())
    })
}

/// Owns a `CoTaskMemAlloc`ed pointer returned by a COM call.
pub(crate) struct CoTaskMem<T>(pub(crate) *mut T);

impl<T> CoTaskMem<T> {
    pub(crate) fn as_ptr(&self) -> *const T {
        self.0
    }
}

impl<T> Drop for CoTaskMem<T> {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { CoTaskMemFree(Some(self.0 as *const _)) };
        }
    }
}
