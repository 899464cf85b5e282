//! Arrival-event waits on Win32 event handles

use std::time::Duration;
use tracing::trace;
use windows::Win32::Foundation::{HANDLE, WAIT_EVENT, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Threading::{INFINITE, WaitForMultipleObjects, WaitForSingleObject};

use crate::error::{HResult, NativeResult};
use crate::native::{WaitResult, Waitable};

/// Most handles a single `WaitForMultipleObjects` call accepts.
const MAXIMUM_WAIT_OBJECTS: usize = 64;

/// Non-owning view of a Win32 event handle.
///
/// The handle belongs to the subscription that produced it and is closed by
/// unsubscribing, never by this type.
#[derive(Debug)]
pub struct EventWaitable {
    handle: HANDLE,
}

impl EventWaitable {
    /// Wrap a raw waitable handle value.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid event handle that stays open for as long as the
    /// returned value is used.
    pub unsafe fn from_raw(raw: isize) -> Self {
        Self { handle: HANDLE(raw as *mut std::ffi::c_void) }
    }

    /// Raw handle value, as the device SDK expects it back on unsubscribe.
    pub fn as_raw(&self) -> isize {
        self.handle.0 as isize
    }
}

fn timeout_ms(timeout: Option<Duration>) -> u32 {
    match timeout {
        // INFINITE is u32::MAX, so finite waits stop one short of it.
        Some(t) => t.as_millis().min((INFINITE - 1) as u128) as u32,
        None => INFINITE,
    }
}

fn wait_result(result: WAIT_EVENT, count: u32) -> NativeResult<WaitResult> {
    if result.0 >= WAIT_OBJECT_0.0 && result.0 < WAIT_OBJECT_0.0 + count {
        trace!("Arrival event signaled");
        Ok(WaitResult::Signaled)
    } else if result == WAIT_TIMEOUT {
        trace!("Arrival wait timed out");
        Ok(WaitResult::TimedOut)
    } else {
        Err(HResult::from(windows::core::Error::from_thread()))
    }
}

impl Waitable for EventWaitable {
    fn wait(&self, timeout: Option<Duration>) -> NativeResult<WaitResult> {
        let result = unsafe { WaitForSingleObject(self.handle, timeout_ms(timeout)) };
        wait_result(result, 1)
    }

    fn wait_all(waitables: &[&Self], timeout: Option<Duration>) -> NativeResult<WaitResult> {
        if waitables.is_empty() {
            return Ok(WaitResult::Signaled);
        }
        if waitables.len() > MAXIMUM_WAIT_OBJECTS {
            return Err(HResult::E_INVALIDARG);
        }

        let handles: Vec<HANDLE> = waitables.iter().map(|w| w.handle).collect();
        let result = unsafe { WaitForMultipleObjects(&handles, true, timeout_ms(timeout)) };
        wait_result(result, handles.len() as u32)
    }
}

// SAFETY: Win32 event handles are kernel objects usable from any thread.
unsafe impl Send for EventWaitable {}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{CreateEventW, SetEvent};
    use windows::core::PCWSTR;

    fn auto_reset_event() -> HANDLE {
        unsafe { CreateEventW(None, false, false, PCWSTR::null()) }.expect("CreateEventW failed")
    }

    #[test]
    fn finite_timeouts_stay_below_infinite() {
        assert_eq!(timeout_ms(None), INFINITE);
        assert_eq!(timeout_ms(Some(Duration::from_millis(25))), 25);
        assert_eq!(timeout_ms(Some(Duration::MAX)), INFINITE - 1);
    }

    #[test]
    fn unsignaled_event_times_out() {
        let handle = auto_reset_event();
        let event = unsafe { EventWaitable::from_raw(handle.0 as isize) };

        assert_eq!(event.wait(Some(Duration::from_millis(10))), Ok(WaitResult::TimedOut));
        unsafe { CloseHandle(handle) }.expect("CloseHandle failed");
    }

    #[test]
    fn wait_all_needs_every_event_signaled() {
        let first = auto_reset_event();
        let second = auto_reset_event();
        let a = unsafe { EventWaitable::from_raw(first.0 as isize) };
        let b = unsafe { EventWaitable::from_raw(second.0 as isize) };

        unsafe { SetEvent(first) }.expect("SetEvent failed");
        let timeout = Some(Duration::from_millis(10));
        assert_eq!(EventWaitable::wait_all(&[&a, &b], timeout), Ok(WaitResult::TimedOut));

        unsafe { SetEvent(second) }.expect("SetEvent failed");
        assert_eq!(EventWaitable::wait_all(&[&a, &b], timeout), Ok(WaitResult::Signaled));

        unsafe {
            CloseHandle(first).expect("CloseHandle failed");
            CloseHandle(second).expect("CloseHandle failed");
        }
    }
}
