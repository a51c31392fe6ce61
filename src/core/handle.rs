//! Scoped ownership of native OS handles.

use std::fmt;

use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};

/// A safe wrapper around a native Windows handle.
///
/// Closes the handle on drop unless it was created with `owns_handle = false` (the
/// "pseudo-handle" case, e.g. `GetCurrentProcess()`, which must never be closed).
/// Shared across region enumerators, memory views, and scoped protection guards via `Arc`.
pub struct Handle {
    pub(crate) native: HANDLE,
    owns: bool,
}

impl Handle {
    /// Wraps a native handle. `owns` determines whether `Drop` closes it.
    pub(crate) fn new(native: HANDLE, owns: bool) -> Self {
        Self { native, owns }
    }

    pub(crate) fn is_valid(&self) -> bool {
        !self.native.is_invalid() && self.native != INVALID_HANDLE_VALUE
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("native", &self.native.0)
            .field("owns", &self.owns)
            .finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.owns && self.is_valid() {
            log::trace!("closing handle {:#x}", self.native.0 as usize);
            unsafe {
                let _ = CloseHandle(self.native);
            }
        }
    }
}

// Handles are freely shared across threads for parallel region scans; the Win32 API itself
// treats a HANDLE as thread-safe for the read-only operations this crate performs on it.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}
