//! Scoped page-protection changes.

use std::sync::Arc;

use windows::Win32::System::Memory::VirtualProtectEx;

use crate::core::handle::Handle;
use crate::errors::{Error, Result};
use crate::memory::protection::ProtectionFlags;

/// Changes protection on `[address, address + size)` for the lifetime of the guard, restoring
/// the original flags on drop.
///
/// Restoration failure is not swallowed: `Drop` has no return channel, so a failed restore is
/// logged at `error` level. Callers who need to observe the failure should call
/// [`ScopedProtection::restore`] explicitly before the guard drops.
pub struct ScopedProtection {
    handle: Arc<Handle>,
    address: usize,
    size: usize,
    old_flags: ProtectionFlags,
    restored: bool,
}

impl ScopedProtection {
    pub(crate) fn apply(
        handle: Arc<Handle>,
        address: usize,
        size: usize,
        new_flags: ProtectionFlags,
    ) -> Result<Self> {
        let mut old = Default::default();
        unsafe {
            VirtualProtectEx(
                handle.native,
                address as *const _,
                size,
                new_flags.to_raw(),
                &mut old,
            )
        }
        .map_err(|e| Error::os_failure("VirtualProtectEx", e))?;

        Ok(Self {
            handle,
            address,
            size,
            old_flags: ProtectionFlags::from_raw(old),
            restored: false,
        })
    }

    pub fn old_flags(&self) -> ProtectionFlags {
        self.old_flags
    }

    /// Restores the original protection now, returning any failure instead of only logging it.
    /// Safe to call more than once; a no-op after the first successful call.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }

        let mut discard = Default::default();
        unsafe {
            VirtualProtectEx(
                self.handle.native,
                self.address as *const _,
                self.size,
                self.old_flags.to_raw(),
                &mut discard,
            )
        }
        .map_err(|e| Error::ProtectionRestoreFailed {
            code: e.code().0 as u32,
        })?;

        self.restored = true;
        Ok(())
    }
}

impl Drop for ScopedProtection {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            log::error!(
                "failed to restore protection at {:#x} ({} bytes): {err}",
                self.address,
                self.size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::Memory::{MEMORY_BASIC_INFORMATION, VirtualQueryEx};
    use windows::Win32::System::Threading::GetCurrentProcess;

    use crate::memory::protection::Protection;

    fn query_protection(handle: HANDLE, address: usize) -> ProtectionFlags {
        let mut mbi = MEMORY_BASIC_INFORMATION::default();
        unsafe {
            VirtualQueryEx(
                handle,
                Some(address as *const _),
                &mut mbi,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        ProtectionFlags::from_raw(mbi.Protect)
    }

    #[test]
    #[ignore = "requires a live Windows process table and a real read-only page to flip; run \
                manually under a real target process"]
    fn scoped_protection_restores_original_protection_after_a_write() {
        // A `static` with no interior mutability is placed in a read-only page, giving S4's
        // "pick a readonly region" a real page to flip without needing a second process.
        static READONLY: [u8; 100] = [0u8; 100];

        let native = unsafe { GetCurrentProcess() };
        let handle = Arc::new(Handle::new(native, false));
        let address = READONLY.as_ptr() as usize;

        let before = query_protection(native, address);
        assert!(before.has(Protection::ReadOnly));

        let mut guard = ScopedProtection::apply(
            Arc::clone(&handle),
            address,
            100,
            ProtectionFlags::single(Protection::ReadWrite),
        )
        .unwrap();
        assert!(query_protection(native, address).has(Protection::ReadWrite));

        unsafe { std::ptr::write(address as *mut u8, 0xAB) };
        assert_eq!(unsafe { std::ptr::read(address as *const u8) }, 0xAB);

        guard.restore().unwrap();
        drop(guard);

        assert_eq!(query_protection(native, address), before);
    }
}
