//! Dispatches reads, writes and scans to either the current process (`memcpy`) or a remote one
//! (`ReadProcessMemory`/`WriteProcessMemory`), behind one API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::ProcessStatus::{QueryWorkingSetEx, PSAPI_WORKING_SET_EX_INFORMATION};

use crate::core::handle::Handle;
use crate::errors::{Error, Result};
use crate::memory::protection::ProtectionFlags;
use crate::memory::protection_operation::ScopedProtection;
use crate::memory::region::RegionSequence;

/// Whether a [`MemoryFactory`] talks to the current process or a remote one. Local reads/writes
/// use a direct memory copy; remote ones go through the Win32 cross-process APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Local,
    Remote,
}

/// Per-page residency and sharing information, as reported by `QueryWorkingSetEx`.
#[derive(Debug, Clone, Copy)]
pub struct WorkingSetInfo {
    pub valid: bool,
    pub shared: bool,
    pub share_count: u32,
    pub protection: ProtectionFlags,
}

/// Reads, writes, enumerates regions of, and scans a process's address space.
///
/// Owned by [`Process`](crate::process::Process) and shared (via `Arc`) with every
/// [`MemoryView`](crate::memory::view::MemoryView) it produces, so views outlive the factory
/// that created them only as long as the handle stays open.
pub struct MemoryFactory {
    handle: Arc<Handle>,
    memory_type: MemoryType,
}

impl MemoryFactory {
    pub(crate) fn new(handle: Arc<Handle>, memory_type: MemoryType) -> Self {
        Self { handle, memory_type }
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    pub fn read(&self, address: usize, buffer: &mut [u8]) -> Result<()> {
        match self.memory_type {
            MemoryType::Local => {
                unsafe {
                    std::ptr::copy_nonoverlapping(address as *const u8, buffer.as_mut_ptr(), buffer.len());
                }
                Ok(())
            }
            MemoryType::Remote => {
                let mut bytes_read = 0;
                unsafe {
                    ReadProcessMemory(
                        self.handle.native,
                        address as *const _,
                        buffer.as_mut_ptr() as *mut _,
                        buffer.len(),
                        Some(&mut bytes_read),
                    )
                }
                .map_err(|e| Error::os_failure("ReadProcessMemory", e))?;

                if bytes_read != buffer.len() {
                    return Err(Error::OsFailure {
                        code: 0,
                        message: format!(
                            "ReadProcessMemory: short read ({bytes_read} of {} bytes at {address:#x})",
                            buffer.len()
                        ),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn read_value<T: Copy>(&self, address: usize) -> Result<T> {
        let mut buffer = vec![0u8; std::mem::size_of::<T>()];
        self.read(address, &mut buffer)?;
        Ok(unsafe { std::ptr::read_unaligned(buffer.as_ptr() as *const T) })
    }

    pub fn write(&self, address: usize, buffer: &[u8]) -> Result<()> {
        match self.memory_type {
            MemoryType::Local => {
                unsafe {
                    std::ptr::copy(buffer.as_ptr(), address as *mut u8, buffer.len());
                }
                Ok(())
            }
            MemoryType::Remote => {
                let mut bytes_written = 0;
                unsafe {
                    WriteProcessMemory(
                        self.handle.native,
                        address as *const _,
                        buffer.as_ptr() as *const _,
                        buffer.len(),
                        Some(&mut bytes_written),
                    )
                }
                .map_err(|e| Error::os_failure("WriteProcessMemory", e))?;

                if bytes_written != buffer.len() {
                    return Err(Error::OsFailure {
                        code: 0,
                        message: format!(
                            "WriteProcessMemory: short write ({bytes_written} of {} bytes at {address:#x})",
                            buffer.len()
                        ),
                    });
                }
                Ok(())
            }
        }
    }

    /// Copies the full in-memory representation of `value` to `address`, mirroring
    /// [`read_value`](Self::read_value).
    pub fn write_value<T: Copy>(&self, address: usize, value: &T) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(value as *const T as *const u8, std::mem::size_of::<T>())
        };
        self.write(address, bytes)
    }

    /// Lazily enumerates regions over `[start, stop)`.
    pub fn regions(&self, start: usize, stop: usize) -> RegionSequence {
        RegionSequence::new(Arc::clone(&self.handle), start, stop)
    }

    /// Changes protection on `[address, address + size)`, restoring the original flags when the
    /// returned guard drops.
    pub fn protect(&self, address: usize, size: usize, new_flags: ProtectionFlags) -> Result<ScopedProtection> {
        log::debug!("changing protection at {address:#x} ({size} bytes) to {new_flags}");
        ScopedProtection::apply(Arc::clone(&self.handle), address, size, new_flags)
    }

    /// Reports residency for the page containing `address`.
    pub fn working_set_information(&self, address: usize) -> Result<WorkingSetInfo> {
        let mut info = PSAPI_WORKING_SET_EX_INFORMATION {
            VirtualAddress: address as *mut _,
            ..Default::default()
        };

        unsafe {
            QueryWorkingSetEx(
                self.handle.native,
                &mut info as *mut _ as *mut _,
                std::mem::size_of::<PSAPI_WORKING_SET_EX_INFORMATION>() as u32,
            )
        }
        .map_err(|e| Error::os_failure("QueryWorkingSetEx", e))?;

        let flags = unsafe { info.VirtualAttributes.Anonymous.Flags };
        Ok(WorkingSetInfo {
            valid: flags & 0x1 != 0,
            shared: (flags >> 1) & 0x1 != 0,
            share_count: (flags >> 5) & 0x7,
            protection: ProtectionFlags::empty(),
        })
    }

    /// Scans every committed, private, read-write region in `[start, stop)` for the first
    /// occurrence of `needle` (typically a vtable pointer's raw bytes).
    ///
    /// `region_compare` further filters candidate regions beyond the protection/type/state
    /// check; pass `|_| true` to scan every eligible region. When `parallel` is `true`, regions
    /// are scanned concurrently with cooperative cancellation (the first hit stops the rest at
    /// their next poll); when `false`, regions are scanned in order on the caller's thread and
    /// the search stops at the first match without spawning anything.
    pub fn find_instance_of(
        &self,
        start: usize,
        stop: usize,
        needle: &[u8],
        region_compare: impl Fn(&crate::memory::region::Region) -> bool + Sync,
        parallel: bool,
    ) -> Result<Option<usize>> {
        use crate::memory::protection::Protection;
        use crate::memory::region::{RegionState, RegionType};
        use crate::patterns::pattern::Pattern;
        use crate::patterns::scanner::{Scanner, TurboBoyerMoore};

        let pattern = Pattern::from_bytes(needle);

        let candidates: Vec<_> = self
            .regions(start, stop)
            .filter(|r| {
                r.protection.has(Protection::ReadWrite)
                    && r.region_type == RegionType::Private
                    && r.state == RegionState::Commit
                    && region_compare(r)
            })
            .collect();

        const NONE_SENTINEL: usize = usize::MAX;

        let result = if parallel {
            let found = AtomicUsize::new(NONE_SENTINEL);

            std::thread::scope(|scope| {
                for region in &candidates {
                    if found.load(Ordering::Relaxed) != NONE_SENTINEL {
                        break;
                    }

                    scope.spawn(|| {
                        if found.load(Ordering::Relaxed) != NONE_SENTINEL {
                            return;
                        }

                        let mut buffer = vec![0u8; region.size];
                        if self.read(region.base_address, &mut buffer).is_err() {
                            return;
                        }

                        if let Some(offset) = TurboBoyerMoore.find(&buffer, &pattern, 0) {
                            found.fetch_min(region.base_address + offset, Ordering::Relaxed);
                        }
                    });
                }
            });

            found.load(Ordering::Relaxed)
        } else {
            let mut hit = NONE_SENTINEL;
            for region in &candidates {
                let mut buffer = vec![0u8; region.size];
                if self.read(region.base_address, &mut buffer).is_err() {
                    continue;
                }
                if let Some(offset) = TurboBoyerMoore.find(&buffer, &pattern, 0) {
                    hit = region.base_address + offset;
                    break;
                }
            }
            hit
        };

        log::debug!(
            "find_instance_of ({}) scanned {} candidate regions, result {:?}",
            if parallel { "parallel" } else { "serial" },
            candidates.len(),
            if result == NONE_SENTINEL { None } else { Some(result) }
        );
        Ok(if result == NONE_SENTINEL { None } else { Some(result) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a live Windows process table and heap region introspection"]
    fn find_instance_of_locates_a_planted_vtable_pointer_serial_and_parallel() {
        let handle = Arc::new(Handle::new(
            unsafe { windows::Win32::System::Threading::GetCurrentProcess() },
            false,
        ));
        let factory = MemoryFactory::new(handle, MemoryType::Local);

        // A boxed value on the heap lives in a committed, private, read-write region, the same
        // shape `find_instance_of` expects for a live MSVC object whose first field is a vtable
        // pointer.
        let planted: Box<u64> = Box::new(0xDEAD_BEEF_CAFE_F00D);
        let address = planted.as_ref() as *const u64 as usize;
        let needle = (*planted).to_le_bytes();

        let window_start = address.saturating_sub(0x10000);
        let window_stop = address + 0x10000;

        let serial = factory
            .find_instance_of(window_start, window_stop, &needle, |_| true, false)
            .unwrap();
        assert_eq!(serial, Some(address));

        let parallel = factory
            .find_instance_of(window_start, window_stop, &needle, |_| true, true)
            .unwrap();
        assert_eq!(parallel, Some(address));
    }

    #[test]
    fn local_read_write_round_trips_within_current_process() {
        let handle = Arc::new(Handle::new(
            unsafe { windows::Win32::System::Threading::GetCurrentProcess() },
            false,
        ));
        let factory = MemoryFactory::new(handle, MemoryType::Local);

        let mut value: u32 = 0;
        let address = &mut value as *mut u32 as usize;

        factory.write(address, &42u32.to_le_bytes()).unwrap();
        assert_eq!(value, 42);

        let read_back: u32 = factory.read_value(address).unwrap();
        assert_eq!(read_back, 42);
    }

    #[test]
    fn write_value_round_trips_within_current_process() {
        let handle = Arc::new(Handle::new(
            unsafe { windows::Win32::System::Threading::GetCurrentProcess() },
            false,
        ));
        let factory = MemoryFactory::new(handle, MemoryType::Local);

        #[derive(Clone, Copy, PartialEq, Debug)]
        struct Point {
            x: i32,
            y: i32,
        }

        let mut target = Point { x: 0, y: 0 };
        let address = &mut target as *mut Point as usize;

        factory.write_value(address, &Point { x: 7, y: -3 }).unwrap();
        assert_eq!(target, Point { x: 7, y: -3 });

        let read_back: Point = factory.read_value(address).unwrap();
        assert_eq!(read_back, target);
    }
}
