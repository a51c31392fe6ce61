//! Opens a process by name or id and exposes its modules, memory and windows.

use std::sync::Arc;

use windows::Win32::System::ProcessStatus::GetModuleBaseName;
use windows::Win32::System::Threading::{GetCurrentProcess, GetProcessId, OpenProcess, PROCESS_ACCESS_RIGHTS};

use crate::core::handle::Handle;
use crate::core::snapshot::{ModuleSnapshot, ProcessSnapshot, ThreadEntry, ThreadSnapshot};
use crate::errors::{Error, Result};
use crate::memory::memory_factory::{MemoryFactory, MemoryType};
use crate::modules::module::Module;
use crate::windows::window::Window;
use crate::windows::window_factory;

/// A commonly useful combination of access rights: VM read/write/query plus query information,
/// sufficient for every memory and module operation this crate performs.
pub fn default_access() -> PROCESS_ACCESS_RIGHTS {
    windows::Win32::System::Threading::PROCESS_VM_READ
        | windows::Win32::System::Threading::PROCESS_VM_WRITE
        | windows::Win32::System::Threading::PROCESS_VM_OPERATION
        | windows::Win32::System::Threading::PROCESS_QUERY_INFORMATION
}

/// An opened process: its id, name, and the memory/module/window facades scoped to it.
pub struct Process {
    handle: Arc<Handle>,
    id: u32,
    name: String,
    memory_factory: Arc<MemoryFactory>,
}

impl Process {
    /// Opens the first process whose name matches `name` (case-sensitive, as reported by the
    /// ToolHelp snapshot).
    pub fn open_by_name(name: &str, access: PROCESS_ACCESS_RIGHTS) -> Result<Option<Self>> {
        let snapshot = ProcessSnapshot::create()?;

        for entry in snapshot.iter() {
            if entry.name == name {
                let handle = unsafe { OpenProcess(access, false, entry.id) }
                    .map_err(|e| Error::os_failure("OpenProcess", e))?;
                log::debug!("opened process {} ({}) by name", entry.id, entry.name);
                return Ok(Some(Self::new(Handle::new(handle, true), entry.id, entry.name, MemoryType::Remote)));
            }
        }

        Ok(None)
    }

    /// Opens the process with the given id.
    pub fn open_by_id(id: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<Option<Self>> {
        let snapshot = ProcessSnapshot::create()?;

        for entry in snapshot.iter() {
            if entry.id == id {
                let handle = unsafe { OpenProcess(access, false, id) }
                    .map_err(|e| Error::os_failure("OpenProcess", e))?;
                log::debug!("opened process {} ({}) by id", id, entry.name);
                return Ok(Some(Self::new(Handle::new(handle, true), id, entry.name, MemoryType::Remote)));
            }
        }

        Ok(None)
    }

    /// The current process, using the `GetCurrentProcess` pseudo-handle (never closed) and
    /// local, direct-memory-copy I/O.
    pub fn current() -> Result<Self> {
        let handle = Handle::new(unsafe { GetCurrentProcess() }, false);
        let id = unsafe { GetProcessId(handle.native) };

        let mut name_buf = vec![0u8; 260];
        let len = unsafe { GetModuleBaseName(handle.native, None, &mut name_buf) };
        if len == 0 {
            return Err(Error::os_failure("GetModuleBaseName", windows::core::Error::from_win32()));
        }
        let name = String::from_utf8_lossy(&name_buf[..len as usize]).into_owned();

        Ok(Self::new(handle, id, name, MemoryType::Local))
    }

    fn new(handle: Handle, id: u32, name: String, memory_type: MemoryType) -> Self {
        let handle = Arc::new(handle);
        let memory_factory = Arc::new(MemoryFactory::new(Arc::clone(&handle), memory_type));
        Self {
            handle,
            id,
            name,
            memory_factory,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &Arc<MemoryFactory> {
        &self.memory_factory
    }

    /// Every module currently loaded in the process.
    pub fn modules(&self) -> Result<Vec<Module>> {
        let snapshot = ModuleSnapshot::create(self.id)?;
        snapshot
            .iter()
            .map(|entry| Module::load(Arc::clone(&self.memory_factory), &self.handle, entry))
            .collect()
    }

    /// The first module whose (case-sensitive) name matches `name`.
    pub fn module(&self, name: &str) -> Result<Option<Module>> {
        Ok(self.modules()?.into_iter().find(|m| m.name() == name.to_lowercase()))
    }

    /// The process's own executable module (the first entry in the module snapshot).
    pub fn main_module(&self) -> Result<Option<Module>> {
        let snapshot = ModuleSnapshot::create(self.id)?;
        snapshot
            .iter()
            .next()
            .map(|entry| Module::load(Arc::clone(&self.memory_factory), &self.handle, entry))
            .transpose()
    }

    /// Every thread owned by this process.
    pub fn threads(&self) -> Result<Vec<ThreadEntry>> {
        let snapshot = ThreadSnapshot::create()?;
        Ok(snapshot.iter().filter(|t| t.owner_id == self.id).collect())
    }

    /// Every top-level window owned by this process.
    pub fn windows(&self) -> Result<Vec<Window>> {
        window_factory::enumerate_windows_for_process(self.id)
    }
}

impl Process {
    /// `foo` resolves to the module `foo.dll`, matching the convention of appending `.dll` and
    /// lower-casing before lookup. Returns `NotFound` rather than panicking: unlike
    /// `std::ops::Index`, a fallible named method keeps the by-name lookup in the `Result` chain
    /// callers already use for `open_by_name`/`open_by_id`.
    pub fn module_by_short_name(&self, name: &str) -> Result<Module> {
        let name_with_ext = format!("{}.dll", name.to_lowercase());
        self.module(&name_with_ext)?
            .ok_or_else(|| Error::not_found(format!("module {name_with_ext}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "requires a live Windows process table"]
    fn current_process_reports_its_own_id() {
        let process = Process::current().unwrap();
        assert_eq!(process.id(), std::process::id());
    }

    #[test]
    #[ignore = "requires a live Windows process table"]
    fn open_by_id_finds_current_process() {
        let pid = std::process::id();
        let process = Process::open_by_id(pid, default_access()).unwrap();
        assert!(process.is_some());
    }
}
