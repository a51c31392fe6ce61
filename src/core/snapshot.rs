//! Lazy iteration over the OS process/thread/module tables via the ToolHelp snapshot API.

use std::sync::Arc;

use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
    THREADENTRY32, Thread32First, Thread32Next, TH32CS_SNAPTHREAD,
};
use windows::Win32::Foundation::HANDLE;

use crate::core::handle::Handle;
use crate::errors::{Error, Result};

fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// An entry in the system-wide process snapshot.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub id: u32,
    pub parent_id: u32,
    pub threads: u32,
    pub priority: i32,
    pub name: String,
}

/// An entry in a process's thread snapshot.
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub id: u32,
    pub owner_id: u32,
    pub base_priority: i32,
}

/// An entry in a process's module snapshot.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub base_address: usize,
    pub base_size: usize,
    pub name: String,
    pub path: String,
}

/// Owns the snapshot handle and yields entries one at a time. Lazy and single-pass; restart by
/// constructing a new snapshot.
pub struct ProcessSnapshot {
    handle: Arc<Handle>,
}

impl ProcessSnapshot {
    pub fn create() -> Result<Self> {
        let raw = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::os_failure("CreateToolhelp32Snapshot(process)", e))?;
        Ok(Self {
            handle: Arc::new(Handle::new(raw, true)),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessEntry> + '_ {
        ProcessIter {
            handle: self.handle.native,
            entry: None,
            done: false,
        }
    }
}

struct ProcessIter {
    handle: HANDLE,
    entry: Option<PROCESSENTRY32W>,
    done: bool,
}

impl Iterator for ProcessIter {
    type Item = ProcessEntry;

    fn next(&mut self) -> Option<ProcessEntry> {
        if self.done {
            return None;
        }

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let ok = if self.entry.is_none() {
            unsafe { Process32FirstW(self.handle, &mut entry) }
        } else {
            unsafe { Process32NextW(self.handle, &mut entry) }
        };

        if ok.is_err() {
            self.done = true;
            return None;
        }

        self.entry = Some(entry);
        Some(ProcessEntry {
            id: entry.th32ProcessID,
            parent_id: entry.th32ParentProcessID,
            threads: entry.cntThreads,
            priority: entry.pcPriClassBase,
            name: wide_to_string(&entry.szExeFile),
        })
    }
}

/// Thread snapshot of the entire system (ToolHelp has no per-process thread filter; callers
/// filter by `owner_id`).
pub struct ThreadSnapshot {
    handle: Arc<Handle>,
}

impl ThreadSnapshot {
    pub fn create() -> Result<Self> {
        let raw = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) }
            .map_err(|e| Error::os_failure("CreateToolhelp32Snapshot(thread)", e))?;
        Ok(Self {
            handle: Arc::new(Handle::new(raw, true)),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadEntry> + '_ {
        ThreadIter {
            handle: self.handle.native,
            entry: None,
            done: false,
        }
    }
}

struct ThreadIter {
    handle: HANDLE,
    entry: Option<THREADENTRY32>,
    done: bool,
}

impl Iterator for ThreadIter {
    type Item = ThreadEntry;

    fn next(&mut self) -> Option<ThreadEntry> {
        if self.done {
            return None;
        }

        let mut entry = THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };

        let ok = if self.entry.is_none() {
            unsafe { Thread32First(self.handle, &mut entry) }
        } else {
            unsafe { Thread32Next(self.handle, &mut entry) }
        };

        if ok.is_err() {
            self.done = true;
            return None;
        }

        self.entry = Some(entry);
        Some(ThreadEntry {
            id: entry.th32ThreadID,
            owner_id: entry.th32OwnerProcessID,
            base_priority: entry.tpBasePri,
        })
    }
}

/// Module snapshot scoped to a single process id.
pub struct ModuleSnapshot {
    handle: Arc<Handle>,
}

impl ModuleSnapshot {
    pub fn create(pid: u32) -> Result<Self> {
        let raw = unsafe {
            CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)
        }
        .map_err(|e| Error::os_failure("CreateToolhelp32Snapshot(module)", e))?;
        Ok(Self {
            handle: Arc::new(Handle::new(raw, true)),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = ModuleEntry> + '_ {
        ModuleIter {
            handle: self.handle.native,
            entry: None,
            done: false,
        }
    }
}

struct ModuleIter {
    handle: HANDLE,
    entry: Option<MODULEENTRY32W>,
    done: bool,
}

impl Iterator for ModuleIter {
    type Item = ModuleEntry;

    fn next(&mut self) -> Option<ModuleEntry> {
        if self.done {
            return None;
        }

        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        let ok = if self.entry.is_none() {
            unsafe { Module32FirstW(self.handle, &mut entry) }
        } else {
            unsafe { Module32NextW(self.handle, &mut entry) }
        };

        if ok.is_err() {
            self.done = true;
            return None;
        }

        self.entry = Some(entry);
        Some(ModuleEntry {
            base_address: entry.modBaseAddr as usize,
            base_size: entry.modBaseSize as usize,
            name: wide_to_string(&entry.szModule),
            path: wide_to_string(&entry.szExePath),
        })
    }
}

