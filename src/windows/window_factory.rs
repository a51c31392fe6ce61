//! Enumerates top-level windows, optionally scoped to a single process.

use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::UI::WindowsAndMessaging::{EnumWindows, GetWindowThreadProcessId};

use crate::errors::{Error, Result};
use crate::windows::window::Window;

struct CollectState {
    pid_filter: Option<u32>,
    windows: Vec<Window>,
}

unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let state = unsafe { &mut *(lparam.0 as *mut CollectState) };

    let matches = match state.pid_filter {
        None => true,
        Some(pid) => {
            let mut owner_pid = 0u32;
            unsafe { GetWindowThreadProcessId(hwnd, Some(&mut owner_pid)) };
            owner_pid == pid
        }
    };

    if matches {
        state.windows.push(Window::new(hwnd));
    }

    BOOL(1)
}

/// Enumerates every top-level window on the desktop.
pub fn enumerate_windows() -> Result<Vec<Window>> {
    collect(None)
}

/// Enumerates only the top-level windows owned by the given process id.
pub fn enumerate_windows_for_process(pid: u32) -> Result<Vec<Window>> {
    collect(Some(pid))
}

fn collect(pid_filter: Option<u32>) -> Result<Vec<Window>> {
    let mut state = CollectState {
        pid_filter,
        windows: Vec::new(),
    };

    unsafe { EnumWindows(Some(enum_proc), LPARAM(&mut state as *mut CollectState as isize)) }
        .map_err(|e| Error::os_failure("EnumWindows", e))?;

    Ok(state.windows)
}
