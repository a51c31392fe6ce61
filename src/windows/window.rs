//! A single top-level window and its placement.

use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    GetClassNameA, GetForegroundWindow, GetWindow, GetWindowPlacement, GetWindowTextA,
    GetWindowTextLengthA, GetWindowThreadProcessId, GW_OWNER, SHOW_WINDOW_CMD, WINDOWPLACEMENT,
};

use crate::errors::{Error, Result};

/// Show-state of a window, mirroring the `SW_*` constants accepted/returned by
/// `WINDOWPLACEMENT::showCmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Hide,
    ShowNormal,
    ShowMinimized,
    ShowMaximized,
    ShowNoActivate,
    Show,
    Minimize,
    ShowMinNoActive,
    ShowNoActivateA,
    Restore,
    ShowDefault,
    ForceMinimize,
    Unknown(u32),
}

impl WindowState {
    fn from_raw(raw: SHOW_WINDOW_CMD) -> Self {
        match raw.0 {
            0 => WindowState::Hide,
            1 => WindowState::ShowNormal,
            2 => WindowState::ShowMinimized,
            3 => WindowState::ShowMaximized,
            4 => WindowState::ShowNoActivate,
            5 => WindowState::Show,
            6 => WindowState::Minimize,
            7 => WindowState::ShowMinNoActive,
            8 => WindowState::ShowNoActivateA,
            9 => WindowState::Restore,
            10 => WindowState::ShowDefault,
            11 => WindowState::ForceMinimize,
            other => WindowState::Unknown(other as u32),
        }
    }
}

/// The placement of a window: flags, current show state, and minimized/maximized/restored
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub struct WindowPlacement {
    pub flags: u32,
    pub show_state: WindowState,
    pub min_position: (i32, i32),
    pub max_position: (i32, i32),
    pub normal_position: (i32, i32, i32, i32),
}

impl WindowPlacement {
    fn from_raw(raw: &WINDOWPLACEMENT) -> Self {
        fn point(p: POINT) -> (i32, i32) {
            (p.x, p.y)
        }
        fn rect(r: RECT) -> (i32, i32, i32, i32) {
            (r.left, r.top, r.right, r.bottom)
        }

        Self {
            flags: raw.flags.0,
            show_state: WindowState::from_raw(raw.showCmd),
            min_position: point(raw.ptMinPosition),
            max_position: point(raw.ptMaxPosition),
            normal_position: rect(raw.rcNormalPosition),
        }
    }
}

/// A single top-level window, identified by its `HWND`.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    hwnd: HWND,
}

impl Window {
    pub(crate) fn new(hwnd: HWND) -> Self {
        Self { hwnd }
    }

    pub fn handle(&self) -> HWND {
        self.hwnd
    }

    pub fn process_id(&self) -> Result<u32> {
        let mut pid = 0u32;
        let tid = unsafe { GetWindowThreadProcessId(self.hwnd, Some(&mut pid)) };
        if tid == 0 {
            return Err(Error::os_failure("GetWindowThreadProcessId", windows::core::Error::from_win32()));
        }
        Ok(pid)
    }

    pub fn owner(&self) -> Option<Window> {
        let owner = unsafe { GetWindow(self.hwnd, GW_OWNER) }.ok()?;
        if owner.is_invalid() {
            None
        } else {
            Some(Window::new(owner))
        }
    }

    pub fn title(&self) -> Result<String> {
        let len = unsafe { GetWindowTextLengthA(self.hwnd) };
        let mut buffer = vec![0u8; len as usize + 1];

        let written = unsafe { GetWindowTextA(self.hwnd, &mut buffer) };
        if written == 0 && len != 0 {
            return Err(Error::os_failure("GetWindowTextA", windows::core::Error::from_win32()));
        }

        Ok(String::from_utf8_lossy(&buffer[..written as usize]).into_owned())
    }

    pub fn class_name(&self) -> Result<String> {
        let mut buffer = vec![0u8; 256];
        let written = unsafe { GetClassNameA(self.hwnd, &mut buffer) };
        if written == 0 {
            return Err(Error::os_failure("GetClassNameA", windows::core::Error::from_win32()));
        }
        Ok(String::from_utf8_lossy(&buffer[..written as usize]).into_owned())
    }

    pub fn is_active(&self) -> bool {
        unsafe { GetForegroundWindow() } == self.hwnd
    }

    pub fn placement(&self) -> Result<WindowPlacement> {
        let mut placement = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };

        unsafe { GetWindowPlacement(self.hwnd, &mut placement) }
            .map_err(|e| Error::os_failure("GetWindowPlacement", e))?;

        Ok(WindowPlacement::from_raw(&placement))
    }
}
