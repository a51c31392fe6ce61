//! Top-level window enumeration and inspection.

pub mod window;
pub mod window_factory;

pub use window::{Window, WindowPlacement, WindowState};
pub use window_factory::{enumerate_windows, enumerate_windows_for_process};
