//! Process introspection for Windows: memory scanning, PE module parsing and MSVC RTTI
//! resolution.
//!
//! The API centers on [`Process`], opened by name, id, or as the current process:
//!
//! ```no_run
//! use wincpp_rs::Process;
//! use wincpp_rs::patterns::Pattern;
//!
//! # fn main() -> wincpp_rs::Result<()> {
//! let process = Process::open_by_name("target.exe", wincpp_rs::process::default_access())?
//!     .expect("process not running");
//!
//! let module = process.module("target.exe")?.expect("module not loaded");
//! let pattern = Pattern::from_text("48 8B ? ? ? ? ? 48 89")?;
//!
//! let view = wincpp_rs::memory::MemoryView::Module(module);
//! if let Some(offset) = view.find(&pattern, 0)? {
//!     println!("match at {:#x}", view.address() + offset);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! This crate never installs a logger; it only emits [`log`] records. Callers that want
//! diagnostics should install `simplelog`, `env_logger`, or any other `log`-compatible backend.

pub mod core;
pub mod errors;
pub mod memory;
pub mod modules;
pub mod patterns;
pub mod process;
pub mod windows;

pub use crate::errors::{Error, Result};
pub use crate::process::Process;
