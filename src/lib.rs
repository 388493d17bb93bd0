//! Go Function Patching Library.
//!
//! This library replaces functions of compiled Go executables by overwriting
//! their entry with a direct branch to another function of the same binary.
//! It is organized into several modules:
//! - `config`: CLI configuration and re-execution options.
//! - `executable`: ELF, Mach-O and PE recognition.
//! - `pclntab`: Go line table decoding.
//! - `symbol`: Function table management.
//! - `arch`: Architecture-specific trampoline encoding.
//! - `replacer`: Writing trampolines into an executable image.
//! - `patcher`: Replacement registry, cycle checks and patch-and-re-exec.
//! - `exec`: Handing control to the patched executable.

pub mod arch;
pub mod config;
pub mod error;
pub mod exec;
pub mod executable;
pub mod patcher;
pub mod pclntab;
pub mod replacer;
pub mod symbol;
pub mod utils;

pub use config::PatchOptions;
pub use error::{Error, Result};
pub use patcher::Patcher;
