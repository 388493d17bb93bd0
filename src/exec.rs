//! Handing control to the patched executable.
//!
//! Where the platform can replace the process image (`execve`), the patched copy
//! takes over the current process. Elsewhere it runs as a child with inherited
//! standard streams and the parent exits with the child's code.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::Command;

use tempfile::NamedTempFile;

/// Replaces the running program with `command`.
///
/// On success nothing after the call runs in the current process, so the only
/// value ever returned is the error that prevented the hand-off.
pub trait ProcessReplacer {
    fn replace(&self, command: Command) -> io::Error;
}

/// Replaces the process image in place.
#[cfg(unix)]
pub struct ExecReplacer;

#[cfg(unix)]
impl ProcessReplacer for ExecReplacer {
    fn replace(&self, mut command: Command) -> io::Error {
        use std::os::unix::process::CommandExt;

        tracing::info!(program = ?command.get_program(), "replacing process image");
        command.exec()
    }
}

/// Runs the program as a child and forwards its exit code.
pub struct SpawnReplacer;

impl ProcessReplacer for SpawnReplacer {
    fn replace(&self, mut command: Command) -> io::Error {
        tracing::info!(program = ?command.get_program(), "spawning patched executable");
        match command.status() {
            Ok(status) => match status.code() {
                Some(code) => std::process::exit(code),
                None => io::Error::new(
                    io::ErrorKind::Other,
                    format!("patched executable terminated abnormally: {status}"),
                ),
            },
            Err(err) => err,
        }
    }
}

/// The replacement strategy of the current platform.
#[cfg(unix)]
pub use self::ExecReplacer as NativeReplacer;

#[cfg(not(unix))]
pub use self::SpawnReplacer as NativeReplacer;

/// Copies the executable at `path` into a new temporary file with the same
/// extension, readable, writable and executable by its owner.
pub fn copy_to_temp(path: &Path) -> io::Result<NamedTempFile> {
    let mut source = File::open(path)?;

    let suffix = path
        .extension()
        .map(|ext| {
            let mut suffix = OsStr::new(".").to_os_string();
            suffix.push(ext);
            suffix
        })
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix("gopatch-")
        .suffix(&suffix)
        .tempfile()?;

    io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp.as_file().metadata()?.permissions();
        perms.set_mode(0o755);
        temp.as_file().set_permissions(perms)?;
    }

    tracing::debug!(from = %path.display(), to = %temp.path().display(), "copied executable");
    Ok(temp)
}
