//! Replacement registry and the patch-and-re-exec flow.
//!
//! A `Patcher` collects `original -> replacement` pairs, rejects plans that
//! would make a function branch back into itself, writes the trampolines into a
//! copy of the running executable and finally re-executes that copy with a
//! marker in its environment, so the patched run knows not to patch again.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::Command;

use memmap2::MmapMut;

use crate::config::PatchOptions;
use crate::error::{Error, Result, Side};
use crate::exec::{self, NativeReplacer, ProcessReplacer};
use crate::replacer::Replacer;
use crate::symbol::FunctionNames;

/// Registry of function replacements applied to an executable.
#[derive(Debug, Default)]
pub struct Patcher {
    /// Original function name to replacement function name.
    replacements: BTreeMap<String, String>,
    /// First failed registration; reported as `FunctionNotFound` by the next
    /// checked operation.
    sticky: Option<(Side, String)>,
}

impl Patcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `configure` with the patcher, for a configure-then-commit style.
    pub fn apply(mut self, configure: impl FnOnce(&mut Patcher)) -> Self {
        configure(&mut self);
        self
    }

    /// Registers `original` to be replaced by `replacement`, both given as
    /// fully-qualified Go names. A later registration for the same original
    /// overrides this one.
    pub fn register(&mut self, original: impl Into<String>, replacement: impl Into<String>) -> &mut Self {
        let (original, replacement) = (original.into(), replacement.into());
        if original.is_empty() {
            self.fail(Side::Source, original);
        } else if replacement.is_empty() {
            self.fail(Side::Target, replacement);
        } else {
            tracing::debug!(%original, %replacement, "registered replacement");
            self.replacements.insert(original, replacement);
        }
        self
    }

    /// Registers a replacement given the entry addresses of both functions,
    /// resolving them to names through `names`. An address that is not a
    /// function entry leaves a sticky [`Error::FunctionNotFound`].
    pub fn register_entries(&mut self, names: &impl FunctionNames, original: u64, replacement: u64) -> &mut Self {
        match (names.name_of(original), names.name_of(replacement)) {
            (Some(original), Some(replacement)) => self.register(original, replacement),
            (None, _) => self.fail(Side::Source, format!("0x{original:x}")),
            (_, None) => self.fail(Side::Target, format!("0x{replacement:x}")),
        }
    }

    fn fail(&mut self, side: Side, name: String) -> &mut Self {
        tracing::warn!(%side, name = %name, "replacement not registered: function not found");
        if self.sticky.is_none() {
            self.sticky = Some((side, name));
        }
        self
    }

    /// Registered replacements, ordered by original name.
    pub fn replacements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.replacements.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the sticky registration error, if any, then checks the plan for
    /// cycles such as `a -> b`, `b -> a`.
    pub fn validate(&self) -> Result<()> {
        if let Some((side, name)) = &self.sticky {
            return Err(Error::FunctionNotFound { side: *side, name: name.clone() });
        }
        detect_cycles(&self.replacements)
    }

    /// Validates the plan and writes every trampoline into `image`.
    ///
    /// Nothing is written if validation fails. A failure partway through leaves
    /// earlier trampolines in place; the image should then be discarded.
    pub fn patch_image(&self, image: &mut [u8]) -> Result<()> {
        self.validate()?;

        let mut replacer = Replacer::new(image)?;
        for (original, replacement) in &self.replacements {
            replacer.replace(original, replacement)?;
        }
        Ok(())
    }

    /// Patches the executable file at `path` in place.
    pub fn patch_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        // SAFETY: the file is a private copy that nothing else maps or writes.
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        self.patch_image(&mut map)?;
        map.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Patches a copy of the running executable and re-executes it.
    ///
    /// Returns `Ok(())` only when this process already is the patched run
    /// (its environment carries the marker); otherwise control passes to the
    /// patched copy and the call does not return unless something fails.
    pub fn patch_and_exec(self) -> Result<()> {
        self.patch_and_exec_with(&PatchOptions::default(), &NativeReplacer)
    }

    /// Like [`patch_and_exec`](Self::patch_and_exec) but panics on errors.
    pub fn must_patch_and_exec(self) {
        if let Err(err) = self.patch_and_exec() {
            panic!("patch and exec failed: {err}");
        }
    }

    pub fn patch_and_exec_with(self, options: &PatchOptions, replacer: &dyn ProcessReplacer) -> Result<()> {
        self.validate()?;

        let my_path = std::env::current_exe()?;

        let marker = std::env::var_os(&options.env_var_name);
        if options.is_patched_run(marker.as_deref()) {
            tracing::debug!(env = %options.env_var_name, "running patched executable");
            if options.remove_patched {
                if let Err(err) = fs::remove_file(&my_path) {
                    tracing::warn!(path = %my_path.display(), %err, "could not remove patched executable");
                }
            }
            return Ok(());
        }

        let temp = exec::copy_to_temp(&my_path)?;
        self.patch_file(temp.path())?;
        // Close our handle so the file can be executed, and keep it on disk.
        let patched = temp.into_temp_path().keep().map_err(|err| Error::Io(err.error))?;

        tracing::info!(
            path = %patched.display(),
            replacements = self.replacements.len(),
            "patched executable"
        );

        let mut command = Command::new(&patched);
        let mut args = std::env::args_os();
        let arg0 = args.next();
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(arg0) = arg0 {
                command.arg0(arg0);
            }
        }
        #[cfg(not(unix))]
        let _ = arg0;
        command.args(args);
        command.env(&options.env_var_name, options.marker_value());

        let err = replacer.replace(command);
        let _ = fs::remove_file(&patched);
        Err(Error::Io(err))
    }
}

/// Walks each replacement chain. Reaching a function already seen in the
/// current walk means the chain loops. Chains that were fully walked from an
/// earlier start are not walked again.
fn detect_cycles(replacements: &BTreeMap<String, String>) -> Result<()> {
    let mut visited_all: HashSet<&str> = HashSet::new();
    let mut queue: Vec<&str> = Vec::new();

    for original in replacements.keys() {
        if visited_all.contains(original.as_str()) {
            continue;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        queue.clear();
        queue.push(original.as_str());

        let mut i = 0;
        while i < queue.len() {
            let current = queue[i];
            i += 1;
            visited_all.insert(current);
            visited.insert(current);

            let Some(replacement) = replacements.get(current) else {
                continue;
            };
            if visited.contains(replacement.as_str()) {
                return Err(Error::CyclicReplacement { function: replacement.clone() });
            }
            queue.push(replacement.as_str());
        }
    }

    Ok(())
}
