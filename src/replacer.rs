//! Core replacement logic.
//!
//! The `Replacer` ties the stages together for one patch session:
//! 1. Recognition: identifies the container and extracts the Go metadata.
//! 2. Symbol resolution: builds the name-indexed function table.
//! 3. Trampoline generation: encodes a branch from one function to another.
//! 4. Output: writes the branch over the first bytes of the source function.

use crate::arch::{self, Architecture};
use crate::error::{Error, Result, Side};
use crate::executable::{self, Executable};
use crate::symbol::{Function, FunctionTable};

/// Patches functions of one executable image held in memory (usually a
/// memory-mapped copy of the file).
pub struct Replacer<'a> {
    image: &'a mut [u8],
    executable: Box<dyn Executable>,
    arch: Box<dyn Architecture>,
    functions: FunctionTable,
}

impl<'a> Replacer<'a> {
    /// Recognizes `image` by its signature and indexes its functions.
    pub fn new(image: &'a mut [u8]) -> Result<Self> {
        let executable = executable::by_signature(image)?;
        Self::with_executable(image, executable)
    }

    /// Uses an already recognized `executable` describing `image`.
    pub fn with_executable(image: &'a mut [u8], executable: Box<dyn Executable>) -> Result<Self> {
        let arch = arch::from_goarch(executable.goarch())?;
        let functions = FunctionTable::build(
            executable.symtab_data(),
            executable.pclntab_data(),
            executable.text_addr(),
        )?;

        tracing::info!(
            format = %executable.format(),
            goarch = executable.goarch(),
            functions = functions.len(),
            "loaded executable"
        );

        Ok(Self {
            image,
            executable,
            arch,
            functions,
        })
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn executable(&self) -> &dyn Executable {
        self.executable.as_ref()
    }

    /// Places a trampoline at the entry of `source` that jumps to `target`.
    ///
    /// Names are matched exactly as they appear in the line table. Cycles
    /// between replacements are not checked here.
    pub fn replace(&mut self, source: &str, target: &str) -> Result<()> {
        let source_fn = lookup(&self.functions, Side::Source, source)?;
        let target_fn = lookup(&self.functions, Side::Target, target)?;

        let trampoline = self.arch.trampoline(source_fn.entry, target_fn.entry)?;
        if trampoline.len() as u64 > source_fn.size() {
            return Err(Error::ShortFunction {
                name: source_fn.name.clone(),
                size: source_fn.size(),
                needed: trampoline.len(),
            });
        }

        let offset = self.executable.offset(source_fn);
        tracing::debug!(
            source,
            target,
            offset = format_args!("0x{offset:x}"),
            bytes = format_args!("{trampoline:02x?}"),
            "writing trampoline"
        );
        write_at(self.image, offset, &trampoline)
    }
}

fn lookup<'t>(functions: &'t FunctionTable, side: Side, name: &str) -> Result<&'t Function> {
    functions.get(name).ok_or_else(|| Error::FunctionNotFound {
        side,
        name: name.to_string(),
    })
}

fn write_at(image: &mut [u8], offset: i64, data: &[u8]) -> Result<()> {
    let out_of_bounds = || Error::OutOfBounds { offset, len: data.len() };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(data.len()).ok_or_else(out_of_bounds)?;
    image
        .get_mut(start..end)
        .ok_or_else(out_of_bounds)?
        .copy_from_slice(data);
    Ok(())
}
