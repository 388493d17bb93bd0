//! Function table management.
//!
//! Resolves Go function names to their code ranges using the metadata blobs
//! embedded in the executable.

use std::collections::HashMap;

use crate::error::Result;
use crate::pclntab::LineTable;

/// A function defined in the executable's code section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Fully-qualified Go name, e.g. `time.Now` or `main.(*T).M`.
    pub name: String,
    /// Virtual address of the first instruction.
    pub entry: u64,
    /// Virtual address one past the last instruction.
    pub end: u64,
}

impl Function {
    /// Size of the function body in bytes; the upper bound for a trampoline.
    pub fn size(&self) -> u64 {
        self.end - self.entry
    }
}

/// Name-indexed view over every function of an executable.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: Vec<Function>,
    by_name: HashMap<String, usize>,
}

impl FunctionTable {
    /// Builds the table from the symbol-table and line-table blobs.
    ///
    /// The line table alone describes functions for every layout from Go 1.2
    /// onwards; the symbol-table blob is empty in those binaries and is not decoded.
    pub fn build(symtab: &[u8], pclntab: &[u8], text_start: u64) -> Result<Self> {
        if !symtab.is_empty() {
            tracing::trace!(len = symtab.len(), "ignoring legacy symbol table contents");
        }

        let line_table = LineTable::parse(pclntab, text_start)?;
        let table = Self::from_functions(line_table.functions()?);
        tracing::debug!(functions = table.len(), "built function table");
        Ok(table)
    }

    /// Indexes `functions` by name. Duplicate names resolve to the last one.
    pub fn from_functions(functions: Vec<Function>) -> Self {
        let by_name = functions
            .iter()
            .enumerate()
            .map(|(index, function)| (function.name.clone(), index))
            .collect();
        Self { functions, by_name }
    }

    /// Exact-match lookup; no demangling or prefix matching.
    pub fn get(&self, name: &str) -> Option<&Function> {
        self.by_name.get(name).map(|&index| &self.functions[index])
    }

    /// Functions in line-table order.
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Maps a function's entry address back to its canonical name.
///
/// Used to register replacements from code addresses (for instance function
/// pointers obtained at runtime) instead of names.
pub trait FunctionNames {
    fn name_of(&self, entry: u64) -> Option<String>;
}

impl FunctionNames for FunctionTable {
    fn name_of(&self, entry: u64) -> Option<String> {
        self.functions
            .iter()
            .rev()
            .find(|function| function.entry == entry)
            .map(|function| function.name.clone())
    }
}
