//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the `gopatch` tool using `clap`,
//! and the options controlling how a running program re-executes its patched copy.

use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::PathBuf;

/// Environment variable marking the patched re-execution, unless overridden.
pub const DEFAULT_ENV_VAR: &str = "XXX_REPLACED";

/// Patch function calls in Go executables.
///
/// Every replacement overwrites the entry of the source function with a direct
/// branch to the target function.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a patched copy of an executable
    Patch {
        /// Executable to patch (left untouched)
        input: PathBuf,

        /// Output file
        #[arg(short, long, help = "Path to the patched executable")]
        output: PathBuf,

        /// Replacement as SOURCE=TARGET, using fully-qualified Go names
        #[arg(short, long = "replace", value_name = "SOURCE=TARGET", required = true, value_parser = parse_replacement)]
        replacements: Vec<(String, String)>,
    },

    /// List the functions found in an executable
    Symbols {
        /// Executable to inspect
        input: PathBuf,

        /// Only show functions whose name contains this string
        #[arg(short, long)]
        filter: Option<String>,
    },
}

fn parse_replacement(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((source, target)) if !source.is_empty() && !target.is_empty() => {
            Ok((source.to_string(), target.to_string()))
        }
        _ => Err(format!("expected SOURCE=TARGET, got {value:?}")),
    }
}

/// Options for [`Patcher::patch_and_exec`](crate::patcher::Patcher::patch_and_exec).
#[derive(Debug, Clone)]
pub struct PatchOptions {
    pub env_var_name: String,
    /// Exact value the marker must have. Without it only presence is checked.
    pub env_var_value: Option<String>,
    /// Delete the patched executable once it is running.
    pub remove_patched: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            env_var_name: DEFAULT_ENV_VAR.to_string(),
            env_var_value: None,
            remove_patched: false,
        }
    }
}

impl PatchOptions {
    pub fn env_var_name(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = name.into();
        self
    }

    pub fn env_var_value(mut self, value: impl Into<String>) -> Self {
        self.env_var_value = Some(value.into());
        self
    }

    pub fn remove_patched(mut self, remove: bool) -> Self {
        self.remove_patched = remove;
        self
    }

    /// Whether a marker with `value` (or no marker at all) denotes the patched run.
    /// Values are compared as raw OS strings, so they need not be UTF-8.
    pub fn is_patched_run(&self, value: Option<&OsStr>) -> bool {
        match (value, &self.env_var_value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == OsStr::new(expected),
        }
    }

    /// Value exported to the patched run.
    pub fn marker_value(&self) -> &str {
        self.env_var_value.as_deref().unwrap_or("1")
    }
}
