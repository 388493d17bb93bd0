//! Entry point for the gopatch tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Initialize logging from `RUST_LOG` or `--log-level`.
//! 3. Run the subcommand: write a patched copy, or list functions.
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use gopatch::config::{Command, Config};
use gopatch::executable::{self, buildinfo};
use gopatch::symbol::FunctionTable;
use gopatch::Patcher;

fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match config.command {
        Command::Patch {
            input,
            output,
            replacements,
        } => patch(&input, &output, &replacements),
        Command::Symbols { input, filter } => symbols(&input, filter.as_deref()),
    }
}

fn patch(input: &Path, output: &Path, replacements: &[(String, String)]) -> Result<()> {
    let mut patcher = Patcher::new();
    for (source, target) in replacements {
        patcher.register(source.as_str(), target.as_str());
    }
    // Fail on a bad plan before touching the output.
    patcher.validate()?;

    fs::copy(input, output)
        .with_context(|| format!("failed to copy {} to {}", input.display(), output.display()))?;

    if let Err(err) = patcher.patch_file(output) {
        let _ = fs::remove_file(output);
        return Err(err).with_context(|| format!("failed to patch {}", input.display()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(output)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(output, perms)?;
    }

    println!(
        "Patched {} function(s) into {}",
        replacements.len(),
        output.display()
    );
    Ok(())
}

fn symbols(input: &Path, filter: Option<&str>) -> Result<()> {
    let file = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };

    let exe = executable::by_signature(&mmap)
        .with_context(|| format!("failed to recognize {}", input.display()))?;
    let functions = FunctionTable::build(exe.symtab_data(), exe.pclntab_data(), exe.text_addr())
        .context("failed to read function table")?;

    println!("format:  {}", exe.format());
    println!("goarch:  {}", exe.goarch());
    println!("text:    0x{:x}", exe.text_addr());
    if let Some(info) = buildinfo::read(&mmap) {
        println!("go:      {}", info.go_version);
    }
    println!();

    for function in functions.iter() {
        if filter.is_some_and(|needle| !function.name.contains(needle)) {
            continue;
        }
        println!(
            "0x{:016x}-0x{:016x} {:>8} {}",
            function.entry,
            function.end,
            function.size(),
            function.name
        );
    }
    Ok(())
}
