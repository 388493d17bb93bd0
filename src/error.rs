//! Error types shared by every stage of patching.

use std::fmt;

use thiserror::Error as ThisError;

/// Container formats understood by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Elf,
    MachO,
    Pe,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Elf => "elf",
            Format::MachO => "mach-o",
            Format::Pe => "pe",
        })
    }
}

/// Which end of a replacement a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Target => "target",
        })
    }
}

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("unknown executable format")]
    UnknownFormat,

    /// The bytes are not a container of this kind at all.
    #[error("{format}: not recognized: {reason}")]
    NotFormat { format: Format, reason: String },

    /// The container was recognized but lacks what a Go executable carries.
    #[error("{format}: not a go executable: {reason}")]
    NotGo { format: Format, reason: String },

    #[error("line table: {0}")]
    LineTable(String),

    #[error("{side} function {name} was not found")]
    FunctionNotFound { side: Side, name: String },

    #[error("unsupported cpu architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("long distance between functions: 0x{from:x} -> 0x{to:x}")]
    LongDistance { from: u64, to: u64 },

    #[error("too short function {name}: {size} bytes, trampoline needs {needed}")]
    ShortFunction { name: String, size: u64, needed: usize },

    #[error("cyclic replacement detected at {function}")]
    CyclicReplacement { function: String },

    #[error("write of {len} bytes at offset 0x{offset:x} is outside the executable")]
    OutOfBounds { offset: i64, len: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_go(format: Format, reason: impl Into<String>) -> Self {
        Error::NotGo { format, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
