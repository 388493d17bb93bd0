//! Architecture abstraction.
//!
//! This module defines the `Architecture` trait, which encapsulates the branch encoding of
//! each supported instruction set. The replacer stays generic while the backends handle
//! immediate-field layouts, byte order and reach limits.

use object::{Endian, Endianness};

use crate::error::{Error, Result};

pub mod arm;
pub mod arm64;
pub mod mips;
pub mod riscv;
pub mod x86;

pub const IMMEDIATE_32BIT: u64 = u32::MAX as u64;
pub const IMMEDIATE_26BIT: u64 = IMMEDIATE_32BIT >> 6;
pub const IMMEDIATE_24BIT: u64 = IMMEDIATE_26BIT >> 2;
pub const IMMEDIATE_20BIT: u64 = IMMEDIATE_24BIT >> 4;

/// A trait representing a target instruction set (e.g., amd64, arm64).
pub trait Architecture {
    /// Byte order of the emitted instruction words.
    fn endianness(&self) -> Endianness;

    /// Encodes an unconditional direct branch that, placed at `source`,
    /// transfers control to `target`.
    ///
    /// Fails with [`Error::LongDistance`] when the distance does not fit the
    /// branch immediate. Whether the result fits the function body is the
    /// caller's concern.
    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>>;
}

/// Picks the trampoline generator for a `GOARCH` identifier.
pub fn from_goarch(goarch: &str) -> Result<Box<dyn Architecture>> {
    let arch: Box<dyn Architecture> = match goarch {
        "amd64" | "386" => Box::new(x86::X86),
        "arm" => Box::new(arm::Arm::new(Endianness::Little)),
        "armbe" => Box::new(arm::Arm::new(Endianness::Big)),
        "arm64" => Box::new(arm64::Arm64::new(Endianness::Little)),
        "arm64be" => Box::new(arm64::Arm64::new(Endianness::Big)),
        "mipsle" | "mips64le" => Box::new(mips::Mips::new(Endianness::Little)),
        "mips" | "mips64" => Box::new(mips::Mips::new(Endianness::Big)),
        "riscv" | "riscv64" => Box::new(riscv::Riscv),
        other => return Err(Error::UnsupportedArchitecture(other.to_string())),
    };
    Ok(arch)
}

/// Absolute distance between two code addresses.
pub(crate) fn distance(a: u64, b: u64) -> u64 {
    a.abs_diff(b)
}

/// Whether `value` is representable as a `bits`-wide two's-complement immediate.
pub(crate) fn fits_signed(value: i64, bits: u32) -> bool {
    let half = 1i64 << (bits - 1);
    (-half..half).contains(&value)
}

pub(crate) fn long_distance(source: u64, target: u64) -> Error {
    Error::LongDistance { from: source, to: target }
}

pub(crate) fn encode_word(word: u32, endian: Endianness) -> Vec<u8> {
    endian.write_u32_bytes(word).to_vec()
}
