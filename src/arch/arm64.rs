//! AArch64 backend.
//!
//! Unconditional `B`: opcode `0b000101` in the top six bits and a 26-bit signed
//! word offset relative to the branch itself.

use object::Endianness;

use super::{distance, encode_word, fits_signed, long_distance, Architecture, IMMEDIATE_26BIT};
use crate::error::Result;

const B: u32 = 0x1400_0000;
const IMM26_MASK: u32 = 0x03ff_ffff;

pub struct Arm64 {
    endian: Endianness,
}

impl Arm64 {
    pub fn new(endian: Endianness) -> Self {
        Self { endian }
    }
}

impl Architecture for Arm64 {
    fn endianness(&self) -> Endianness {
        self.endian
    }

    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>> {
        let offset = (target.wrapping_sub(source) as i64) >> 2;
        if distance(source, target) >> 2 > IMMEDIATE_26BIT || !fits_signed(offset, 26) {
            return Err(long_distance(source, target));
        }

        Ok(encode_word(B | (offset as u32 & IMM26_MASK), self.endian))
    }
}
