//! 32-bit ARM backend.
//!
//! `B` with condition "always": the low 24 bits hold the signed word offset from
//! the instruction address plus 8 (the pipeline-visible PC).

use object::Endianness;

use super::{distance, encode_word, fits_signed, long_distance, Architecture, IMMEDIATE_24BIT};
use crate::error::Result;

const B_AL: u32 = 0xea00_0000;
const OFFSET_MASK: u32 = 0x00ff_ffff;
const PC_BIAS: u64 = 8;

pub struct Arm {
    endian: Endianness,
}

impl Arm {
    pub fn new(endian: Endianness) -> Self {
        Self { endian }
    }
}

impl Architecture for Arm {
    fn endianness(&self) -> Endianness {
        self.endian
    }

    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>> {
        let offset = (target.wrapping_sub(source).wrapping_sub(PC_BIAS) as i64) >> 2;
        if distance(source, target) >> 2 > IMMEDIATE_24BIT || !fits_signed(offset, 24) {
            return Err(long_distance(source, target));
        }

        Ok(encode_word(B_AL | (offset as u32 & OFFSET_MASK), self.endian))
    }
}
