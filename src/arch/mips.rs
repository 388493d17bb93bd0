//! MIPS backend.
//!
//! `J` carries an absolute word address rather than a displacement, so only the
//! target participates in the encoding and in the reach check.

use object::Endianness;

use super::{encode_word, long_distance, Architecture, IMMEDIATE_26BIT};
use crate::error::Result;

const J: u32 = 0x0800_0000;
const INSTR_INDEX_MASK: u32 = 0x03ff_ffff;

pub struct Mips {
    endian: Endianness,
}

impl Mips {
    pub fn new(endian: Endianness) -> Self {
        Self { endian }
    }
}

impl Architecture for Mips {
    fn endianness(&self) -> Endianness {
        self.endian
    }

    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>> {
        if target >> 2 > IMMEDIATE_26BIT {
            return Err(long_distance(source, target));
        }

        let index = ((target as u32) >> 2) & INSTR_INDEX_MASK;
        Ok(encode_word(J | index, self.endian))
    }
}
