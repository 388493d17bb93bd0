//! RISC-V backend.
//!
//! `jal zero, offset` (J-type). The immediate is scattered across the word as
//! `imm[20|10:1|11|19:12]` in bits 31..12.

use object::Endianness;

use super::{distance, encode_word, long_distance, Architecture, IMMEDIATE_20BIT};
use crate::error::Result;

const JAL_X0: u32 = 0x6f;

pub struct Riscv;

impl Architecture for Riscv {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>> {
        if distance(source, target) > IMMEDIATE_20BIT {
            return Err(long_distance(source, target));
        }

        let diff = target.wrapping_sub(source) as u32;
        let instr = ((diff >> 20) & 0x1) << 31
            | ((diff >> 1) & 0x3ff) << 21
            | ((diff >> 11) & 0x1) << 20
            | ((diff >> 12) & 0xff) << 12
            | JAL_X0;
        Ok(encode_word(instr, self.endianness()))
    }
}
