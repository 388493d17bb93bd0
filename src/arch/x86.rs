//! x86 backend (386 and amd64).
//!
//! A single `jmp rel32`: opcode `0xE9` followed by the little-endian displacement
//! measured from the end of the instruction.

use object::Endianness;

use super::{distance, fits_signed, long_distance, Architecture, IMMEDIATE_32BIT};
use crate::error::Result;

const JMP_REL32: u8 = 0xe9;
const JMP_REL32_LEN: u64 = 5;

/// The x86 architecture backend.
pub struct X86;

impl Architecture for X86 {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn trampoline(&self, source: u64, target: u64) -> Result<Vec<u8>> {
        let displacement = target.wrapping_sub(source.wrapping_add(JMP_REL32_LEN)) as i64;
        if distance(source, target) > IMMEDIATE_32BIT || !fits_signed(displacement, 32) {
            return Err(long_distance(source, target));
        }
        let displacement = displacement as u32;

        let mut code = Vec::with_capacity(JMP_REL32_LEN as usize);
        code.push(JMP_REL32);
        code.extend_from_slice(&displacement.to_le_bytes());
        Ok(code)
    }
}
