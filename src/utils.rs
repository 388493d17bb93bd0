//! Utility functions.

/// Returns the bytes of the NUL-terminated string at the start of `data`,
/// without the terminator. `None` when no terminator is present.
pub fn read_cstr(data: &[u8]) -> Option<&[u8]> {
    let len = data.iter().position(|&b| b == 0)?;
    Some(&data[..len])
}

/// Reads an unsigned LEB128 varint, returning the value and the number of bytes consumed.
pub fn read_uvarint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
