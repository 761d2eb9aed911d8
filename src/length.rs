use crate::error::{DecodeError, Result};

/// Read `data[begin..end]` as a big-endian unsigned integer.
/// Fails instead of reading past the buffer; widths above 8 bytes are rejected.
pub fn read_len(data: &[u8], begin: usize, end: usize) -> Result<u64> {
    if end < begin {
        return Err(DecodeError::InvalidRange { begin, end });
    }
    let width = end - begin;
    if end > data.len() {
        return Err(DecodeError::OutOfBounds {
            offset: begin,
            len: width,
            available: data.len(),
        });
    }
    if width > 8 {
        return Err(DecodeError::LengthTooWide { width });
    }

    let value = data[begin..end]
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
    Ok(value)
}

/// Read the single byte at `offset`.
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or(DecodeError::OutOfBounds {
        offset,
        len: 1,
        available: data.len(),
    })
}
