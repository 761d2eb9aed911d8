use thiserror::Error;

/// Everything that can go wrong while decoding fragments and rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    #[error("invalid byte range {begin}..{end}")]
    InvalidRange { begin: usize, end: usize },

    #[error("length field of {width} bytes does not fit in 64 bits")]
    LengthTooWide { width: usize },

    #[error("unknown record type {tag} at offset {offset}")]
    UnknownRecordType { tag: u8, offset: usize },

    #[error("malformed row: {reason}")]
    MalformedRow { reason: String },

    #[error("fragment chain revisits offset {offset}")]
    ChainCycle { offset: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
