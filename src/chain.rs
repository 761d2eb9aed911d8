use std::collections::HashSet;

use bytes::{Bytes, BytesMut};

use crate::error::{DecodeError, Result};
use crate::record::RecordDescriptor;

/// Concatenate the payload of every fragment in `descriptor`'s chain, in chain order.
///
/// A fragment offset seen twice is a corrupt chain and fails the whole row.
pub fn assemble(content: &[u8], descriptor: &RecordDescriptor) -> Result<Bytes> {
    let mut row = BytesMut::with_capacity(descriptor.data_len);
    let mut visited = HashSet::new();

    for fragment in descriptor.iter() {
        if !visited.insert(fragment.offset) {
            return Err(DecodeError::ChainCycle {
                offset: fragment.offset,
            });
        }
        row.extend_from_slice(fragment.payload(content)?);
    }

    Ok(row.freeze())
}
