use std::collections::HashSet;
use std::ops::Range;

use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::length::{read_len, read_u8};
use crate::{BLOCK_ALIGNMENT, CHAIN_POINTER_WIDTH};

/// Header layout of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTypeSpec {
    /// Bytes before the payload.
    pub header_len: usize,
    /// Inclusive header byte range holding the big-endian payload length.
    pub data_len_field: (usize, usize),
    /// Header byte holding the count of trailing unused bytes.
    pub unused_len_offset: Option<usize>,
    /// Start of the 8-byte absolute offset of the next fragment.
    pub next_pointer_offset: Option<usize>,
}

const fn layout(
    header_len: usize,
    data_len_field: (usize, usize),
    next_pointer_offset: Option<usize>,
    unused_len_offset: Option<usize>,
) -> RecordTypeSpec {
    RecordTypeSpec {
        header_len,
        data_len_field,
        unused_len_offset,
        next_pointer_offset,
    }
}

/// Header layouts indexed by the record type tag.
pub const RECORD_TYPES: [RecordTypeSpec; 14] = [
    layout(20, (1, 3), None, None),    // 0  deleted block
    layout(3, (1, 2), None, None),     // 1
    layout(4, (1, 3), None, None),     // 2
    layout(4, (1, 2), None, Some(3)),  // 3
    layout(5, (1, 3), None, Some(4)),  // 4
    layout(13, (3, 4), Some(5), None), // 5  first fragment of a chained row
    layout(15, (4, 6), Some(7), None), // 6
    layout(3, (1, 2), None, None),     // 7
    layout(4, (1, 3), None, None),     // 8
    layout(4, (1, 2), None, Some(3)),  // 9
    layout(5, (1, 3), None, Some(4)),  // 10
    layout(11, (1, 2), Some(3), None), // 11
    layout(12, (1, 3), Some(4), None), // 12
    layout(16, (5, 7), Some(8), None), // 13
];

impl RecordTypeSpec {
    pub fn for_tag(tag: u8) -> Option<&'static RecordTypeSpec> {
        RECORD_TYPES.get(usize::from(tag))
    }
}

/// Round `len` up to the next multiple of the on-disk block alignment.
pub fn align_block(len: usize) -> usize {
    match len % BLOCK_ALIGNMENT {
        0 => len,
        rem => len - rem + BLOCK_ALIGNMENT,
    }
}

/// One decoded fragment header, without following its chain pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub offset: usize,
    pub rec_type: u8,
    pub data_begin: usize,
    pub data_len: usize,
    pub block_len: usize,
    pub next_pointer: Option<u64>,
}

impl RecordHeader {
    pub fn parse(content: &[u8], offset: usize) -> Result<Self> {
        let rec_type = read_u8(content, offset)?;
        let spec = RecordTypeSpec::for_tag(rec_type).ok_or(DecodeError::UnknownRecordType {
            tag: rec_type,
            offset,
        })?;

        let (len_start, len_end) = spec.data_len_field;
        let data_len = read_len(content, offset + len_start, offset + len_end + 1)?;
        // A payload larger than the whole file can only come from garbage bytes.
        if data_len > content.len() as u64 {
            return Err(DecodeError::OutOfBounds {
                offset,
                len: usize::try_from(data_len).unwrap_or(usize::MAX),
                available: content.len(),
            });
        }
        let data_len = data_len as usize;

        let unused_len = match spec.unused_len_offset {
            Some(at) => usize::from(read_u8(content, offset + at)?),
            None => 0,
        };

        let next_pointer = match spec.next_pointer_offset {
            Some(at) => Some(read_len(
                content,
                offset + at,
                offset + at + CHAIN_POINTER_WIDTH,
            )?),
            None => None,
        };

        Ok(RecordHeader {
            offset,
            rec_type,
            data_begin: offset + spec.header_len,
            data_len,
            block_len: align_block(spec.header_len + data_len + unused_len),
            next_pointer,
        })
    }
}

/// A fragment and, through `next`, the rest of the logical row it starts.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub offset: usize,
    pub rec_type: u8,
    pub data_begin: usize,
    pub data_len: usize,
    pub block_len: usize,
    pub next: Option<Box<RecordDescriptor>>,
}

impl From<RecordHeader> for RecordDescriptor {
    fn from(header: RecordHeader) -> Self {
        RecordDescriptor {
            offset: header.offset,
            rec_type: header.rec_type,
            data_begin: header.data_begin,
            data_len: header.data_len,
            block_len: header.block_len,
            next: None,
        }
    }
}

impl RecordDescriptor {
    pub fn payload_range(&self) -> Range<usize> {
        self.data_begin..self.data_begin.saturating_add(self.data_len)
    }

    /// This fragment's payload bytes within `content`.
    pub fn payload<'a>(&self, content: &'a [u8]) -> Result<&'a [u8]> {
        content
            .get(self.payload_range())
            .ok_or(DecodeError::OutOfBounds {
                offset: self.data_begin,
                len: self.data_len,
                available: content.len(),
            })
    }

    /// Iterate over this fragment and every fragment chained after it.
    pub fn iter(&self) -> Chain<'_> {
        Chain { next: Some(self) }
    }

    pub fn chain_len(&self) -> usize {
        self.iter().count()
    }
}

// Unlink iteratively so dropping a long chain does not recurse once per fragment.
impl Drop for RecordDescriptor {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut fragment) = next {
            next = fragment.next.take();
        }
    }
}

pub struct Chain<'a> {
    next: Option<&'a RecordDescriptor>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a RecordDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next.as_deref();
        Some(current)
    }
}

/// Decode the fragment at `offset` and every fragment its chain pointers reach.
///
/// Returns `None` at end of file and for any header that cannot be decoded.
/// A chain link that fails to decode ends the chain. A pointer back to an
/// offset already in the chain is kept as the final link, unfollowed, so
/// assembly can reject the row.
pub fn dispatch_record(content: &[u8], offset: usize) -> Option<RecordDescriptor> {
    if offset >= content.len() {
        return None;
    }
    let head = match RecordHeader::parse(content, offset) {
        Ok(header) => header,
        Err(error) => {
            trace!(offset, %error, "no record at offset");
            return None;
        }
    };

    let mut visited = HashSet::from([offset]);
    let mut links = Vec::new();
    let mut pending = head.next_pointer;
    while let Some(pointer) = pending.take() {
        let Ok(next_offset) = usize::try_from(pointer) else {
            trace!(offset, pointer, "chain pointer does not fit in memory");
            break;
        };
        if next_offset >= content.len() {
            trace!(offset, next_offset, "chain pointer past end of file");
            break;
        }
        let header = match RecordHeader::parse(content, next_offset) {
            Ok(header) => header,
            Err(error) => {
                trace!(offset, next_offset, %error, "chain ends at undecodable fragment");
                break;
            }
        };
        if visited.insert(next_offset) {
            pending = header.next_pointer;
        }
        links.push(header);
    }

    let mut next: Option<Box<RecordDescriptor>> = None;
    for header in links.into_iter().rev() {
        let mut descriptor = RecordDescriptor::from(header);
        descriptor.next = next;
        next = Some(Box::new(descriptor));
    }
    let mut descriptor = RecordDescriptor::from(head);
    descriptor.next = next;
    Some(descriptor)
}
