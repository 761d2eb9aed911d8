pub mod chain;
pub mod commands;
pub mod error;
pub mod length;
pub mod record;
pub mod row;
pub mod table_file;

// On-disk format constants
pub const BLOCK_ALIGNMENT: usize = 4;
pub const CHAIN_POINTER_WIDTH: usize = 8;
pub const HASH_MARKER: u8 = b'*';
pub const PASSWORD_HASH_LEN: usize = 40;

// Re-export main types for convenience
pub use chain::assemble;
pub use commands::{execute_command, run_command, Command};
pub use error::DecodeError;
pub use length::read_len;
pub use record::{
    align_block, dispatch_record, RecordDescriptor, RecordHeader, RecordTypeSpec, RECORD_TYPES,
};
pub use row::{extract, Credential, ServerVersion};
pub use table_file::{Fragment, FragmentKind, ScanReport, SkippedRow, TableFile};
