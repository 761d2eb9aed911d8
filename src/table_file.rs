use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::chain::assemble;
use crate::error::DecodeError;
use crate::record::{dispatch_record, RecordDescriptor};
use crate::row::{extract, Credential, ServerVersion};

/// How the scan treats a fragment, decided by its record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Tags 1-6: the first fragment of a logical row.
    RowStart,
    /// Tag 0: a deleted block. Its length field spans the whole block.
    Deleted,
    /// Tags 7-13: a later piece of some chained row.
    Tail,
}

impl FragmentKind {
    pub fn classify(rec_type: u8) -> Self {
        match rec_type {
            0 => FragmentKind::Deleted,
            1..=6 => FragmentKind::RowStart,
            _ => FragmentKind::Tail,
        }
    }

    /// Distance from this fragment to the next one in the file.
    pub fn step(self, descriptor: &RecordDescriptor) -> usize {
        match self {
            FragmentKind::Deleted => descriptor.data_len,
            FragmentKind::RowStart | FragmentKind::Tail => descriptor.block_len,
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FragmentKind::RowStart => "row",
            FragmentKind::Deleted => "deleted",
            FragmentKind::Tail => "tail",
        };
        f.pad(name)
    }
}

#[derive(Debug)]
pub struct Fragment {
    pub offset: usize,
    pub kind: FragmentKind,
    pub descriptor: RecordDescriptor,
}

/// Walks a data file front to back, one physical fragment at a time.
pub struct Fragments<'a> {
    content: &'a [u8],
    cursor: Option<usize>,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor?;
        let Some(descriptor) = dispatch_record(self.content, offset) else {
            debug!(offset, "scan stopped");
            self.cursor = None;
            return None;
        };

        let kind = FragmentKind::classify(descriptor.rec_type);
        let step = kind.step(&descriptor);
        debug!(offset, rec_type = descriptor.rec_type, %kind, step, "fragment");

        self.cursor = if step == 0 {
            warn!(offset, "zero-length fragment, stopping scan");
            None
        } else {
            offset.checked_add(step)
        };

        Some(Fragment {
            offset,
            kind,
            descriptor,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub offset: usize,
    pub error: DecodeError,
}

/// Result of a credential scan: whatever decoded cleanly, plus what didn't.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub credentials: BTreeMap<String, String>,
    pub skipped: Vec<SkippedRow>,
    pub rows: usize,
}

/// A MyISAM data file loaded whole into memory.
pub struct TableFile {
    content: Bytes,
}

impl TableFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read table file {}", path.display()))?;
        debug!(path = %path.display(), size = content.len(), "loaded table file");
        Ok(Self::from_bytes(content))
    }

    pub fn from_bytes(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn fragments(&self) -> Fragments<'_> {
        Fragments {
            content: &self.content,
            cursor: Some(0),
        }
    }

    /// Every fragment that starts a logical row, in file order.
    pub fn row_headers(&self) -> Vec<RecordDescriptor> {
        self.fragments()
            .filter(|fragment| fragment.kind == FragmentKind::RowStart)
            .map(|fragment| fragment.descriptor)
            .collect()
    }

    /// Reassemble one logical row and read its credential columns.
    pub fn read_row(
        &self,
        header: &RecordDescriptor,
        version: ServerVersion,
    ) -> Result<Option<Credential>, DecodeError> {
        let row = assemble(&self.content, header)?;
        extract(&row, version)
    }

    /// Extract every account and password hash the file holds.
    ///
    /// Rows that fail to decode are logged and reported, never fatal. A later
    /// row for an account replaces an earlier one.
    pub fn read_credentials(&self, version: ServerVersion) -> ScanReport {
        let headers = self.row_headers();
        let mut report = ScanReport {
            rows: headers.len(),
            ..ScanReport::default()
        };

        for header in &headers {
            match self.read_row(header, version) {
                Ok(Some(credential)) => {
                    report
                        .credentials
                        .insert(credential.account, credential.password_hash);
                }
                Ok(None) => debug!(offset = header.offset, "row has no account name"),
                Err(error) => {
                    warn!(offset = header.offset, %error, "failed to parse record, skipping");
                    report.skipped.push(SkippedRow {
                        offset: header.offset,
                        error,
                    });
                }
            }
        }

        info!(
            rows = report.rows,
            accounts = report.credentials.len(),
            skipped = report.skipped.len(),
            %version,
            "scan finished"
        );
        report
    }
}
