//! Read-only byte sources backing a patch history.
//!
//! The history never reads the whole document: it asks a [`BinarySource`]
//! for exact byte ranges, and only while consolidating entries that cannot
//! be folded by offset arithmetic alone. Reads may block on I/O; nothing
//! here writes back.

use std::fs::File;
use std::os::unix::fs::FileExt;

use anyhow::{bail, Context, Result};

/// Capability to read byte ranges from the authoritative, pre-history data.
///
/// Offsets are absolute positions in the original document. Implementations
/// must fill the whole target slice or fail; short reads are errors.
pub trait BinarySource {
    /// Fill `target` with `target.len()` bytes starting at `offset`.
    fn read_into(&self, offset: u64, target: &mut [u8]) -> Result<()>;
}

/// A [`BinarySource`] over an open file, reading with positioned I/O so no
/// seek state is shared with other users of the handle.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn new(file: File) -> FileSource {
        FileSource { file }
    }
}

impl BinarySource for FileSource {
    fn read_into(&self, offset: u64, target: &mut [u8]) -> Result<()> {
        self.file.read_exact_at(target, offset).with_context(|| {
            format!(
                "failed reading {} bytes at offset {} from backing file",
                target.len(),
                offset
            )
        })
    }
}

/// A [`BinarySource`] over an in-memory byte vector. Useful for tests and
/// for documents small enough to hold resident.
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> MemorySource {
        MemorySource {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl BinarySource for MemorySource {
    fn read_into(&self, offset: u64, target: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + target.len();
        if end > self.bytes.len() {
            bail!(
                "read of {}..{} past end of {}-byte memory source",
                start,
                end,
                self.bytes.len()
            );
        }
        target.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }
}
