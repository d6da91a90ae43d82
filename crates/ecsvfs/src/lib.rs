#![no_std]

// Shared vocabulary for the flat FAT filesystem: error kinds, handles, listing records.

use core::fmt;

use thiserror::Error;

/// Index of a slot in the open-file table.
pub type Fd = usize;

/// Size of an on-disk name buffer, including the terminating NUL.
pub const FILENAME_LEN: usize = 16;

/// Longest name a file may carry.
pub const MAX_NAME_LEN: usize = FILENAME_LEN - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no filesystem is mounted")]
    NotMounted,
    #[error("a filesystem is already mounted")]
    AlreadyMounted,
    #[error("disk image has no valid signature")]
    InvalidImage,
    #[error("superblock geometry does not match the device")]
    GeometryMismatch,
    #[error("file name is empty, too long or malformed")]
    InvalidName,
    #[error("file already exists")]
    AlreadyExists,
    #[error("file not found")]
    NotFound,
    #[error("root directory is full")]
    DirectoryFull,
    #[error("file is still open")]
    FileOpen,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("offset is past the end of the file")]
    OffsetOutOfRange,
    #[error("offset is past the end of the block chain")]
    OffsetBeyondChain,
    #[error("allocation table chain is corrupted")]
    CorruptedChain,
    #[error("disk full after writing {written} bytes")]
    DiskFull { written: usize },
    #[error("block device error: {0}")]
    DeviceIo(DeviceFault),
}

/// What went wrong below the filesystem, at the block device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DeviceFault {
    #[error("request outside the device or with a short buffer")]
    InvalidRequest,
    #[error("device size is not a whole number of blocks")]
    Misaligned,
    #[error("block is past the end of the device")]
    OutOfRange,
    #[error("device not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("i/o failure")]
    Other,
}

pub type FsResult<T> = core::result::Result<T, FsError>;

/// One occupied directory slot, as reported by a listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name_len: u8,
    pub name: [u8; FILENAME_LEN],
    pub size: u32,
    pub first_block: u16,
}

impl DirEntry {
    pub const fn empty() -> Self {
        Self {
            name_len: 0,
            name: [0; FILENAME_LEN],
            size: 0,
            first_block: 0,
        }
    }

    pub fn set_name(&mut self, name: &[u8]) -> FsResult<()> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(FsError::InvalidName);
        }
        let len = name.len();
        self.name = [0; FILENAME_LEN];
        self.name[..len].copy_from_slice(name);
        self.name_len = len as u8;
        Ok(())
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("file: ")?;
        for chunk in self.name().utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        write!(f, ", size: {}, data_blk: {}", self.size, self.first_block)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::ToString;

    use super::*;

    #[test]
    fn name_limits() {
        let mut entry = DirEntry::empty();
        entry.set_name(b"a.txt").unwrap();
        assert_eq!(entry.name(), b"a.txt");
        assert_eq!(entry.set_name(&[b'x'; FILENAME_LEN]), Err(FsError::InvalidName));
        assert_eq!(entry.set_name(b""), Err(FsError::InvalidName));
        entry.set_name(&[b'y'; MAX_NAME_LEN]).unwrap();
        assert_eq!(entry.name().len(), MAX_NAME_LEN);
    }

    #[test]
    fn listing_line() {
        let mut entry = DirEntry::empty();
        entry.set_name(b"notes").unwrap();
        entry.size = 5000;
        entry.first_block = 3;
        assert_eq!(entry.to_string(), "file: notes, size: 5000, data_blk: 3");
    }

    #[test]
    fn shorter_name_clears_the_old_one() {
        let mut entry = DirEntry::empty();
        entry.set_name(b"longer.txt").unwrap();
        entry.set_name(b"ab").unwrap();
        assert_eq!(entry.name(), b"ab");
        assert!(entry.name[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn lossy_names_and_fault_text() {
        let mut entry = DirEntry::empty();
        entry.set_name(&[b'a', 0xff, b'b']).unwrap();
        assert_eq!(entry.to_string(), "file: a\u{FFFD}b, size: 0, data_blk: 0");
        assert_eq!(
            FsError::DeviceIo(DeviceFault::OutOfRange).to_string(),
            "block device error: block is past the end of the device"
        );
    }
}
