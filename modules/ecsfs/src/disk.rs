//! File-backed block device.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use ecsvfs::{DeviceFault, FsError, FsResult};

use crate::block::{BlockDevice, BlockId, OpenDevice};
use crate::config::BLOCK_SIZE;

/// Map a host i/o failure onto the device fault it reports.
pub fn device_error(err: io::Error) -> FsError {
    let fault = match err.kind() {
        ErrorKind::NotFound => DeviceFault::NotFound,
        ErrorKind::PermissionDenied => DeviceFault::PermissionDenied,
        ErrorKind::UnexpectedEof => DeviceFault::OutOfRange,
        ErrorKind::InvalidInput => DeviceFault::InvalidRequest,
        _ => DeviceFault::Other,
    };
    FsError::DeviceIo(fault)
}

/// A disk image stored in a regular file.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    block_count: usize,
}

impl FileDisk {
    /// Open an existing image read-write.
    pub fn open_path(path: impl AsRef<Path>) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(device_error)?;
        let len = file.metadata().map_err(device_error)?.len() as usize;
        if len % BLOCK_SIZE != 0 {
            return Err(FsError::DeviceIo(DeviceFault::Misaligned));
        }
        Ok(Self {
            file,
            block_count: len / BLOCK_SIZE,
        })
    }

    /// Create (or truncate) an image of `block_count` zeroed blocks.
    pub fn create(path: impl AsRef<Path>, block_count: usize) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(device_error)?;
        file.set_len((block_count * BLOCK_SIZE) as u64).map_err(device_error)?;
        Ok(Self { file, block_count })
    }

    fn seek_to(&mut self, block_id: BlockId) -> FsResult<()> {
        if block_id >= self.block_count as BlockId {
            return Err(FsError::DeviceIo(DeviceFault::OutOfRange));
        }
        self.file
            .seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))
            .map_err(device_error)?;
        Ok(())
    }
}

impl OpenDevice for FileDisk {
    fn open(name: &str) -> FsResult<Self> {
        Self::open_path(name)
    }
}

impl BlockDevice for FileDisk {
    fn block_count(&self) -> usize {
        self.block_count
    }

    fn read_block(&mut self, block_id: BlockId, buf: &mut [u8]) -> FsResult<()> {
        self.seek_to(block_id)?;
        self.file
            .read_exact(&mut buf[..BLOCK_SIZE])
            .map_err(device_error)
    }

    fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> FsResult<()> {
        self.seek_to(block_id)?;
        self.file
            .write_all(&buf[..BLOCK_SIZE])
            .map_err(device_error)
    }

    fn close(&mut self) -> FsResult<()> {
        self.file.sync_all().map_err(device_error)
    }
}
