use ecsvfs::{DeviceFault, FsError, FsResult};

use crate::config::BLOCK_SIZE;

pub type BlockId = u64;

/// Fixed-size block storage underneath the filesystem.
///
/// Every transfer moves exactly `BLOCK_SIZE` bytes.
pub trait BlockDevice {
    fn block_count(&self) -> usize;
    fn read_block(&mut self, block_id: BlockId, buf: &mut [u8]) -> FsResult<()>;
    fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> FsResult<()>;
    fn close(&mut self) -> FsResult<()>;
}

/// A device that can be located and opened by name.
pub trait OpenDevice: BlockDevice + Sized {
    fn open(name: &str) -> FsResult<Self>;
}

/// Length- and range-checked access to a device.
pub struct BlockIo<D> {
    device: D,
    block_count: usize,
}

impl<D: BlockDevice> BlockIo<D> {
    pub fn new(device: D) -> Self {
        let block_count = device.block_count();
        Self {
            device,
            block_count,
        }
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn read_block(&mut self, block_id: BlockId, buf: &mut [u8]) -> FsResult<()> {
        self.check(block_id, buf.len())?;
        log::trace!("read block {}", block_id);
        self.device.read_block(block_id, &mut buf[..BLOCK_SIZE])
    }

    pub fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> FsResult<()> {
        self.check(block_id, buf.len())?;
        log::trace!("write block {}", block_id);
        self.device.write_block(block_id, &buf[..BLOCK_SIZE])
    }

    pub fn close(&mut self) -> FsResult<()> {
        self.device.close()
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    fn check(&self, block_id: BlockId, len: usize) -> FsResult<()> {
        if len < BLOCK_SIZE || block_id >= self.block_count as BlockId {
            return Err(FsError::DeviceIo(DeviceFault::InvalidRequest));
        }
        Ok(())
    }
}

/// Memory-backed device.
#[derive(Clone, Debug)]
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    pub fn new(block_count: usize) -> Self {
        Self {
            data: vec![0; block_count * BLOCK_SIZE],
        }
    }

    pub fn from_image(data: Vec<u8>) -> FsResult<Self> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(FsError::DeviceIo(DeviceFault::Misaligned));
        }
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn span(&self, block_id: BlockId) -> FsResult<core::ops::Range<usize>> {
        let offset = block_id as usize * BLOCK_SIZE;
        if offset + BLOCK_SIZE > self.data.len() {
            return Err(FsError::DeviceIo(DeviceFault::OutOfRange));
        }
        Ok(offset..offset + BLOCK_SIZE)
    }
}

impl BlockDevice for MemDisk {
    fn block_count(&self) -> usize {
        self.data.len() / BLOCK_SIZE
    }

    fn read_block(&mut self, block_id: BlockId, buf: &mut [u8]) -> FsResult<()> {
        let span = self.span(block_id)?;
        buf[..BLOCK_SIZE].copy_from_slice(&self.data[span]);
        Ok(())
    }

    fn write_block(&mut self, block_id: BlockId, buf: &[u8]) -> FsResult<()> {
        let span = self.span(block_id)?;
        self.data[span].copy_from_slice(&buf[..BLOCK_SIZE]);
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_io_passthrough() {
        let mut io = BlockIo::new(MemDisk::new(2));
        let buf = [7u8; BLOCK_SIZE];
        io.write_block(1, &buf).unwrap();
        let mut read = [0u8; BLOCK_SIZE];
        io.read_block(1, &mut read).unwrap();
        assert_eq!(read, buf);
        assert_eq!(&io.into_inner().as_bytes()[BLOCK_SIZE..], &buf[..]);
    }

    #[test]
    fn block_io_rejects_bad_requests() {
        let mut io = BlockIo::new(MemDisk::new(2));
        let mut short = [0u8; 16];
        assert_eq!(
            io.read_block(0, &mut short),
            Err(FsError::DeviceIo(DeviceFault::InvalidRequest))
        );
        let buf = [0u8; BLOCK_SIZE];
        assert_eq!(
            io.write_block(2, &buf),
            Err(FsError::DeviceIo(DeviceFault::InvalidRequest))
        );
    }

    #[test]
    fn mem_disk_from_image() {
        assert!(MemDisk::from_image(vec![0; BLOCK_SIZE + 1]).is_err());
        let disk = MemDisk::from_image(vec![0; 3 * BLOCK_SIZE]).unwrap();
        assert_eq!(disk.block_count(), 3);
    }
}
