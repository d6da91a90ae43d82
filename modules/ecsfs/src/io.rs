//! Byte-granular reads and writes over block chains.

use core::cmp::min;

use ecsvfs::{Fd, FsError, FsResult};

use crate::block::BlockDevice;
use crate::config::{BLOCK_SIZE, FAT_EOC};
use crate::fs::FileSystem;

impl<D: BlockDevice> FileSystem<D> {
    /// Read from the descriptor's offset into `buf`, advancing the offset.
    ///
    /// Reads stop at end of file, so the count may be shorter than `buf`.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> FsResult<usize> {
        let file = *self.fds.get(fd)?;
        let entry = *self.dir.entry(file.entry);
        let size = entry.size as usize;
        if buf.is_empty() || file.offset >= size {
            return Ok(0);
        }
        let to_read = min(buf.len(), size - file.offset);
        let mut block = self.fat.resolve(entry.first_block, file.offset)?;
        let mut in_block = file.offset % BLOCK_SIZE;
        let mut bounce = [0u8; BLOCK_SIZE];
        let mut total = 0usize;
        loop {
            let block_id = self.data_block_id(block);
            self.io.read_block(block_id, &mut bounce)?;
            let chunk = min(to_read - total, BLOCK_SIZE - in_block);
            buf[total..total + chunk].copy_from_slice(&bounce[in_block..in_block + chunk]);
            total += chunk;
            self.fds.get_mut(fd)?.offset += chunk;
            if total == to_read {
                break;
            }
            in_block = 0;
            match self.fat.next(block)? {
                Some(next) => block = next,
                None => break,
            }
        }
        Ok(total)
    }

    /// Write `data` at the descriptor's offset, growing the file's chain as needed.
    ///
    /// If the disk fills up part way, the bytes already stored stay stored and
    /// the error carries their count. A block allocated for a chunk that then
    /// fails to reach the device is released again.
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        let file = *self.fds.get(fd)?;
        if data.is_empty() {
            return Ok(0);
        }
        let mut offset = file.offset;
        let (mut block, mut fresh) = self.block_for_write(file.entry, offset)?;
        let mut total = 0usize;
        loop {
            let in_block = offset % BLOCK_SIZE;
            let chunk = min(data.len() - total, BLOCK_SIZE - in_block);
            if let Err(err) = self.store(block, in_block, &data[total..total + chunk]) {
                if let Some(attach) = fresh {
                    self.detach(block, attach)?;
                }
                return Err(err);
            }
            total += chunk;
            offset += chunk;
            self.fds.get_mut(fd)?.offset = offset;
            if offset > self.dir.entry(file.entry).size as usize {
                self.dir.set_size(file.entry, offset as u32);
            }
            if total == data.len() {
                break;
            }
            (block, fresh) = match self.fat.next(block)? {
                Some(next) => (next, None),
                None => match self.fat.allocate(Some(block)) {
                    Ok(next) => (next, Some(Attach::After(block))),
                    Err(FsError::DiskFull { .. }) => {
                        return Err(FsError::DiskFull { written: total });
                    }
                    Err(err) => return Err(err),
                },
            };
        }
        Ok(total)
    }

    // Read-modify-write of one data block.
    fn store(&mut self, block: u16, in_block: usize, bytes: &[u8]) -> FsResult<()> {
        let block_id = self.data_block_id(block);
        let mut bounce = [0u8; BLOCK_SIZE];
        self.io.read_block(block_id, &mut bounce)?;
        bounce[in_block..in_block + bytes.len()].copy_from_slice(bytes);
        self.io.write_block(block_id, &bounce)
    }

    // Block holding `offset`, extending the chain by one block when the
    // offset sits exactly at its end. A new block comes back with where it hangs.
    fn block_for_write(&mut self, entry: usize, offset: usize) -> FsResult<(u16, Option<Attach>)> {
        let hops = offset / BLOCK_SIZE;
        let first = self.dir.entry(entry).first_block;
        if first == FAT_EOC {
            if hops > 0 {
                return Err(FsError::OffsetBeyondChain);
            }
            let block = self.fat.allocate(None)?;
            self.dir.set_first_block(entry, block);
            return Ok((block, Some(Attach::Head(entry))));
        }
        let mut current = self.fat.resolve(first, 0)?;
        for hop in 0..hops {
            current = match self.fat.next(current)? {
                Some(next) => next,
                None if hop + 1 == hops => {
                    let block = self.fat.allocate(Some(current))?;
                    return Ok((block, Some(Attach::After(current))));
                }
                None => return Err(FsError::OffsetBeyondChain),
            };
        }
        Ok((current, None))
    }

    fn detach(&mut self, block: u16, attach: Attach) -> FsResult<()> {
        match attach {
            Attach::Head(entry) => {
                self.fat.detach(block, None)?;
                self.dir.set_first_block(entry, FAT_EOC);
            }
            Attach::After(tail) => self.fat.detach(block, Some(tail))?,
        }
        Ok(())
    }
}

/// Where a block allocated during a write was hung.
#[derive(Clone, Copy, Debug)]
enum Attach {
    /// First block of the file in this directory slot.
    Head(usize),
    /// Linked after this block.
    After(u16),
}
