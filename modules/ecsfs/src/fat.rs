use ecsvfs::{FsError, FsResult};

use crate::block::{BlockDevice, BlockId, BlockIo};
use crate::config::{
    BLOCK_SIZE, FAT_ENTRIES_PER_BLOCK, FAT_ENTRY_SIZE, FAT_EOC, FAT_FREE, FAT_START_BLOCK,
};
use crate::superblock::{read_u16, write_u16, Superblock};

/// In-memory copy of the allocation table.
///
/// Entry `i` describes data block `i` (relative to the first data block):
/// `FAT_FREE`, `FAT_EOC`, or the index of the next block in the chain.
/// Entry 0 is reserved and always reads `FAT_EOC`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<u16>,
    dirty: bool,
}

impl Fat {
    /// An empty table: every block free except the reserved entry 0.
    pub fn new(data_block_count: usize) -> Self {
        let mut entries = vec![FAT_FREE; data_block_count];
        if let Some(first) = entries.first_mut() {
            *first = FAT_EOC;
        }
        Self {
            entries,
            dirty: true,
        }
    }

    pub fn load<D: BlockDevice>(io: &mut BlockIo<D>, sb: &Superblock) -> FsResult<Self> {
        let count = sb.data_block_count as usize;
        let mut entries = Vec::with_capacity(count);
        let mut block = [0u8; BLOCK_SIZE];
        for index in 0..sb.fat_block_count as BlockId {
            io.read_block(FAT_START_BLOCK + index, &mut block)?;
            for slot in 0..FAT_ENTRIES_PER_BLOCK {
                if entries.len() == count {
                    break;
                }
                entries.push(read_u16(&block, slot * FAT_ENTRY_SIZE));
            }
        }
        if entries.len() != count {
            return Err(FsError::GeometryMismatch);
        }
        if entries.first() != Some(&FAT_EOC) {
            log::warn!("allocation table entry 0 is not end-of-chain");
            return Err(FsError::InvalidImage);
        }
        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Write the table back if it changed since the last load or flush.
    pub fn flush<D: BlockDevice>(&mut self, io: &mut BlockIo<D>, sb: &Superblock) -> FsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut block = [0u8; BLOCK_SIZE];
        for index in 0..sb.fat_block_count as usize {
            block.fill(0);
            let start = index * FAT_ENTRIES_PER_BLOCK;
            let end = core::cmp::min(start + FAT_ENTRIES_PER_BLOCK, self.entries.len());
            for (slot, value) in self.entries[start.min(end)..end].iter().enumerate() {
                write_u16(&mut block, slot * FAT_ENTRY_SIZE, *value);
            }
            io.write_block(FAT_START_BLOCK + index as BlockId, &block)?;
        }
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn entry(&self, block: u16) -> Option<u16> {
        self.entries.get(block as usize).copied()
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|entry| **entry == FAT_FREE).count()
    }

    /// Successor of `block` in its chain, `None` at the end of the chain.
    pub fn next(&self, block: u16) -> FsResult<Option<u16>> {
        self.check_member(block)?;
        match self.entries[block as usize] {
            FAT_EOC => Ok(None),
            next => {
                self.check_member(next)?;
                Ok(Some(next))
            }
        }
    }

    /// Claim the lowest free block. With a `tail`, the new block is linked after it;
    /// without one it starts a new chain.
    pub fn allocate(&mut self, tail: Option<u16>) -> FsResult<u16> {
        if let Some(tail) = tail {
            self.check_member(tail)?;
        }
        let Some(index) = self
            .entries
            .iter()
            .skip(1)
            .position(|entry| *entry == FAT_FREE)
            .map(|pos| pos + 1)
        else {
            log::warn!("no free data block left in {} entries", self.entries.len());
            return Err(FsError::DiskFull { written: 0 });
        };
        let block = index as u16;
        self.entries[index] = FAT_EOC;
        if let Some(tail) = tail {
            self.entries[tail as usize] = block;
        }
        self.dirty = true;
        log::debug!("allocated data block {} after {:?}", block, tail);
        Ok(block)
    }

    /// Undo the allocation of `block`, the last link of its chain. `tail` is the
    /// block it was linked after, if any.
    pub fn detach(&mut self, block: u16, tail: Option<u16>) -> FsResult<()> {
        if self.next(block)?.is_some() {
            return Err(FsError::CorruptedChain);
        }
        if let Some(tail) = tail {
            if self.next(tail)? != Some(block) {
                return Err(FsError::CorruptedChain);
            }
            self.entries[tail as usize] = FAT_EOC;
        }
        self.entries[block as usize] = FAT_FREE;
        self.dirty = true;
        log::debug!("released data block {} after {:?}", block, tail);
        Ok(())
    }

    /// Release every block of the chain starting at `first`. Returns the number freed.
    ///
    /// A chain that does not terminate is left as it is.
    pub fn free_chain(&mut self, first: u16) -> FsResult<usize> {
        let len = self.chain_len(first)?;
        let mut current = first;
        for _ in 0..len {
            let next = self.entries[current as usize];
            self.entries[current as usize] = FAT_FREE;
            current = next;
        }
        if len > 0 {
            self.dirty = true;
        }
        Ok(len)
    }

    /// Block holding `byte_offset` of the chain that starts at `first`.
    pub fn resolve(&self, first: u16, byte_offset: usize) -> FsResult<u16> {
        let hops = byte_offset / BLOCK_SIZE;
        if first == FAT_EOC || hops >= self.entries.len() {
            return Err(FsError::OffsetBeyondChain);
        }
        let mut current = first;
        for _ in 0..hops {
            current = self.next(current)?.ok_or(FsError::OffsetBeyondChain)?;
        }
        self.check_member(current)?;
        Ok(current)
    }

    /// Number of blocks in the chain starting at `first`.
    pub fn chain_len(&self, first: u16) -> FsResult<usize> {
        if first == FAT_EOC {
            return Ok(0);
        }
        let mut current = first;
        for len in 1..=self.entries.len() {
            match self.next(current)? {
                Some(next) => current = next,
                None => return Ok(len),
            }
        }
        log::warn!("chain starting at block {} does not terminate", first);
        Err(FsError::CorruptedChain)
    }

    // Only blocks 1..len can belong to a chain, and a member is never free.
    fn check_member(&self, block: u16) -> FsResult<()> {
        let index = block as usize;
        if index == 0 || index >= self.entries.len() || self.entries[index] == FAT_FREE {
            return Err(FsError::CorruptedChain);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemDisk;

    #[test]
    fn first_fit_skips_reserved_entry() {
        let mut fat = Fat::new(8);
        assert_eq!(fat.free_count(), 7);
        let a = fat.allocate(None).unwrap();
        assert_eq!(a, 1);
        let b = fat.allocate(Some(a)).unwrap();
        assert_eq!(b, 2);
        assert_eq!(fat.entry(a), Some(b));
        assert_eq!(fat.entry(b), Some(FAT_EOC));
        assert_eq!(fat.entry(0), Some(FAT_EOC));
        assert_eq!(fat.chain_len(a).unwrap(), 2);
    }

    #[test]
    fn allocation_reuses_lowest_free_block() {
        let mut fat = Fat::new(8);
        let a = fat.allocate(None).unwrap();
        let b = fat.allocate(None).unwrap();
        fat.allocate(Some(b)).unwrap();
        assert_eq!(fat.free_chain(a).unwrap(), 1);
        assert_eq!(fat.allocate(None).unwrap(), a);
    }

    #[test]
    fn exhaustion_reports_disk_full() {
        let mut fat = Fat::new(4);
        let mut tail = fat.allocate(None).unwrap();
        for _ in 0..2 {
            tail = fat.allocate(Some(tail)).unwrap();
        }
        assert_eq!(fat.free_count(), 0);
        assert_eq!(fat.allocate(Some(tail)), Err(FsError::DiskFull { written: 0 }));
        assert_eq!(fat.entry(tail), Some(FAT_EOC));
    }

    #[test]
    fn free_chain_clears_every_link() {
        let mut fat = Fat::new(16);
        let first = fat.allocate(None).unwrap();
        let mut tail = first;
        for _ in 0..4 {
            tail = fat.allocate(Some(tail)).unwrap();
        }
        assert_eq!(fat.free_chain(first).unwrap(), 5);
        assert_eq!(fat.free_count(), 15);
        assert_eq!(fat.free_chain(FAT_EOC).unwrap(), 0);
    }

    #[test]
    fn cycle_is_reported_not_followed() {
        let mut fat = Fat::new(8);
        let a = fat.allocate(None).unwrap();
        let b = fat.allocate(Some(a)).unwrap();
        fat.entries[b as usize] = a;
        assert_eq!(fat.chain_len(a), Err(FsError::CorruptedChain));
        assert_eq!(fat.free_chain(a), Err(FsError::CorruptedChain));
        assert_eq!(fat.entry(a), Some(b));
        assert_eq!(fat.entry(b), Some(a));
    }

    #[test]
    fn detach_undoes_allocation() {
        let mut fat = Fat::new(8);
        let a = fat.allocate(None).unwrap();
        let b = fat.allocate(Some(a)).unwrap();
        assert_eq!(fat.detach(a, None), Err(FsError::CorruptedChain));
        fat.detach(b, Some(a)).unwrap();
        assert_eq!(fat.entry(a), Some(FAT_EOC));
        assert_eq!(fat.entry(b), Some(FAT_FREE));
        fat.detach(a, None).unwrap();
        assert_eq!(fat.free_count(), 7);
    }

    #[test]
    fn out_of_range_link_is_corruption() {
        let mut fat = Fat::new(8);
        let a = fat.allocate(None).unwrap();
        fat.entries[a as usize] = 100;
        assert_eq!(fat.next(a), Err(FsError::CorruptedChain));
        assert_eq!(fat.next(0), Err(FsError::CorruptedChain));
    }

    #[test]
    fn resolve_walks_by_block() {
        let mut fat = Fat::new(8);
        let a = fat.allocate(None).unwrap();
        let _gap = fat.allocate(None).unwrap();
        let b = fat.allocate(Some(a)).unwrap();
        assert_eq!(fat.resolve(a, 0).unwrap(), a);
        assert_eq!(fat.resolve(a, BLOCK_SIZE - 1).unwrap(), a);
        assert_eq!(fat.resolve(a, BLOCK_SIZE).unwrap(), b);
        assert_eq!(fat.resolve(a, 2 * BLOCK_SIZE), Err(FsError::OffsetBeyondChain));
        assert_eq!(fat.resolve(FAT_EOC, 0), Err(FsError::OffsetBeyondChain));
    }

    #[test]
    fn flush_and_load_across_blocks() {
        let count = FAT_ENTRIES_PER_BLOCK + 10;
        let sb = Superblock::for_data_blocks(count).unwrap();
        let mut io = BlockIo::new(MemDisk::new(sb.total_block_count as usize));
        let mut fat = Fat::new(count);
        for _ in 0..FAT_ENTRIES_PER_BLOCK + 3 {
            fat.allocate(None).unwrap();
        }
        fat.flush(&mut io, &sb).unwrap();
        assert!(!fat.is_dirty());
        let loaded = Fat::load(&mut io, &sb).unwrap();
        assert_eq!(loaded.entries, fat.entries);
        assert_eq!(loaded.free_count(), count - FAT_ENTRIES_PER_BLOCK - 4);
    }

    #[test]
    fn load_rejects_unreserved_entry_zero() {
        let sb = Superblock::for_data_blocks(8).unwrap();
        let mut io = BlockIo::new(MemDisk::new(sb.total_block_count as usize));
        assert_eq!(Fat::load(&mut io, &sb), Err(FsError::InvalidImage));
    }
}
