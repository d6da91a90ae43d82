use ecsvfs::{DirEntry, FsError, FsResult, FILENAME_LEN, MAX_NAME_LEN};

use crate::block::{BlockDevice, BlockId, BlockIo};
use crate::config::{BLOCK_SIZE, DIR_RECORD_SIZE, FAT_EOC, FS_FILE_MAX_COUNT};
use crate::superblock::{read_u16, read_u32, write_u16, write_u32, Superblock};

const RECORD_SIZE_OFFSET: usize = 16;
const RECORD_FIRST_BLOCK_OFFSET: usize = 20;

/// One slot of the root directory. An empty first name byte marks the slot unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileEntry {
    name: [u8; FILENAME_LEN],
    pub size: u32,
    pub first_block: u16,
}

impl FileEntry {
    const EMPTY: Self = Self {
        name: [0; FILENAME_LEN],
        size: 0,
        first_block: FAT_EOC,
    };

    pub fn is_used(&self) -> bool {
        self.name[0] != 0
    }

    pub fn name(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|ch| *ch == 0)
            .unwrap_or(FILENAME_LEN);
        &self.name[..len]
    }

    fn parse(record: &[u8]) -> FsResult<Self> {
        let mut name = [0u8; FILENAME_LEN];
        name.copy_from_slice(&record[..FILENAME_LEN]);
        if name[0] == 0 {
            return Ok(Self::EMPTY);
        }
        if !name.contains(&0) {
            return Err(FsError::InvalidImage);
        }
        Ok(Self {
            name,
            size: read_u32(record, RECORD_SIZE_OFFSET),
            first_block: read_u16(record, RECORD_FIRST_BLOCK_OFFSET),
        })
    }

    fn encode(&self, record: &mut [u8]) {
        record[..DIR_RECORD_SIZE].fill(0);
        if !self.is_used() {
            return;
        }
        record[..FILENAME_LEN].copy_from_slice(&self.name);
        write_u32(record, RECORD_SIZE_OFFSET, self.size);
        write_u16(record, RECORD_FIRST_BLOCK_OFFSET, self.first_block);
    }

    fn to_dir_entry(&self) -> FsResult<DirEntry> {
        let mut entry = DirEntry::empty();
        entry.set_name(self.name())?;
        entry.size = self.size;
        entry.first_block = self.first_block;
        Ok(entry)
    }
}

/// Check that `name` fits a directory slot.
pub fn validate_name(name: &str) -> FsResult<&[u8]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_NAME_LEN || bytes.contains(&0) {
        return Err(FsError::InvalidName);
    }
    Ok(bytes)
}

/// The single flat directory, held in memory while mounted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    entries: [FileEntry; FS_FILE_MAX_COUNT],
    dirty: bool,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: [FileEntry::EMPTY; FS_FILE_MAX_COUNT],
            dirty: true,
        }
    }

    pub fn load<D: BlockDevice>(io: &mut BlockIo<D>, sb: &Superblock) -> FsResult<Self> {
        let mut block = [0u8; BLOCK_SIZE];
        io.read_block(sb.root_dir_block as BlockId, &mut block)?;
        let mut entries = [FileEntry::EMPTY; FS_FILE_MAX_COUNT];
        for (slot, record) in entries.iter_mut().zip(block.chunks_exact(DIR_RECORD_SIZE)) {
            *slot = FileEntry::parse(record)?;
        }
        Ok(Self {
            entries,
            dirty: false,
        })
    }

    pub fn flush<D: BlockDevice>(&mut self, io: &mut BlockIo<D>, sb: &Superblock) -> FsResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut block = [0u8; BLOCK_SIZE];
        for (entry, record) in self.entries.iter().zip(block.chunks_exact_mut(DIR_RECORD_SIZE)) {
            entry.encode(record);
        }
        io.write_block(sb.root_dir_block as BlockId, &block)?;
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        let target = name.as_bytes();
        self.entries
            .iter()
            .position(|entry| entry.is_used() && entry.name() == target)
    }

    /// Claim the first unused slot for `name`, empty and without blocks.
    pub fn create(&mut self, name: &str) -> FsResult<usize> {
        let bytes = validate_name(name)?;
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let index = self
            .entries
            .iter()
            .position(|entry| !entry.is_used())
            .ok_or(FsError::DirectoryFull)?;
        let mut entry = FileEntry::EMPTY;
        entry.name[..bytes.len()].copy_from_slice(bytes);
        self.entries[index] = entry;
        self.dirty = true;
        Ok(index)
    }

    /// Release a slot, returning what it held.
    pub fn clear(&mut self, index: usize) -> FileEntry {
        let old = core::mem::replace(&mut self.entries[index], FileEntry::EMPTY);
        self.dirty = true;
        old
    }

    pub fn entry(&self, index: usize) -> &FileEntry {
        &self.entries[index]
    }

    pub fn set_size(&mut self, index: usize, size: u32) {
        self.entries[index].size = size;
        self.dirty = true;
    }

    pub fn set_first_block(&mut self, index: usize, block: u16) {
        self.entries[index].first_block = block;
        self.dirty = true;
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.is_used()).count()
    }

    /// Occupied slots in slot order. Each call starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = DirEntry> + '_ {
        self.entries
            .iter()
            .filter(|entry| entry.is_used())
            // A used slot always holds 1..=MAX_NAME_LEN name bytes.
            .filter_map(|entry| entry.to_dir_entry().ok())
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
