use ecsvfs::{FsError, FsResult};

use crate::config::{BLOCK_SIZE, FAT_ENTRIES_PER_BLOCK, MAX_DATA_BLOCKS, SIGNATURE};

const SIGNATURE_OFFSET: usize = 0;
const TOTAL_BLOCKS_OFFSET: usize = 8;
const ROOT_DIR_OFFSET: usize = 10;
const DATA_START_OFFSET: usize = 12;
const DATA_BLOCKS_OFFSET: usize = 14;
const FAT_BLOCKS_OFFSET: usize = 16;

/// Filesystem geometry stored in block 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Superblock {
    pub total_block_count: u16,
    pub fat_block_count: u8,
    pub root_dir_block: u16,
    pub data_block_start: u16,
    pub data_block_count: u16,
}

impl Superblock {
    /// Lay out a filesystem with `data_block_count` data blocks.
    pub fn for_data_blocks(data_block_count: usize) -> FsResult<Self> {
        if data_block_count == 0 || data_block_count > MAX_DATA_BLOCKS {
            return Err(FsError::GeometryMismatch);
        }
        let fat_blocks = fat_blocks_for(data_block_count);
        let total = fat_blocks + 2 + data_block_count;
        if fat_blocks > u8::MAX as usize || total > u16::MAX as usize {
            return Err(FsError::GeometryMismatch);
        }
        Ok(Self {
            total_block_count: total as u16,
            fat_block_count: fat_blocks as u8,
            root_dir_block: fat_blocks as u16 + 1,
            data_block_start: fat_blocks as u16 + 2,
            data_block_count: data_block_count as u16,
        })
    }

    pub fn parse(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < BLOCK_SIZE {
            return Err(FsError::InvalidImage);
        }
        if &buf[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE.len()] != SIGNATURE {
            return Err(FsError::InvalidImage);
        }
        Ok(Self {
            total_block_count: read_u16(buf, TOTAL_BLOCKS_OFFSET),
            root_dir_block: read_u16(buf, ROOT_DIR_OFFSET),
            data_block_start: read_u16(buf, DATA_START_OFFSET),
            data_block_count: read_u16(buf, DATA_BLOCKS_OFFSET),
            fat_block_count: buf[FAT_BLOCKS_OFFSET],
        })
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..BLOCK_SIZE].fill(0);
        buf[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE.len()].copy_from_slice(SIGNATURE);
        write_u16(buf, TOTAL_BLOCKS_OFFSET, self.total_block_count);
        write_u16(buf, ROOT_DIR_OFFSET, self.root_dir_block);
        write_u16(buf, DATA_START_OFFSET, self.data_block_start);
        write_u16(buf, DATA_BLOCKS_OFFSET, self.data_block_count);
        buf[FAT_BLOCKS_OFFSET] = self.fat_block_count;
    }

    /// Check internal consistency and agreement with the device size.
    pub fn validate(&self, device_blocks: usize) -> FsResult<()> {
        let fat_blocks = self.fat_block_count as u16;
        let data_blocks = self.data_block_count as usize;
        if self.total_block_count as usize != device_blocks
            || data_blocks == 0
            || data_blocks > MAX_DATA_BLOCKS
            || self.fat_block_count as usize != fat_blocks_for(data_blocks)
            || self.root_dir_block != fat_blocks + 1
            || self.data_block_start != self.root_dir_block + 1
            || self.data_block_start as usize + data_blocks != self.total_block_count as usize
        {
            return Err(FsError::GeometryMismatch);
        }
        Ok(())
    }
}

fn fat_blocks_for(data_block_count: usize) -> usize {
    data_block_count.div_ceil(FAT_ENTRIES_PER_BLOCK)
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub(crate) fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
