//! On-disk layout constants for the filesystem.

/// Size of every block on the device, in bytes.
pub const BLOCK_SIZE: usize = 4096;
/// Magic stored in the first eight bytes of block 0.
pub const SIGNATURE: &[u8; 8] = b"ECS150FS";
/// Number of slots in the root directory.
pub const FS_FILE_MAX_COUNT: usize = 128;
/// Number of simultaneously open descriptors.
pub const FS_OPEN_MAX_COUNT: usize = 32;
/// Allocation table value marking the end of a chain, or an empty file.
pub const FAT_EOC: u16 = 0xffff;
/// Allocation table value marking a free data block.
pub const FAT_FREE: u16 = 0;
/// Serialized size of one allocation table entry.
pub const FAT_ENTRY_SIZE: usize = 2;
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;
/// Serialized size of one directory record.
pub const DIR_RECORD_SIZE: usize = 32;
/// Entry values at or above `FAT_EOC` cannot name a block, which bounds the table.
pub const MAX_DATA_BLOCKS: usize = FAT_EOC as usize;
/// Block index of the superblock.
pub const SUPERBLOCK_BLOCK: u64 = 0;
/// First block of the serialized allocation table.
pub const FAT_START_BLOCK: u64 = 1;
