//! Building empty filesystem images.

use std::path::Path;

use ecsvfs::{FsError, FsResult};

use crate::block::{BlockDevice, BlockIo, MemDisk};
use crate::config::{BLOCK_SIZE, SUPERBLOCK_BLOCK};
use crate::dir::Directory;
use crate::disk::FileDisk;
use crate::fat::Fat;
use crate::superblock::Superblock;

/// Write an empty filesystem with `data_block_count` data blocks onto `device`.
///
/// The device must have exactly the number of blocks the layout needs.
pub fn format<D: BlockDevice>(device: D, data_block_count: usize) -> FsResult<D> {
    let sb = Superblock::for_data_blocks(data_block_count)?;
    let mut io = BlockIo::new(device);
    if io.block_count() != sb.total_block_count as usize {
        log::warn!(
            "cannot format {} blocks with a layout needing {}",
            io.block_count(),
            sb.total_block_count
        );
        return Err(FsError::GeometryMismatch);
    }
    let mut block = [0u8; BLOCK_SIZE];
    sb.encode(&mut block);
    io.write_block(SUPERBLOCK_BLOCK, &block)?;
    Fat::new(data_block_count).flush(&mut io, &sb)?;
    Directory::new().flush(&mut io, &sb)?;
    log::info!(
        "formatted {} blocks: {} fat, {} data",
        sb.total_block_count,
        sb.fat_block_count,
        sb.data_block_count
    );
    Ok(io.into_inner())
}

/// A freshly formatted in-memory image.
pub fn new_image(data_block_count: usize) -> FsResult<MemDisk> {
    let sb = Superblock::for_data_blocks(data_block_count)?;
    format(MemDisk::new(sb.total_block_count as usize), data_block_count)
}

/// Create an image file at `path` and format it.
pub fn create_image(path: impl AsRef<Path>, data_block_count: usize) -> FsResult<FileDisk> {
    let sb = Superblock::for_data_blocks(data_block_count)?;
    let disk = FileDisk::create(path, sb.total_block_count as usize)?;
    format(disk, data_block_count)
}
