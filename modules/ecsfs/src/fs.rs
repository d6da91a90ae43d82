use core::fmt;

use ecsvfs::{DirEntry, Fd, FsError, FsResult};

use crate::block::{BlockDevice, BlockId, BlockIo};
use crate::config::{BLOCK_SIZE, FS_FILE_MAX_COUNT, SUPERBLOCK_BLOCK};
use crate::dir::{validate_name, Directory};
use crate::fat::Fat;
use crate::fd::FdTable;
use crate::superblock::Superblock;

/// Geometry and usage of a mounted filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsInfo {
    pub total_block_count: u16,
    pub fat_block_count: u8,
    pub root_dir_block: u16,
    pub data_block_start: u16,
    pub data_block_count: u16,
    pub fat_free: usize,
    pub dir_free: usize,
}

impl fmt::Display for FsInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FS Info:")?;
        writeln!(f, "total_blk_count={}", self.total_block_count)?;
        writeln!(f, "fat_blk_count={}", self.fat_block_count)?;
        writeln!(f, "rdir_blk={}", self.root_dir_block)?;
        writeln!(f, "data_blk={}", self.data_block_start)?;
        writeln!(f, "data_blk_count={}", self.data_block_count)?;
        writeln!(f, "fat_free_ratio={}/{}", self.fat_free, self.data_block_count)?;
        write!(f, "rdir_free_ratio={}/{}", self.dir_free, FS_FILE_MAX_COUNT)
    }
}

/// A mounted filesystem: device, geometry, allocation table, directory and descriptors.
pub struct FileSystem<D: BlockDevice> {
    pub(crate) io: BlockIo<D>,
    pub(crate) sb: Superblock,
    pub(crate) fat: Fat,
    pub(crate) dir: Directory,
    pub(crate) fds: FdTable,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Validate the image on `device` and load its metadata.
    ///
    /// On failure the device is closed and nothing stays mounted.
    pub fn mount(device: D) -> FsResult<Self> {
        let mut io = BlockIo::new(device);
        match Self::load(&mut io) {
            Ok((sb, fat, dir)) => {
                log::info!(
                    "mounted: {} blocks, {} data blocks from block {}, {} free",
                    sb.total_block_count,
                    sb.data_block_count,
                    sb.data_block_start,
                    fat.free_count()
                );
                Ok(Self {
                    io,
                    sb,
                    fat,
                    dir,
                    fds: FdTable::new(),
                })
            }
            Err(err) => {
                log::warn!("mount rejected: {}", err);
                if let Err(close_err) = io.close() {
                    log::warn!("closing rejected device failed: {}", close_err);
                }
                Err(err)
            }
        }
    }

    fn load(io: &mut BlockIo<D>) -> FsResult<(Superblock, Fat, Directory)> {
        if io.block_count() == 0 {
            return Err(FsError::InvalidImage);
        }
        let mut block = [0u8; BLOCK_SIZE];
        io.read_block(SUPERBLOCK_BLOCK, &mut block)?;
        let sb = Superblock::parse(&block)?;
        sb.validate(io.block_count())?;
        let fat = Fat::load(io, &sb)?;
        let dir = Directory::load(io, &sb)?;
        Ok((sb, fat, dir))
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn info(&self) -> FsInfo {
        FsInfo {
            total_block_count: self.sb.total_block_count,
            fat_block_count: self.sb.fat_block_count,
            root_dir_block: self.sb.root_dir_block,
            data_block_start: self.sb.data_block_start,
            data_block_count: self.sb.data_block_count,
            fat_free: self.fat.free_count(),
            dir_free: self.dir.free_count(),
        }
    }

    /// Write back the allocation table and directory if they changed.
    pub fn sync(&mut self) -> FsResult<()> {
        self.fat.flush(&mut self.io, &self.sb)?;
        self.dir.flush(&mut self.io, &self.sb)
    }

    pub fn create(&mut self, name: &str) -> FsResult<()> {
        let index = self.dir.create(name)?;
        log::debug!("created {:?} in slot {}", name, index);
        Ok(())
    }

    /// Remove `name` and release its blocks. Rejected while any descriptor has it open.
    pub fn delete(&mut self, name: &str) -> FsResult<()> {
        validate_name(name)?;
        let index = self.dir.find(name).ok_or(FsError::NotFound)?;
        if self.fds.is_referenced(index) {
            return Err(FsError::FileOpen);
        }
        let freed = self.fat.free_chain(self.dir.entry(index).first_block)?;
        self.dir.clear(index);
        log::debug!("deleted {:?}, {} blocks freed", name, freed);
        Ok(())
    }

    pub fn list(&self) -> impl Iterator<Item = DirEntry> + '_ {
        self.dir.iter()
    }

    pub fn open(&mut self, name: &str) -> FsResult<Fd> {
        validate_name(name)?;
        let index = self.dir.find(name).ok_or(FsError::NotFound)?;
        let fd = self.fds.open(index)?;
        log::debug!("opened {:?} as fd {}", name, fd);
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> FsResult<()> {
        self.fds.close(fd)?;
        log::debug!("closed fd {}", fd);
        Ok(())
    }

    /// Current size of the file behind `fd`.
    pub fn stat(&self, fd: Fd) -> FsResult<usize> {
        let file = self.fds.get(fd)?;
        Ok(self.dir.entry(file.entry).size as usize)
    }

    pub fn seek(&mut self, fd: Fd, offset: usize) -> FsResult<()> {
        let size = self.stat(fd)?;
        if offset > size {
            return Err(FsError::OffsetOutOfRange);
        }
        self.fds.get_mut(fd)?.offset = offset;
        Ok(())
    }

    /// Current position of `fd`.
    pub fn tell(&self, fd: Fd) -> FsResult<usize> {
        Ok(self.fds.get(fd)?.offset)
    }

    pub fn open_count(&self) -> usize {
        self.fds.open_count()
    }

    /// Absolute device block of data block `block`.
    pub(crate) fn data_block_id(&self, block: u16) -> BlockId {
        self.sb.data_block_start as BlockId + block as BlockId
    }

    /// Flush and close the device ahead of unmounting. Refused while
    /// descriptors are open; on any failure the filesystem stays usable.
    pub(crate) fn release(&mut self) -> FsResult<()> {
        if self.fds.open_count() > 0 {
            return Err(FsError::FileOpen);
        }
        self.sync()?;
        self.io.close()
    }

    pub(crate) fn into_device(self) -> D {
        self.io.into_inner()
    }
}
