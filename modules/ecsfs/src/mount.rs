use ecsvfs::{DirEntry, Fd, FsError, FsResult};

use crate::block::{BlockDevice, OpenDevice};
use crate::fs::{FileSystem, FsInfo};

/// Holds at most one mounted filesystem and routes every operation to it.
pub struct MountSlot<D: BlockDevice> {
    mounted: Option<FileSystem<D>>,
}

impl<D: BlockDevice> MountSlot<D> {
    pub const fn new() -> Self {
        Self { mounted: None }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// Mount `device`. A device turned away is closed before it is dropped.
    pub fn mount(&mut self, mut device: D) -> FsResult<()> {
        if self.mounted.is_some() {
            if let Err(err) = device.close() {
                log::warn!("closing refused device failed: {}", err);
            }
            return Err(FsError::AlreadyMounted);
        }
        self.mounted = Some(FileSystem::mount(device)?);
        Ok(())
    }

    /// Flush metadata, close the device and hand it back.
    ///
    /// While any descriptor is open, or if flushing or closing fails, the
    /// filesystem stays mounted.
    pub fn unmount(&mut self) -> FsResult<D> {
        self.fs_mut()?.release()?;
        let fs = self.mounted.take().ok_or(FsError::NotMounted)?;
        log::info!("unmounted");
        Ok(fs.into_device())
    }

    pub fn fs(&self) -> FsResult<&FileSystem<D>> {
        self.mounted.as_ref().ok_or(FsError::NotMounted)
    }

    pub fn fs_mut(&mut self) -> FsResult<&mut FileSystem<D>> {
        self.mounted.as_mut().ok_or(FsError::NotMounted)
    }

    pub fn info(&self) -> FsResult<FsInfo> {
        Ok(self.fs()?.info())
    }

    pub fn create(&mut self, name: &str) -> FsResult<()> {
        self.fs_mut()?.create(name)
    }

    pub fn delete(&mut self, name: &str) -> FsResult<()> {
        self.fs_mut()?.delete(name)
    }

    pub fn list(&self) -> FsResult<impl Iterator<Item = DirEntry> + '_> {
        Ok(self.fs()?.list())
    }

    pub fn open(&mut self, name: &str) -> FsResult<Fd> {
        self.fs_mut()?.open(name)
    }

    pub fn close(&mut self, fd: Fd) -> FsResult<()> {
        self.fs_mut()?.close(fd)
    }

    pub fn stat(&self, fd: Fd) -> FsResult<usize> {
        self.fs()?.stat(fd)
    }

    pub fn seek(&mut self, fd: Fd, offset: usize) -> FsResult<()> {
        self.fs_mut()?.seek(fd, offset)
    }

    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> FsResult<usize> {
        self.fs_mut()?.read(fd, buf)
    }

    pub fn write(&mut self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        self.fs_mut()?.write(fd, data)
    }
}

impl<D: OpenDevice> MountSlot<D> {
    /// Open the device called `name` and mount it.
    pub fn mount_by_name(&mut self, name: &str) -> FsResult<()> {
        if self.mounted.is_some() {
            return Err(FsError::AlreadyMounted);
        }
        let device = D::open(name)?;
        self.mount(device)
    }
}

impl<D: BlockDevice> Default for MountSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}
