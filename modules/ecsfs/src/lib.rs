//! A flat FAT filesystem on a fixed-block-size virtual disk.

pub mod block;
pub mod config;
pub mod dir;
pub mod disk;
pub mod fat;
pub mod fd;
pub mod format;
pub mod fs;
mod io;
pub mod mount;
pub mod superblock;

pub use block::{BlockDevice, MemDisk, OpenDevice};
pub use disk::FileDisk;
pub use ecsvfs::{DeviceFault, DirEntry, Fd, FsError, FsResult};
pub use fs::{FileSystem, FsInfo};
pub use mount::MountSlot;
