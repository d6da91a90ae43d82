use ecsvfs::{Fd, FsError, FsResult};

use crate::config::FS_OPEN_MAX_COUNT;

/// An open descriptor: which directory slot it names and where it is positioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenFile {
    pub entry: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct FdTable {
    slots: [Option<OpenFile>; FS_OPEN_MAX_COUNT],
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            slots: [None; FS_OPEN_MAX_COUNT],
        }
    }

    /// Bind the lowest free descriptor to directory slot `entry`, at offset 0.
    pub fn open(&mut self, entry: usize) -> FsResult<Fd> {
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)?;
        self.slots[fd] = Some(OpenFile { entry, offset: 0 });
        Ok(fd)
    }

    pub fn close(&mut self, fd: Fd) -> FsResult<OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::take)
            .ok_or(FsError::BadDescriptor)
    }

    pub fn get(&self, fd: Fd) -> FsResult<&OpenFile> {
        self.slots
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(FsError::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> FsResult<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadDescriptor)
    }

    pub fn is_referenced(&self, entry: usize) -> bool {
        self.slots.iter().flatten().any(|file| file.entry == entry)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_reuse() {
        let mut table = FdTable::new();
        assert_eq!(table.open(3).unwrap(), 0);
        assert_eq!(table.open(3).unwrap(), 1);
        assert!(table.is_referenced(3));
        assert_eq!(table.close(0).unwrap().entry, 3);
        assert_eq!(table.close(0), Err(FsError::BadDescriptor));
        assert_eq!(table.open(5).unwrap(), 0);
        assert_eq!(table.open_count(), 2);
    }

    #[test]
    fn independent_offsets() {
        let mut table = FdTable::new();
        let a = table.open(0).unwrap();
        let b = table.open(0).unwrap();
        table.get_mut(a).unwrap().offset = 10;
        assert_eq!(table.get(a).unwrap().offset, 10);
        assert_eq!(table.get(b).unwrap().offset, 0);
    }

    #[test]
    fn table_limits() {
        let mut table = FdTable::new();
        for _ in 0..FS_OPEN_MAX_COUNT {
            table.open(1).unwrap();
        }
        assert_eq!(table.open(1), Err(FsError::TooManyOpenFiles));
        assert_eq!(table.get(FS_OPEN_MAX_COUNT), Err(FsError::BadDescriptor));
        table.close(FS_OPEN_MAX_COUNT - 1).unwrap();
        assert!(table.get(FS_OPEN_MAX_COUNT - 1).is_err());
        assert_eq!(table.open(2).unwrap(), FS_OPEN_MAX_COUNT - 1);
    }
}
