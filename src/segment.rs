//! Segment store: opens, creates, and zero-initialises the 1 MiB container
//! files that back the inode and data address spaces.
//!
//! Segment handles are opened immediately before use and closed before the
//! next operation begins (see the concurrency/resource model) — nothing
//! here caches a [`std::fs::File`] across calls.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::{FsError, Result};
use crate::layout::{BITMAP_BLOCK_SIZE, SEGMENT_SIZE};

/// Which address space a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Inode,
    Data,
}

impl SegmentKind {
    fn prefix(self) -> &'static str {
        match self {
            SegmentKind::Inode => "inode_seg_",
            SegmentKind::Data => "data_seg_",
        }
    }
}

/// Owns the directory holding `inode_seg_<N>` / `data_seg_<N>` files and
/// knows how to open, create, and zero-initialise them.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    root: PathBuf,
}

impl SegmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, kind: SegmentKind, index: u64) -> PathBuf {
        self.root.join(format!("{}{index}", kind.prefix()))
    }

    /// Opens an existing segment, creating (and zero-filling) it first if
    /// it does not exist yet. Creating inode segment 0 also installs the
    /// root directory inode.
    pub fn open_or_create(&self, kind: SegmentKind, index: u64) -> Result<File> {
        let path = self.path_for(kind, index);

        if !path.exists() {
            self.create(kind, index)?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| FsError::Segment { path, source })
    }

    /// Creates and zero-fills a new segment file. Does not fail if the file
    /// already exists; callers use [`SegmentStore::open_or_create`] to avoid
    /// clobbering one that is already populated.
    fn create(&self, kind: SegmentKind, index: u64) -> Result<()> {
        let path = self.path_for(kind, index);
        debug!("creating segment {}", path.display());

        std::fs::create_dir_all(&self.root)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| FsError::Segment {
                path: path.clone(),
                source,
            })?;

        let zeros = [0u8; BITMAP_BLOCK_SIZE];
        let mut written = 0u64;
        while written < SEGMENT_SIZE {
            let chunk = zeros.len().min((SEGMENT_SIZE - written) as usize);
            file.write_all(&zeros[..chunk])
                .map_err(|source| FsError::Segment {
                    path: path.clone(),
                    source,
                })?;
            written += chunk as u64;
        }
        file.flush().map_err(|source| FsError::Segment {
            path: path.clone(),
            source,
        })?;

        trace!("segment {} zero-filled ({SEGMENT_SIZE} bytes)", path.display());

        if kind == SegmentKind::Inode && index == 0 {
            crate::inode::init_root_directory(&file, &path)?;
        }

        Ok(())
    }
}

pub(crate) fn read_at(file: &File, path: &Path, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.read_exact_at(buf, offset)
        .map_err(|source| FsError::Segment {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn write_at(file: &File, path: &Path, offset: u64, buf: &[u8]) -> Result<()> {
    file.write_all_at(buf, offset)
        .map_err(|source| FsError::Segment {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_zero_fills_and_is_idempotent_to_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path());

        let file = store.open_or_create(SegmentKind::Data, 0).unwrap();
        assert_eq!(file.metadata().unwrap().len(), SEGMENT_SIZE);

        let mut buf = [0xffu8; BITMAP_BLOCK_SIZE];
        read_at(&file, &store.path_for(SegmentKind::Data, 0), 0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0), "bitmap block must start zeroed");

        // Reopening must not truncate/clobber existing contents.
        write_at(&file, &store.path_for(SegmentKind::Data, 0), 0, &[1u8; 4]).unwrap();
        let file2 = store.open_or_create(SegmentKind::Data, 0).unwrap();
        let mut buf2 = [0u8; 4];
        read_at(&file2, &store.path_for(SegmentKind::Data, 0), 0, &mut buf2).unwrap();
        assert_eq!(buf2, [1, 1, 1, 1]);
    }

    #[test]
    fn segment_naming_matches_kind_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path());
        assert_eq!(
            store.path_for(SegmentKind::Inode, 3).file_name().unwrap(),
            "inode_seg_3"
        );
        assert_eq!(
            store.path_for(SegmentKind::Data, 7).file_name().unwrap(),
            "data_seg_7"
        );
    }
}
