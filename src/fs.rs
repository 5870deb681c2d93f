//! Top-level filesystem handle: ties the segment store, inode table, and
//! data block store together behind the five public operations the
//! command-line surface drives.

use std::path::Path;

use log::info;

use crate::block::DataBlockStore;
use crate::error::Result;
use crate::inode::InodeTable;
use crate::ops::{self, DebugReport, ListEntry};
use crate::path;
use crate::segment::SegmentStore;

/// Opens the filesystem rooted at `root` (a host directory holding, or to
/// hold, the `inode_seg_*` / `data_seg_*` container files). Does not
/// itself touch disk — segments are created lazily on first use.
pub struct Filesystem {
    inodes: InodeTable,
    blocks: DataBlockStore,
}

impl Filesystem {
    pub fn open(root: &Path) -> Result<Self> {
        info!("opening filesystem rooted at {}", root.display());
        Ok(Self {
            inodes: InodeTable::new(SegmentStore::new(root)),
            blocks: DataBlockStore::new(SegmentStore::new(root)),
        })
    }

    /// Adds `data` at `fs_path`, creating intermediate directories.
    pub fn add(&self, fs_path: &str, data: &[u8]) -> Result<()> {
        let components = path::split(fs_path)?;
        ops::add(&self.inodes, &self.blocks, &components, data)
    }

    /// Removes the file or subtree at `fs_path`.
    pub fn remove(&self, fs_path: &str) -> Result<()> {
        let components = path::split(fs_path)?;
        ops::remove(&self.inodes, &self.blocks, &components)
    }

    /// Reads the full contents of the file at `fs_path`.
    pub fn extract(&self, fs_path: &str) -> Result<Vec<u8>> {
        let components = path::split(fs_path)?;
        ops::extract(&self.inodes, &self.blocks, &components)
    }

    /// Depth-first listing of the whole tree, rooted at `/`.
    pub fn list(&self) -> Result<Vec<ListEntry>> {
        ops::list(&self.inodes, &self.blocks)
    }

    /// Debug summary for `fs_path`: the root's entries, then every prefix
    /// of the split path in turn.
    pub fn debug(&self, fs_path: &str) -> Result<Vec<DebugReport>> {
        let components = path::split(fs_path)?;
        ops::debug(&self.inodes, &self.blocks, &components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_fs() -> (tempfile::TempDir, Filesystem) {
        let dir = tempfile::tempdir().unwrap();
        let fs = Filesystem::open(dir.path()).unwrap();
        (dir, fs)
    }

    #[test]
    fn add_extract_roundtrip_with_intermediate_directories() {
        let (_dir, fs) = open_fs();
        let payload = b"Content of the test file";

        fs.add("/a/b/c/t.txt", payload).unwrap();
        assert_eq!(fs.extract("/a/b/c/t.txt").unwrap(), payload);

        let names: Vec<_> = fs.list().unwrap().into_iter().map(|e| (e.depth, e.name, e.is_directory)).collect();
        assert_eq!(
            names,
            vec![
                (0, "a".to_string(), true),
                (1, "b".to_string(), true),
                (2, "c".to_string(), true),
                (3, "t.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn adding_duplicate_path_is_rejected_and_leaves_tree_intact() {
        let (_dir, fs) = open_fs();
        fs.add("/a", b"one").unwrap();
        let err = fs.add("/a", b"two").unwrap_err();
        assert!(matches!(err, crate::error::FsError::AlreadyExists(_)));
        assert_eq!(fs.extract("/a").unwrap(), b"one");
    }

    #[test]
    fn remove_deletes_subtree_and_leaves_siblings() {
        let (_dir, fs) = open_fs();
        fs.add("/a/b/c/t.txt", b"payload").unwrap();
        fs.add("/a/sibling.txt", b"other").unwrap();

        fs.remove("/a/b/c/t.txt").unwrap();

        let names: Vec<_> = fs.list().unwrap().into_iter().map(|e| e.name).collect();
        assert!(names.contains(&"sibling.txt".to_string()));
        assert!(!names.contains(&"t.txt".to_string()));

        let err = fs.extract("/a/b/c/t.txt").unwrap_err();
        assert!(matches!(err, crate::error::FsError::NotFound(_)));
    }

    #[test]
    fn remove_of_missing_path_reports_not_found() {
        let (_dir, fs) = open_fs();
        let err = fs.remove("/does/not/exist").unwrap_err();
        assert!(matches!(err, crate::error::FsError::NotFound(_)));
    }

    #[test]
    fn zero_byte_file_round_trips_as_empty() {
        let (_dir, fs) = open_fs();
        fs.add("/empty", &[]).unwrap();
        assert!(fs.extract("/empty").unwrap().is_empty());
    }
}
