//! Inode table: allocates, reads, writes, and frees fixed-size inode
//! records within inode segments.

use std::fs::File;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use log::{debug, trace};

use crate::bitmap::{find_free_bit, read_bitmap, set_bit, write_bitmap};
use crate::error::{FsError, Result};
use crate::layout::{
    BITMAP_BLOCK_SIZE, DIRECT_COUNT, INODES_PER_SEGMENT, INODE_RECORD_SIZE, ROOT_INODE,
    SENTINEL_NONE,
};
use crate::segment::{read_at, write_at, SegmentKind, SegmentStore};

pub type InodeNum = i32;
pub type BlockId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InodeType {
    Free = 0,
    File = 1,
    Directory = 2,
}

impl InodeType {
    fn from_tag(tag: i32) -> Result<Self> {
        match tag {
            0 => Ok(InodeType::Free),
            1 => Ok(InodeType::File),
            2 => Ok(InodeType::Directory),
            other => Err(FsError::InvalidPath(format!("corrupt inode type tag {other}"))),
        }
    }
}

/// On-disk inode record.
///
/// Field order is `size, kind, num_direct, direct, indirect, double,
/// triple` rather than the prose order in the spec so that the 64-bit
/// `size` field needs no alignment padding under `repr(C)` — the record
/// lands at exactly [`INODE_RECORD_SIZE`] bytes either way.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct DiskInode {
    pub size: u64,
    pub kind: i32,
    pub num_direct: i32,
    pub direct_blocks: [BlockId; DIRECT_COUNT],
    pub indirect_block: BlockId,
    pub double_indirect: BlockId,
    pub triple_indirect: BlockId,
}

const _: () = assert!(size_of::<DiskInode>() == INODE_RECORD_SIZE);

impl DiskInode {
    pub fn new(kind: InodeType) -> Self {
        let mut inode = DiskInode::zeroed();
        inode.kind = kind as i32;
        inode.indirect_block = SENTINEL_NONE;
        inode.double_indirect = SENTINEL_NONE;
        inode.triple_indirect = SENTINEL_NONE;
        inode
    }

    pub fn inode_type(&self) -> Result<InodeType> {
        InodeType::from_tag(self.kind)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == InodeType::Directory as i32
    }
}

/// Decomposes a global inode number into `(segment_index, slot_index)`.
fn locate(inum: InodeNum) -> (u64, u64) {
    let inum = inum as u64;
    (inum / INODES_PER_SEGMENT, inum % INODES_PER_SEGMENT)
}

fn slot_offset(slot: u64) -> u64 {
    BITMAP_BLOCK_SIZE as u64 + slot * INODE_RECORD_SIZE as u64
}

/// Installs the empty root directory inode in a freshly zero-filled inode
/// segment 0: sets bit 0 in the bitmap and writes a zeroed directory inode
/// (size 0, num_direct 0, indirect fields −1) at slot 0.
pub(crate) fn init_root_directory(file: &File, path: &Path) -> Result<()> {
    debug!("initializing root directory inode");

    let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
    read_bitmap(file, path, &mut bitmap)?;
    set_bit(&mut bitmap, 0);
    write_bitmap(file, path, &bitmap)?;

    let root = DiskInode::new(InodeType::Directory);
    write_at(
        file,
        path,
        slot_offset(0),
        bytemuck::bytes_of(&root),
    )?;

    Ok(())
}

/// Allocates, reads, writes, and frees fixed-size inode records.
pub struct InodeTable {
    store: SegmentStore,
}

impl InodeTable {
    pub fn new(store: SegmentStore) -> Self {
        Self { store }
    }

    /// Finds the lowest free inode slot, starting at segment 0 and
    /// extending the address space by creating new segments on demand.
    /// Never fails to find a slot.
    pub fn allocate(&self, kind: InodeType) -> Result<InodeNum> {
        let mut segment_index = 0u64;

        loop {
            let path = self.store.path_for(SegmentKind::Inode, segment_index);
            let file = self.store.open_or_create(SegmentKind::Inode, segment_index)?;

            let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
            read_bitmap(&file, &path, &mut bitmap)?;

            if let Some(bit) = find_free_bit(&bitmap, INODES_PER_SEGMENT) {
                set_bit(&mut bitmap, bit);
                write_bitmap(&file, &path, &bitmap)?;

                let inum = (segment_index * INODES_PER_SEGMENT + bit) as InodeNum;

                let fresh = DiskInode::new(kind);
                write_at(&file, &path, slot_offset(bit), bytemuck::bytes_of(&fresh))?;

                trace!("allocated inode {inum} ({kind:?})");
                return Ok(inum);
            }

            segment_index += 1;
        }
    }

    pub fn read(&self, inum: InodeNum) -> Result<DiskInode> {
        let (segment_index, slot) = locate(inum);
        let path = self.store.path_for(SegmentKind::Inode, segment_index);
        let file = self.store.open_or_create(SegmentKind::Inode, segment_index)?;

        let mut bytes = [0u8; INODE_RECORD_SIZE];
        read_at(&file, &path, slot_offset(slot), &mut bytes)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    pub fn write(&self, inum: InodeNum, inode: &DiskInode) -> Result<()> {
        let (segment_index, slot) = locate(inum);
        let path = self.store.path_for(SegmentKind::Inode, segment_index);
        let file = self.store.open_or_create(SegmentKind::Inode, segment_index)?;

        write_at(&file, &path, slot_offset(slot), bytemuck::bytes_of(inode))
    }

    /// Clears the bitmap bit for `inum`. Record bytes are left untouched;
    /// the bitmap is the source of truth for liveness.
    pub fn free(&self, inum: InodeNum) -> Result<()> {
        let (segment_index, slot) = locate(inum);
        let path = self.store.path_for(SegmentKind::Inode, segment_index);
        let file = self.store.open_or_create(SegmentKind::Inode, segment_index)?;

        let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
        read_bitmap(&file, &path, &mut bitmap)?;
        crate::bitmap::clear_bit(&mut bitmap, slot);
        write_bitmap(&file, &path, &bitmap)?;

        trace!("freed inode {inum}");
        Ok(())
    }

    pub fn is_allocated(&self, inum: InodeNum) -> Result<bool> {
        let (segment_index, slot) = locate(inum);
        let path = self.store.path_for(SegmentKind::Inode, segment_index);
        let file = self.store.open_or_create(SegmentKind::Inode, segment_index)?;

        let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
        read_bitmap(&file, &path, &mut bitmap)?;
        Ok(crate::bitmap::is_set(&bitmap, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (tempfile::TempDir, InodeTable) {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path());
        let table = InodeTable::new(store);
        (dir, table)
    }

    #[test]
    fn allocating_inode_zero_is_root_and_preinitialized() {
        let (_dir, table) = table();
        // Forces creation of inode_seg_0, which installs the root directory
        // at slot 0 before any explicit allocation happens.
        let inum = table.allocate(InodeType::File).unwrap();
        assert_eq!(inum, 1, "slot 0 is reserved for the root directory");

        let root = table.read(ROOT_INODE).unwrap();
        assert!(root.is_directory());
        assert_eq!(root.size, 0);
        assert_eq!(root.num_direct, 0);
        assert_eq!(root.indirect_block, SENTINEL_NONE);
    }

    #[test]
    fn allocate_read_write_free_roundtrip() {
        let (_dir, table) = table();
        let inum = table.allocate(InodeType::File).unwrap();
        assert!(table.is_allocated(inum).unwrap());

        let mut inode = table.read(inum).unwrap();
        inode.size = 42;
        table.write(inum, &inode).unwrap();

        let reread = table.read(inum).unwrap();
        assert_eq!(reread.size, 42);

        table.free(inum).unwrap();
        assert!(!table.is_allocated(inum).unwrap());
    }

    #[test]
    fn allocation_extends_into_new_segments_when_full() {
        let (_dir, table) = table();
        let mut last = None;
        // INODES_PER_SEGMENT in segment 0, plus the root at slot 0 already
        // taken, should roll over into inode_seg_1.
        for _ in 0..(INODES_PER_SEGMENT) {
            last = Some(table.allocate(InodeType::File).unwrap());
        }
        let rolled_over = table.allocate(InodeType::File).unwrap();
        assert!(rolled_over as u64 >= INODES_PER_SEGMENT);
        assert_ne!(last.unwrap(), rolled_over);
    }
}
