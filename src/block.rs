//! Data block store: allocates, reads, writes, and frees 4 KiB data blocks
//! within data segments. Structurally a mirror of [`crate::inode::InodeTable`]
//! with different per-segment parameters (255 blocks of 4 KiB each, rather
//! than fixed inode records).

use log::trace;

use crate::bitmap::{clear_bit, find_free_bit, is_set, read_bitmap, set_bit, write_bitmap};
use crate::error::Result;
use crate::inode::BlockId;
use crate::layout::{BITMAP_BLOCK_SIZE, DATA_BLOCKS_PER_SEGMENT, DATA_BLOCK_SIZE};
use crate::segment::{read_at, write_at, SegmentKind, SegmentStore};

fn locate(id: BlockId) -> (u64, u64) {
    let id = id as u64;
    (id / DATA_BLOCKS_PER_SEGMENT, id % DATA_BLOCKS_PER_SEGMENT)
}

fn slot_offset(slot: u64) -> u64 {
    BITMAP_BLOCK_SIZE as u64 + slot * DATA_BLOCK_SIZE as u64
}

pub struct DataBlockStore {
    store: SegmentStore,
}

impl DataBlockStore {
    pub fn new(store: SegmentStore) -> Self {
        Self { store }
    }

    /// Allocates a data block, first-fit within ascending segment indices,
    /// extending the address space with a new segment if every existing one
    /// is full. The returned block is zeroed.
    pub fn allocate(&self) -> Result<BlockId> {
        let mut segment_index = 0u64;

        loop {
            let path = self.store.path_for(SegmentKind::Data, segment_index);
            let file = self.store.open_or_create(SegmentKind::Data, segment_index)?;

            let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
            read_bitmap(&file, &path, &mut bitmap)?;

            if let Some(bit) = find_free_bit(&bitmap, DATA_BLOCKS_PER_SEGMENT) {
                set_bit(&mut bitmap, bit);
                write_bitmap(&file, &path, &bitmap)?;

                let id = (segment_index * DATA_BLOCKS_PER_SEGMENT + bit) as BlockId;

                let zeros = [0u8; DATA_BLOCK_SIZE];
                write_at(&file, &path, slot_offset(bit), &zeros)?;

                trace!("allocated data block {id}");
                return Ok(id);
            }

            segment_index += 1;
        }
    }

    pub fn read(&self, id: BlockId, buf: &mut [u8; DATA_BLOCK_SIZE]) -> Result<()> {
        let (segment_index, slot) = locate(id);
        let path = self.store.path_for(SegmentKind::Data, segment_index);
        let file = self.store.open_or_create(SegmentKind::Data, segment_index)?;
        read_at(&file, &path, slot_offset(slot), buf)
    }

    pub fn write(&self, id: BlockId, buf: &[u8; DATA_BLOCK_SIZE]) -> Result<()> {
        let (segment_index, slot) = locate(id);
        let path = self.store.path_for(SegmentKind::Data, segment_index);
        let file = self.store.open_or_create(SegmentKind::Data, segment_index)?;
        write_at(&file, &path, slot_offset(slot), buf)
    }

    pub fn free(&self, id: BlockId) -> Result<()> {
        let (segment_index, slot) = locate(id);
        let path = self.store.path_for(SegmentKind::Data, segment_index);
        let file = self.store.open_or_create(SegmentKind::Data, segment_index)?;

        let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
        read_bitmap(&file, &path, &mut bitmap)?;
        clear_bit(&mut bitmap, slot);
        write_bitmap(&file, &path, &bitmap)?;

        trace!("freed data block {id}");
        Ok(())
    }

    pub fn is_allocated(&self, id: BlockId) -> Result<bool> {
        let (segment_index, slot) = locate(id);
        let path = self.store.path_for(SegmentKind::Data, segment_index);
        let file = self.store.open_or_create(SegmentKind::Data, segment_index)?;

        let mut bitmap = [0u8; BITMAP_BLOCK_SIZE];
        read_bitmap(&file, &path, &mut bitmap)?;
        Ok(is_set(&bitmap, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DataBlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let blocks = DataBlockStore::new(SegmentStore::new(dir.path()));
        (dir, blocks)
    }

    #[test]
    fn allocate_is_zeroed_and_first_fit() {
        let (_dir, blocks) = store();
        let a = blocks.allocate().unwrap();
        assert_eq!(a, 0, "block 0 of data_seg_0 is a legitimate first allocation");

        let mut buf = [0u8; DATA_BLOCK_SIZE];
        blocks.read(a, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));

        blocks.write(a, &[7u8; DATA_BLOCK_SIZE]).unwrap();
        blocks.free(a).unwrap();

        let b = blocks.allocate().unwrap();
        assert_eq!(b, 0, "freed block 0 is reused first-fit");
        blocks.read(b, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0), "reallocated block must be zeroed again");
    }

    #[test]
    fn rolls_over_into_next_segment_when_full() {
        let (_dir, blocks) = store();
        for _ in 0..DATA_BLOCKS_PER_SEGMENT {
            blocks.allocate().unwrap();
        }
        let next = blocks.allocate().unwrap();
        assert_eq!(next as u64, DATA_BLOCKS_PER_SEGMENT);
    }
}
