//! File block map: maps a logical file block index to a physical data
//! block id through direct slots, a single-indirect block, a
//! double-indirect block, and a triple-indirect block.
//!
//! Growth (on write) is driven purely by the running logical block index,
//! so nothing can desync from the inode's on-disk state: there is no
//! counter mirrored across calls, only the inode's own `num_direct` and
//! indirect pointers.

use crate::block::DataBlockStore;
use crate::error::{FsError, Result};
use crate::inode::{BlockId, DiskInode};
use crate::layout::{
    DATA_BLOCK_SIZE, DIRECT_COUNT, MAX_DOUBLE, MAX_SINGLE, MAX_TRIPLE, POINTERS_PER_INDIRECT,
    SENTINEL_EMPTY, SENTINEL_NONE,
};

type IndirectBlock = [BlockId; POINTERS_PER_INDIRECT];

fn load_indirect(blocks: &DataBlockStore, block_id: BlockId) -> Result<IndirectBlock> {
    let mut raw = [0u8; DATA_BLOCK_SIZE];
    blocks.read(block_id, &mut raw)?;
    Ok(bytemuck::pod_read_unaligned(&raw))
}

fn save_indirect(blocks: &DataBlockStore, block_id: BlockId, arr: &IndirectBlock) -> Result<()> {
    let mut raw = [0u8; DATA_BLOCK_SIZE];
    raw.copy_from_slice(bytemuck::bytes_of(arr));
    blocks.write(block_id, &raw)
}

/// Resolves logical block `logical` to a physical block id, or `None` if
/// the chain stops before reaching it (missing indirect level, or a zero
/// entry partway through).
fn resolve_block(blocks: &DataBlockStore, inode: &DiskInode, logical: u64) -> Result<Option<BlockId>> {
    if logical < DIRECT_COUNT as u64 {
        return Ok(if (logical as i32) < inode.num_direct {
            Some(inode.direct_blocks[logical as usize])
        } else {
            None
        });
    }

    if logical < MAX_SINGLE {
        if inode.indirect_block == SENTINEL_NONE {
            return Ok(None);
        }
        let arr = load_indirect(blocks, inode.indirect_block)?;
        let v = arr[(logical - DIRECT_COUNT as u64) as usize];
        return Ok((v != SENTINEL_EMPTY as i32).then_some(v));
    }

    if logical < MAX_DOUBLE {
        if inode.double_indirect == SENTINEL_NONE {
            return Ok(None);
        }
        let rel = logical - MAX_SINGLE;
        let root = load_indirect(blocks, inode.double_indirect)?;
        let l1_id = root[(rel / POINTERS_PER_INDIRECT as u64) as usize];
        if l1_id == SENTINEL_EMPTY as i32 {
            return Ok(None);
        }
        let l1 = load_indirect(blocks, l1_id)?;
        let v = l1[(rel % POINTERS_PER_INDIRECT as u64) as usize];
        return Ok((v != SENTINEL_EMPTY as i32).then_some(v));
    }

    if logical < MAX_TRIPLE {
        if inode.triple_indirect == SENTINEL_NONE {
            return Ok(None);
        }
        let rel = logical - MAX_DOUBLE;
        let root = load_indirect(blocks, inode.triple_indirect)?;
        let l1_id = root[(rel / (POINTERS_PER_INDIRECT as u64 * POINTERS_PER_INDIRECT as u64)) as usize];
        if l1_id == SENTINEL_EMPTY as i32 {
            return Ok(None);
        }
        let l1 = load_indirect(blocks, l1_id)?;
        let rem = rel % (POINTERS_PER_INDIRECT as u64 * POINTERS_PER_INDIRECT as u64);
        let l2_id = l1[(rem / POINTERS_PER_INDIRECT as u64) as usize];
        if l2_id == SENTINEL_EMPTY as i32 {
            return Ok(None);
        }
        let l2 = load_indirect(blocks, l2_id)?;
        let v = l2[(rem % POINTERS_PER_INDIRECT as u64) as usize];
        return Ok((v != SENTINEL_EMPTY as i32).then_some(v));
    }

    Err(FsError::InvalidPath("file exceeds the addressable block range".into()))
}

/// Places `block_id` at logical position `logical`, lazily allocating and
/// zeroing whatever indirect structure is needed to reach it. Does not
/// touch `inode.size`; the caller tracks that.
fn place_block(blocks: &DataBlockStore, inode: &mut DiskInode, logical: u64, block_id: BlockId) -> Result<()> {
    if logical < DIRECT_COUNT as u64 {
        let idx = logical as usize;
        inode.direct_blocks[idx] = block_id;
        if logical as i32 + 1 > inode.num_direct {
            inode.num_direct = logical as i32 + 1;
        }
        return Ok(());
    }

    if logical < MAX_SINGLE {
        if inode.indirect_block == SENTINEL_NONE {
            inode.indirect_block = blocks.allocate()?;
        }
        let mut arr = load_indirect(blocks, inode.indirect_block)?;
        arr[(logical - DIRECT_COUNT as u64) as usize] = block_id;
        save_indirect(blocks, inode.indirect_block, &arr)?;
        return Ok(());
    }

    if logical < MAX_DOUBLE {
        let rel = logical - MAX_SINGLE;
        if inode.double_indirect == SENTINEL_NONE {
            inode.double_indirect = blocks.allocate()?;
        }

        let mut root = load_indirect(blocks, inode.double_indirect)?;
        let l1_index = (rel / POINTERS_PER_INDIRECT as u64) as usize;
        if root[l1_index] == SENTINEL_EMPTY as i32 {
            root[l1_index] = blocks.allocate()?;
            save_indirect(blocks, inode.double_indirect, &root)?;
        }

        let l1_id = root[l1_index];
        let mut l1 = load_indirect(blocks, l1_id)?;
        l1[(rel % POINTERS_PER_INDIRECT as u64) as usize] = block_id;
        save_indirect(blocks, l1_id, &l1)?;
        return Ok(());
    }

    if logical < MAX_TRIPLE {
        let rel = logical - MAX_DOUBLE;
        if inode.triple_indirect == SENTINEL_NONE {
            inode.triple_indirect = blocks.allocate()?;
        }

        let mut root = load_indirect(blocks, inode.triple_indirect)?;
        let l1_index = (rel / (POINTERS_PER_INDIRECT as u64 * POINTERS_PER_INDIRECT as u64)) as usize;
        if root[l1_index] == SENTINEL_EMPTY as i32 {
            root[l1_index] = blocks.allocate()?;
            save_indirect(blocks, inode.triple_indirect, &root)?;
        }

        let l1_id = root[l1_index];
        let mut l1 = load_indirect(blocks, l1_id)?;
        let rem = rel % (POINTERS_PER_INDIRECT as u64 * POINTERS_PER_INDIRECT as u64);
        let l2_index = (rem / POINTERS_PER_INDIRECT as u64) as usize;
        if l1[l2_index] == SENTINEL_EMPTY as i32 {
            l1[l2_index] = blocks.allocate()?;
            save_indirect(blocks, l1_id, &l1)?;
        }

        let l2_id = l1[l2_index];
        let mut l2 = load_indirect(blocks, l2_id)?;
        l2[(rem % POINTERS_PER_INDIRECT as u64) as usize] = block_id;
        save_indirect(blocks, l2_id, &l2)?;
        return Ok(());
    }

    Err(FsError::InvalidPath("file exceeds the addressable block range".into()))
}

/// Writes the entirety of `data` into a freshly allocated file inode,
/// growing the block map as it goes. Intended to be called exactly once,
/// against an inode with `size == 0` — this engine has no in-place edit or
/// append-to-existing-file path (see Non-goals).
pub fn write_content(blocks: &DataBlockStore, inode: &mut DiskInode, data: &[u8]) -> Result<()> {
    let mut logical = 0u64;
    let mut offset = 0usize;

    while offset < data.len() {
        let chunk_len = (data.len() - offset).min(DATA_BLOCK_SIZE);
        let mut buf = [0u8; DATA_BLOCK_SIZE];
        buf[..chunk_len].copy_from_slice(&data[offset..offset + chunk_len]);

        let block_id = blocks.allocate()?;
        blocks.write(block_id, &buf)?;
        place_block(blocks, inode, logical, block_id)?;

        offset += chunk_len;
        logical += 1;
    }

    inode.size = data.len() as u64;
    Ok(())
}

/// Reads the full contents of a file inode, honouring `size` to trim the
/// tail of the last block.
pub fn read_content(blocks: &DataBlockStore, inode: &DiskInode) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(inode.size as usize);
    if inode.size == 0 {
        return Ok(out);
    }

    let total_blocks = (inode.size + DATA_BLOCK_SIZE as u64 - 1) / DATA_BLOCK_SIZE as u64;

    for logical in 0..total_blocks {
        let Some(block_id) = resolve_block(blocks, inode, logical)? else {
            break;
        };

        let mut buf = [0u8; DATA_BLOCK_SIZE];
        blocks.read(block_id, &mut buf)?;

        let remaining = inode.size - logical * DATA_BLOCK_SIZE as u64;
        let take = remaining.min(DATA_BLOCK_SIZE as u64) as usize;
        out.extend_from_slice(&buf[..take]);
    }

    Ok(out)
}

/// Frees every block reachable from a file inode — direct blocks, and all
/// three indirect levels, including the indirect structure blocks
/// themselves, not just the leaves they point to. Resets the inode's size
/// and block fields to empty.
pub fn free_content(blocks: &DataBlockStore, inode: &mut DiskInode) -> Result<()> {
    for i in 0..inode.num_direct as usize {
        blocks.free(inode.direct_blocks[i])?;
    }

    if inode.indirect_block != SENTINEL_NONE {
        let arr = load_indirect(blocks, inode.indirect_block)?;
        for &id in arr.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            blocks.free(id)?;
        }
        blocks.free(inode.indirect_block)?;
        inode.indirect_block = SENTINEL_NONE;
    }

    if inode.double_indirect != SENTINEL_NONE {
        let root = load_indirect(blocks, inode.double_indirect)?;
        for &l1_id in root.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            let l1 = load_indirect(blocks, l1_id)?;
            for &id in l1.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                blocks.free(id)?;
            }
            blocks.free(l1_id)?;
        }
        blocks.free(inode.double_indirect)?;
        inode.double_indirect = SENTINEL_NONE;
    }

    if inode.triple_indirect != SENTINEL_NONE {
        let root = load_indirect(blocks, inode.triple_indirect)?;
        for &l1_id in root.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            let l1 = load_indirect(blocks, l1_id)?;
            for &l2_id in l1.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                let l2 = load_indirect(blocks, l2_id)?;
                for &id in l2.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                    blocks.free(id)?;
                }
                blocks.free(l2_id)?;
            }
            blocks.free(l1_id)?;
        }
        blocks.free(inode.triple_indirect)?;
        inode.triple_indirect = SENTINEL_NONE;
    }

    inode.num_direct = 0;
    inode.size = 0;
    Ok(())
}

/// Block-count summary used by the `-D` debug command.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockMapSummary {
    pub direct_count: u32,
    pub indirect_count: u32,
    pub double_indirect_count: u32,
    pub triple_indirect_count: u32,
    pub first_block: Option<BlockId>,
    pub last_block: Option<BlockId>,
}

impl BlockMapSummary {
    fn observe(&mut self, id: BlockId) {
        self.first_block.get_or_insert(id);
        self.last_block = Some(id);
    }
}

pub fn summarize(blocks: &DataBlockStore, inode: &DiskInode) -> Result<BlockMapSummary> {
    let mut summary = BlockMapSummary::default();

    for i in 0..inode.num_direct as usize {
        summary.direct_count += 1;
        summary.observe(inode.direct_blocks[i]);
    }

    if inode.indirect_block != SENTINEL_NONE {
        let arr = load_indirect(blocks, inode.indirect_block)?;
        for &id in arr.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            summary.indirect_count += 1;
            summary.observe(id);
        }
    }

    if inode.double_indirect != SENTINEL_NONE {
        let root = load_indirect(blocks, inode.double_indirect)?;
        for &l1_id in root.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            let l1 = load_indirect(blocks, l1_id)?;
            for &id in l1.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                summary.double_indirect_count += 1;
                summary.observe(id);
            }
        }
    }

    if inode.triple_indirect != SENTINEL_NONE {
        let root = load_indirect(blocks, inode.triple_indirect)?;
        for &l1_id in root.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
            let l1 = load_indirect(blocks, l1_id)?;
            for &l2_id in l1.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                let l2 = load_indirect(blocks, l2_id)?;
                for &id in l2.iter().filter(|&&id| id != SENTINEL_EMPTY as i32) {
                    summary.triple_indirect_count += 1;
                    summary.observe(id);
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeType;
    use crate::segment::SegmentStore;

    fn fresh_blocks() -> (tempfile::TempDir, DataBlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let blocks = DataBlockStore::new(SegmentStore::new(dir.path()));
        (dir, blocks)
    }

    #[test]
    fn write_then_read_roundtrip_small_file() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        let payload = b"Content of the test file";

        write_content(&blocks, &mut inode, payload).unwrap();
        assert_eq!(inode.size, payload.len() as u64);
        assert_eq!(inode.num_direct, 1);

        let read_back = read_content(&blocks, &inode).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn zero_byte_file_has_no_direct_blocks() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        write_content(&blocks, &mut inode, &[]).unwrap();

        assert_eq!(inode.num_direct, 0);
        assert_eq!(inode.size, 0);
        assert!(read_content(&blocks, &inode).unwrap().is_empty());
    }

    #[test]
    fn file_using_every_direct_slot_needs_no_indirect_block() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        let payload = vec![0xab; DATA_BLOCK_SIZE * DIRECT_COUNT];

        write_content(&blocks, &mut inode, &payload).unwrap();
        assert_eq!(inode.num_direct as usize, DIRECT_COUNT);
        assert_eq!(inode.indirect_block, SENTINEL_NONE);

        assert_eq!(read_content(&blocks, &inode).unwrap(), payload);
    }

    #[test]
    fn file_one_block_past_direct_allocates_one_indirect_entry() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        let payload = vec![0x11; DATA_BLOCK_SIZE * (DIRECT_COUNT + 1)];

        write_content(&blocks, &mut inode, &payload).unwrap();
        assert_eq!(inode.num_direct as usize, DIRECT_COUNT);
        assert_ne!(inode.indirect_block, SENTINEL_NONE);

        let summary = summarize(&blocks, &inode).unwrap();
        assert_eq!(summary.indirect_count, 1);
        assert_eq!(summary.double_indirect_count, 0);

        assert_eq!(read_content(&blocks, &inode).unwrap(), payload);
    }

    #[test]
    fn twelve_mib_file_spans_direct_single_and_double_indirect() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        let payload = vec![0x42; DATA_BLOCK_SIZE * 3072];

        write_content(&blocks, &mut inode, &payload).unwrap();
        let summary = summarize(&blocks, &inode).unwrap();

        assert_eq!(summary.direct_count as usize, DIRECT_COUNT);
        assert_eq!(summary.indirect_count as usize, POINTERS_PER_INDIRECT);
        assert_eq!(summary.double_indirect_count, 3072 - DIRECT_COUNT as u32 - POINTERS_PER_INDIRECT as u32);

        assert_eq!(read_content(&blocks, &inode).unwrap(), payload);
    }

    #[test]
    fn free_content_reclaims_direct_and_all_indirect_levels() {
        let (_dir, blocks) = fresh_blocks();
        let mut inode = DiskInode::new(InodeType::File);
        let payload = vec![0x7; DATA_BLOCK_SIZE * (DIRECT_COUNT + POINTERS_PER_INDIRECT + 5)];
        write_content(&blocks, &mut inode, &payload).unwrap();

        let summary_before = summarize(&blocks, &inode).unwrap();
        assert!(summary_before.double_indirect_count > 0);

        free_content(&blocks, &mut inode).unwrap();
        assert_eq!(inode.num_direct, 0);
        assert_eq!(inode.indirect_block, SENTINEL_NONE);
        assert_eq!(inode.double_indirect, SENTINEL_NONE);
        assert_eq!(inode.triple_indirect, SENTINEL_NONE);

        // Every block handed out during the write must now be free again
        // (content blocks plus the single-indirect, double-indirect root,
        // and one level-1 structure block), so reallocating that many
        // blocks reuses only ids below the total.
        let total_freed = DIRECT_COUNT + POINTERS_PER_INDIRECT + 5 + 3;
        let mut reused = Vec::new();
        for _ in 0..total_freed {
            reused.push(blocks.allocate().unwrap());
        }
        assert!(reused.iter().all(|&id| id < total_freed as i32));
    }
}
