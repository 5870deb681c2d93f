//! On-disk size and capacity constants.
//!
//! These fall directly out of the record shapes fixed in the inode and
//! directory-entry types: nothing here is tunable without also changing
//! the layout of [`crate::inode::DiskInode`] or [`crate::dir::DirEntry`].

/// Total size of every segment file, inode and data alike.
pub const SEGMENT_SIZE: u64 = 1 << 20;

/// Size of the bitmap block occupying the first bytes of every segment.
pub const BITMAP_BLOCK_SIZE: usize = 4096;

/// Size of a data block.
pub const DATA_BLOCK_SIZE: usize = 4096;

/// Number of direct block ids held inline in an inode record.
pub const DIRECT_COUNT: usize = 1017;

/// Number of block ids (or pointers) held in one indirect block.
pub const POINTERS_PER_INDIRECT: usize = DATA_BLOCK_SIZE / size_of::<i32>();

/// Blocks addressable through the direct + single-indirect levels.
pub const MAX_SINGLE: u64 = (DIRECT_COUNT + POINTERS_PER_INDIRECT) as u64;

/// Blocks addressable through the direct + single + double-indirect levels.
pub const MAX_DOUBLE: u64 =
    MAX_SINGLE + (POINTERS_PER_INDIRECT * POINTERS_PER_INDIRECT) as u64;

/// Blocks addressable through all four levels (direct/single/double/triple).
pub const MAX_TRIPLE: u64 =
    MAX_DOUBLE + (POINTERS_PER_INDIRECT * POINTERS_PER_INDIRECT * POINTERS_PER_INDIRECT) as u64;

/// Data blocks per data segment: `(SEGMENT_SIZE - BITMAP_BLOCK_SIZE) / DATA_BLOCK_SIZE`.
pub const DATA_BLOCKS_PER_SEGMENT: u64 =
    (SEGMENT_SIZE - BITMAP_BLOCK_SIZE as u64) / DATA_BLOCK_SIZE as u64;

/// Fixed byte size of one inode record. See [`crate::inode::DiskInode`] for
/// the field layout that produces this; a compile-time assertion there
/// keeps this constant honest.
pub const INODE_RECORD_SIZE: usize = 4096;

/// Inode records per inode segment.
pub const INODES_PER_SEGMENT: u64 =
    (SEGMENT_SIZE - BITMAP_BLOCK_SIZE as u64) / INODE_RECORD_SIZE as u64;

/// Bits meaningfully used in a segment's bitmap block.
pub const BITMAP_BITS: usize = BITMAP_BLOCK_SIZE * 8;

/// Length of the name field inside a directory entry, including the
/// mandatory terminating NUL.
pub const DIR_NAME_LEN: usize = 256;

/// Maximum number of path components accepted by the splitter.
pub const MAX_PATH_COMPONENTS: usize = 32;

/// Maximum length in bytes of a single path component.
pub const MAX_COMPONENT_LEN: usize = 255;

/// Inode number of the filesystem root directory.
pub const ROOT_INODE: i32 = 0;

/// Sentinel stored in an inode's indirect-block-id fields and in directory
/// entries' `inode_num` when the slot is unused.
pub const SENTINEL_NONE: i32 = -1;

/// Sentinel stored inside an indirect block's own pointer array when the
/// slot is unused. Distinct from [`SENTINEL_NONE`] because block id 0 is a
/// legitimate data block (see the sentinel discussion in the design notes).
pub const SENTINEL_EMPTY: u32 = 0;
