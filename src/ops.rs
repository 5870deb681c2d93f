//! Path resolver and tree operations: walks the directory tree from the
//! root inode, creates missing intermediate directories on add, and
//! recursively tears down subtrees on remove.

use crate::block::DataBlockStore;
use crate::dir::{add_entry_to_dir, find_entry_in_dir, list_entries, remove_entry};
use crate::error::{FsError, Result};
use crate::filemap::{self, BlockMapSummary};
use crate::inode::{DiskInode, InodeNum, InodeTable, InodeType};
use crate::layout::ROOT_INODE;

/// Walks `components` from the root, requiring every component traversed
/// to resolve to a directory. Returns the inode number of the final
/// component reached.
fn resolve(inodes: &InodeTable, blocks: &DataBlockStore, components: &[String]) -> Result<InodeNum> {
    let mut current = ROOT_INODE;

    for component in components {
        let dir_inode = inodes.read(current)?;
        if !dir_inode.is_directory() {
            return Err(FsError::NotADirectory(component.clone()));
        }

        match find_entry_in_dir(blocks, &dir_inode, component)? {
            Some(next) => current = next,
            None => return Err(FsError::NotFound(component.clone())),
        }
    }

    Ok(current)
}

/// Walks all but the last component, creating missing intermediate
/// directories as it goes. Returns `(parent_inode_num, final_component)`.
/// `components` must be non-empty.
fn resolve_parent_creating(
    inodes: &InodeTable,
    blocks: &DataBlockStore,
    components: &[String],
) -> Result<(InodeNum, String)> {
    let (dirs, last) = components.split_at(components.len() - 1);
    let mut current = ROOT_INODE;

    for component in dirs {
        let mut dir_inode = inodes.read(current)?;
        if !dir_inode.is_directory() {
            return Err(FsError::NotADirectory(component.clone()));
        }

        match find_entry_in_dir(blocks, &dir_inode, component)? {
            Some(next) => current = next,
            None => {
                let child_num = inodes.allocate(InodeType::Directory)?;
                add_entry_to_dir(blocks, &mut dir_inode, component, child_num)?;
                inodes.write(current, &dir_inode)?;
                current = child_num;
            }
        }
    }

    Ok((current, last[0].clone()))
}

/// Walks all but the last component without creating anything, for
/// operations (remove, debug) that must fail on a missing intermediate.
fn resolve_parent_strict(
    inodes: &InodeTable,
    blocks: &DataBlockStore,
    components: &[String],
) -> Result<(InodeNum, String)> {
    let (dirs, last) = components.split_at(components.len() - 1);
    let parent = resolve(inodes, blocks, dirs)?;
    Ok((parent, last[0].clone()))
}

/// Adds `data` at the path made up of `components`, creating any missing
/// intermediate directories. Fails if the final component already exists
/// or any traversed component is not a directory.
pub fn add(
    inodes: &InodeTable,
    blocks: &DataBlockStore,
    components: &[String],
    data: &[u8],
) -> Result<()> {
    if components.is_empty() {
        return Err(FsError::InvalidPath("cannot add to the root path".into()));
    }

    let (parent_num, name) = resolve_parent_creating(inodes, blocks, components)?;
    let mut parent = inodes.read(parent_num)?;
    if !parent.is_directory() {
        return Err(FsError::NotADirectory(name));
    }

    if find_entry_in_dir(blocks, &parent, &name)?.is_some() {
        return Err(FsError::AlreadyExists(name));
    }

    let child_num = inodes.allocate(InodeType::File)?;
    let mut child = DiskInode::new(InodeType::File);
    filemap::write_content(blocks, &mut child, data)?;
    inodes.write(child_num, &child)?;

    add_entry_to_dir(blocks, &mut parent, &name, child_num)?;
    inodes.write(parent_num, &parent)?;

    Ok(())
}

/// Recursively frees `inum` and everything reachable from it: for a file,
/// its full block map — direct blocks and every indirect level, including
/// the indirect structure blocks themselves; for a directory, every live
/// child, then its own direct blocks.
fn remove_subtree(inodes: &InodeTable, blocks: &DataBlockStore, inum: InodeNum) -> Result<()> {
    let mut inode = inodes.read(inum)?;

    if inode.is_directory() {
        for (_, child_inum) in list_entries(blocks, &inode)? {
            remove_subtree(inodes, blocks, child_inum)?;
        }
        for i in 0..inode.num_direct as usize {
            blocks.free(inode.direct_blocks[i])?;
        }
    } else {
        filemap::free_content(blocks, &mut inode)?;
    }

    inodes.free(inum)?;
    Ok(())
}

/// Removes the file or subtree at `components`. Fails if the path (or any
/// directory component on the way to it) does not exist.
pub fn remove(inodes: &InodeTable, blocks: &DataBlockStore, components: &[String]) -> Result<()> {
    if components.is_empty() {
        return Err(FsError::InvalidPath("cannot remove the root path".into()));
    }

    let (parent_num, name) = resolve_parent_strict(inodes, blocks, components)?;
    let mut parent = inodes.read(parent_num)?;
    if !parent.is_directory() {
        return Err(FsError::NotADirectory(name));
    }

    let target = find_entry_in_dir(blocks, &parent, &name)?.ok_or_else(|| FsError::NotFound(name.clone()))?;

    remove_subtree(inodes, blocks, target)?;

    remove_entry(blocks, &parent, target)?;
    inodes.write(parent_num, &parent)?;

    Ok(())
}

/// Reads the full contents of the file at `components`.
pub fn extract(inodes: &InodeTable, blocks: &DataBlockStore, components: &[String]) -> Result<Vec<u8>> {
    if components.is_empty() {
        return Err(FsError::InvalidPath("cannot extract the root path".into()));
    }

    let inum = resolve(inodes, blocks, components)?;
    let inode = inodes.read(inum)?;
    if inode.is_directory() {
        return Err(FsError::NotADirectory(components.join("/")));
    }

    filemap::read_content(blocks, &inode)
}

/// One node of the recursive listing, in depth-first pre-order.
pub struct ListEntry {
    pub name: String,
    pub depth: usize,
    pub is_directory: bool,
}

fn list_recursive(
    inodes: &InodeTable,
    blocks: &DataBlockStore,
    dir_inum: InodeNum,
    depth: usize,
    out: &mut Vec<ListEntry>,
) -> Result<()> {
    let dir_inode = inodes.read(dir_inum)?;
    let entries = list_entries(blocks, &dir_inode)?;

    for (name, child_num) in entries {
        let child = inodes.read(child_num)?;
        let is_directory = child.is_directory();
        out.push(ListEntry {
            name: name.clone(),
            depth,
            is_directory,
        });
        if is_directory {
            list_recursive(inodes, blocks, child_num, depth + 1, out)?;
        }
    }

    Ok(())
}

/// Depth-first traversal of the whole tree from the root.
pub fn list(inodes: &InodeTable, blocks: &DataBlockStore) -> Result<Vec<ListEntry>> {
    let mut out = Vec::new();
    list_recursive(inodes, blocks, ROOT_INODE, 0, &mut out)?;
    Ok(out)
}

/// What the `-D` debug command reports for a path: either a directory's
/// live entries, or a file's size and block-map summary.
pub enum DebugReport {
    Directory(Vec<(String, InodeNum)>),
    File { size: u64, summary: BlockMapSummary },
}

/// Reports on the root directory plus every prefix of `components` in
/// turn; the caller (the binary) is responsible for printing each in
/// sequence, this returns them as structured data.
pub fn debug(inodes: &InodeTable, blocks: &DataBlockStore, components: &[String]) -> Result<Vec<DebugReport>> {
    let mut reports = Vec::with_capacity(components.len() + 1);

    let root = inodes.read(ROOT_INODE)?;
    reports.push(DebugReport::Directory(list_entries(blocks, &root)?));

    let mut current = ROOT_INODE;
    for component in components {
        let dir_inode = inodes.read(current)?;
        if !dir_inode.is_directory() {
            return Err(FsError::NotADirectory(component.clone()));
        }

        let next = find_entry_in_dir(blocks, &dir_inode, component)?
            .ok_or_else(|| FsError::NotFound(component.clone()))?;
        let inode = inodes.read(next)?;

        if inode.is_directory() {
            reports.push(DebugReport::Directory(list_entries(blocks, &inode)?));
        } else {
            reports.push(DebugReport::File {
                size: inode.size,
                summary: filemap::summarize(blocks, &inode)?,
            });
        }

        current = next;
    }

    Ok(reports)
}
