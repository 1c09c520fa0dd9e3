//! ext4 block group related structures.
//!
//! Block groups are a logical grouping of contiguous blocks on disk. Each group has a
//! `GroupDescriptor` in the descriptor table that follows the superblock, and groups
//! holding a superblock backup also reserve a run of blocks after their descriptor table
//! copy so that the table can grow during an online resize. Those reserved GDT blocks
//! are allocated but carry no live data until a resize happens.

use bytemuck::{Pod, Zeroable};
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::{Error, Result};
use crate::fs::ext4::sb::{Ext4Superblock, SUPERBLOCK_OFFSET};

/// A number representing a block group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BlockGroupNumber(pub u32);

/// Each block group on the file system has a `GroupDescriptor` associated with it.
///
/// Only the 32-byte base layout is represented; on filesystems with the 64bit feature
/// the upper halves of each location live in the second 32 bytes of the descriptor and
/// are folded in by [`GroupDescriptor`].
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct Ext4GroupDescriptor {
    /// Lower 32-bit of location of block bitmap
    block_bitmap_lo: u32,

    /// Lower 32-bit of location of inode bitmap
    inode_bitmap_lo: u32,

    /// Lower 32-bit of location of inode table
    inode_table_lo: u32,

    /// Lower 16-bit of free block count
    free_blocks_count_lo: u16,

    /// Lower 16-bit of free inode count
    free_inodes_count_lo: u16,

    /// Lower 16-bit of directory count
    used_dirs_count_lo: u16,

    /// Block group flags
    flags: u16,

    /// Lower 32-bit of location of snapshot exclusion bitmap
    exclude_bitmap_lo: u32,

    /// Lower 16-bit of the block bitmap checksum
    block_bitmap_csum_lo: u16,

    /// Lower 16-bit of the inode bitmap checksum
    inode_bitmap_csum_lo: u16,

    /// Lower 16-bit of unused inode count
    itable_unused_lo: u16,

    /// Group descriptor checksum
    checksum: u16,
}

/// A block group descriptor with 64bit-feature high halves folded in.
#[derive(Clone, Copy, Debug)]
pub struct GroupDescriptor {
    pub group_number: BlockGroupNumber,
    inode_table: u64,
    block_bitmap: u64,
    inode_bitmap: u64,
}

impl GroupDescriptor {
    /// Loads a `GroupDescriptor` from the descriptor table, by group number.
    pub fn load_descriptor<D: ReadAt + WriteAt + Size>(
        dev: &Device<D>,
        sb: &Ext4Superblock,
        group: BlockGroupNumber,
    ) -> Result<Self> {
        if group.0 >= sb.bg_count() {
            return Err(Error::CorruptStructure(format!(
                "block group {} out of range ({} groups)",
                group.0,
                sb.bg_count()
            )));
        }

        let desc_size = sb.desc_size();
        // The descriptor table starts in the block right after the superblock: block 2
        // on 1024-byte block filesystems, block 1 otherwise.
        let table_offset = if sb.blk_size() == SUPERBLOCK_OFFSET {
            (sb.first_data_block() + 1) * sb.blk_size()
        } else {
            sb.blk_size()
        };

        let mut raw = vec![0u8; desc_size as usize];
        dev.read_exact_at(table_offset + u64::from(group.0) * desc_size, &mut raw)?;

        let base: Ext4GroupDescriptor = bytemuck::pod_read_unaligned(&raw[..32]);
        let (table_hi, blk_bitmap_hi, inode_bitmap_hi) = if desc_size >= 64 {
            (
                u64::from(u32::from_le_bytes(raw[40..44].try_into().unwrap())) << 32,
                u64::from(u32::from_le_bytes(raw[32..36].try_into().unwrap())) << 32,
                u64::from(u32::from_le_bytes(raw[36..40].try_into().unwrap())) << 32,
            )
        } else {
            (0, 0, 0)
        };

        Ok(Self {
            group_number: group,
            inode_table: u64::from(u32::from_le(base.inode_table_lo)) | table_hi,
            block_bitmap: u64::from(u32::from_le(base.block_bitmap_lo)) | blk_bitmap_hi,
            inode_bitmap: u64::from(u32::from_le(base.inode_bitmap_lo)) | inode_bitmap_hi,
        })
    }

    /// Logical block address of the inode table of this block group.
    pub fn inode_table_blk_addr(&self) -> u64 {
        self.inode_table
    }

    /// Logical block address of the block bitmap of this block group.
    pub fn block_bitmap_blk_addr(&self) -> u64 {
        self.block_bitmap
    }

    /// Logical block address of the inode bitmap of this block group.
    pub fn inode_bitmap_blk_addr(&self) -> u64 {
        self.inode_bitmap
    }
}

/// A run of reserved GDT blocks belonging to one block group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservedGdtRun {
    /// Group the run belongs to.
    pub group: u32,

    /// First reserved block of the run.
    pub first_block: u64,

    /// Count of reserved blocks in the run.
    pub count: u32,
}

/// Enumerates the reserved-GDT-block runs of every backup-holding group, in group order.
pub fn reserved_gdt_runs(sb: &Ext4Superblock) -> Vec<ReservedGdtRun> {
    let reserved = sb.reserved_gdt_blocks();
    if reserved == 0 {
        return Vec::new();
    }

    let gdt_blocks = (u64::from(sb.bg_count()) * sb.desc_size()).div_ceil(sb.blk_size());
    let mut runs = Vec::new();

    for group in 0..sb.bg_count() {
        if !sb.group_has_backup(group) {
            continue;
        }

        let group_first = sb.first_data_block() + u64::from(group) * u64::from(sb.blocks_per_group());
        runs.push(ReservedGdtRun {
            group,
            // Superblock backup, then the descriptor table copy, then the reserved run.
            first_block: group_first + 1 + gdt_blocks,
            count: reserved,
        });
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_base_layout_is_32_bytes() {
        assert_eq!(core::mem::size_of::<Ext4GroupDescriptor>(), 32);
    }
}
