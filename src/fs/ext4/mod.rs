//! ext4 filesystem support.
//!
//! The parser reads the primary superblock and the group descriptor table once, and
//! exposes the derived geometry as plain values: inode table locations, per-inode byte
//! offsets, and the reserved-GDT-block runs of each backup-holding group. It never
//! writes to the device.

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::{Error, Result};
use crate::fs::ext4::block_grp::{
    reserved_gdt_runs, BlockGroupNumber, GroupDescriptor, ReservedGdtRun,
};
use crate::fs::ext4::inode::{InodeNumber, OSD2_OFFSET, OSD2_TAIL_OFFSET};
use crate::fs::ext4::sb::{Ext4Superblock, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE};

pub mod block_grp;
pub mod inode;
pub mod sb;

/// Parsed structural facts about an ext4 filesystem.
#[derive(Clone, Debug)]
pub struct Ext4Fs {
    superblock: Ext4Superblock,
    group_descriptors: Vec<GroupDescriptor>,
}

impl Ext4Fs {
    /// Parses the primary superblock and every group descriptor.
    pub fn parse<D: ReadAt + WriteAt + Size>(dev: &Device<D>) -> Result<Self> {
        let mut raw_sb = [0u8; SUPERBLOCK_SIZE];
        dev.read_exact_at(SUPERBLOCK_OFFSET, &mut raw_sb)?;

        let superblock: Ext4Superblock = bytemuck::pod_read_unaligned(&raw_sb[..256]);
        superblock.validate()?;

        let mut group_descriptors = Vec::with_capacity(superblock.bg_count() as usize);
        for group in 0..superblock.bg_count() {
            group_descriptors.push(GroupDescriptor::load_descriptor(
                dev,
                &superblock,
                BlockGroupNumber(group),
            )?);
        }

        info!(
            target: "ext4",
            "parsed ext4 filesystem: {} inodes, {} blocks of {} bytes, {} groups",
            superblock.inodes_count(),
            superblock.blk_count(),
            superblock.blk_size(),
            superblock.bg_count()
        );

        Ok(Self {
            superblock,
            group_descriptors,
        })
    }

    /// The parsed superblock.
    pub fn superblock(&self) -> &Ext4Superblock {
        &self.superblock
    }

    /// Size of a logical block, in bytes.
    pub fn blk_size(&self) -> u64 {
        self.superblock.blk_size()
    }

    /// Absolute byte offset of the on-disk structure of an inode.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CorruptStructure`] for inode 0 or numbers past the inode
    /// count.
    pub fn inode_offset(&self, inode: InodeNumber) -> Result<u64> {
        if inode == InodeNumber::UNUSED || inode.0 > self.superblock.inodes_count() {
            return Err(Error::CorruptStructure(format!(
                "inode {} out of range (1..={})",
                inode.0,
                self.superblock.inodes_count()
            )));
        }

        let group = (inode.0 - 1) / self.superblock.inodes_per_group();
        let index = (inode.0 - 1) % self.superblock.inodes_per_group();
        let descriptor = self
            .group_descriptors
            .get(group as usize)
            .ok_or_else(|| Error::CorruptStructure(format!("no descriptor for group {group}")))?;

        Ok(descriptor.inode_table_blk_addr() * self.blk_size()
            + u64::from(index) * u64::from(self.superblock.inode_size()))
    }

    /// Absolute byte offset of the unused 2-byte tail of an inode's `osd2` field.
    pub fn osd2_tail_offset(&self, inode: InodeNumber) -> Result<u64> {
        Ok(self.inode_offset(inode)? + OSD2_OFFSET + OSD2_TAIL_OFFSET)
    }

    /// The reserved-GDT-block runs of every backup-holding group, in group order.
    pub fn reserved_gdt_runs(&self) -> Vec<ReservedGdtRun> {
        reserved_gdt_runs(&self.superblock)
    }

    /// The group descriptors, in group order.
    pub fn group_descriptors(&self) -> &[GroupDescriptor] {
        &self.group_descriptors
    }
}
