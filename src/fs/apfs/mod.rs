//! APFS container support.
//!
//! An APFS volume lives inside a container. The container superblock (block zero) points
//! at the container object map, a B-tree mapping virtual object identifiers to physical
//! block addresses. The leaves of that tree resolve to per-volume superblocks, each of
//! which carries its own object map over the volume's file-system tree. Walking both
//! levels yields the physical location of every inode record in the container, which is
//! what the hiding technique consumes.
//!
//! Everything here is read-only.

use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::{Error, Result};
use crate::fs::apfs::node::Node;
use crate::fs::apfs::omap::OmapPhys;

pub mod node;
pub mod omap;

/// Container superblock magic, `"NXSB"`.
pub const NX_MAGIC: &[u8; 4] = b"NXSB";

/// Volume superblock magic, `"APSB"`.
pub const APSB_MAGIC: &[u8; 4] = b"APSB";

/// Record kind tag of an inode record in a file-system tree leaf.
pub const RECORD_KIND_INODE: u32 = 3;

/// Common header of every on-disk APFS object.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct ObjPhys {
    /// Fletcher-64 checksum of the object
    cksum: [u8; 8],

    /// Object identifier
    oid: u64,

    /// Transaction identifier of the last modification
    xid: u64,

    /// Object type and storage flags
    object_type: u32,

    /// Object subtype
    object_subtype: u32,
}

/// The container superblock, stored in block zero.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct NxSuperblock {
    header: ObjPhys,

    /// Magic signature, `"NXSB"`
    magic: [u8; 4],

    /// Logical block size of the container
    block_size: u32,

    /// Total count of blocks in the container
    block_count: u64,

    /// Optional feature flags
    features: u64,

    /// Read-only compatible feature flags
    readonly_compatible_features: u64,

    /// Incompatible feature flags
    incompatible_features: u64,

    /// Container UUID
    uuid: [u8; 16],

    /// Next object identifier to hand out
    next_oid: u64,

    /// Next transaction identifier
    next_xid: u64,

    /// Checkpoint descriptor area block count
    xp_desc_blocks: u32,

    /// Checkpoint data area block count
    xp_data_blocks: u32,

    /// Base of the checkpoint descriptor area
    xp_desc_base: u64,

    /// Base of the checkpoint data area
    xp_data_base: u64,

    xp_desc_next: u32,
    xp_data_next: u32,
    xp_desc_index: u32,
    xp_desc_len: u32,
    xp_data_index: u32,
    xp_data_len: u32,

    /// Object identifier of the space manager
    spaceman_oid: u64,

    /// Physical object identifier of the container object map
    omap_oid: u64,

    /// Object identifier of the reaper
    reaper_oid: u64,
}

impl NxSuperblock {
    /// Logical block size of the container, in bytes.
    pub fn block_size(&self) -> u32 {
        u32::from_le(self.block_size)
    }

    /// Physical block number of the container object map.
    pub fn omap_oid(&self) -> u64 {
        u64::from_le(self.omap_oid)
    }
}

/// A volume superblock, reachable through the container object map.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct ApfsVolumeSuperblock {
    header: ObjPhys,

    /// Magic signature, `"APSB"`
    magic: [u8; 4],

    /// Index of this volume in the container's volume array
    fs_index: u32,

    /// Optional feature flags
    features: u64,

    /// Read-only compatible feature flags
    readonly_compatible_features: u64,

    /// Incompatible feature flags
    incompatible_features: u64,

    /// Time of last unmount
    unmount_time: u64,

    /// Blocks reserved for this volume
    fs_reserve_block_count: u64,

    /// Block quota of this volume
    fs_quota_block_count: u64,

    /// Blocks currently allocated to this volume
    fs_alloc_count: u64,

    /// Wrapped encryption state
    meta_crypto: [u8; 20],

    /// Type of the root file-system tree
    root_tree_type: u32,

    /// Type of the extent-reference tree
    extentref_tree_type: u32,

    /// Type of the snapshot metadata tree
    snap_meta_tree_type: u32,

    /// Physical object identifier of the volume object map
    omap_oid: u64,

    /// Virtual object identifier of the root file-system tree
    root_tree_oid: u64,
}

/// The pair of object identifiers a technique needs per volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeInfo {
    /// Physical block number of the volume's object map.
    pub omap_oid: u64,

    /// Virtual object identifier of the volume's root file-system tree node.
    pub root_tree_oid: u64,
}

/// The resolved physical location of one inode record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeLocation {
    /// Absolute byte address of the B-tree node block holding the record.
    pub block: u64,

    /// Offset of the record's value inside that block.
    pub offset: u32,
}

/// Parsed structural facts about an APFS container.
#[derive(Clone, Debug)]
pub struct ApfsContainer {
    superblock: NxSuperblock,
}

impl ApfsContainer {
    /// Parses the container superblock in block zero.
    pub fn parse<D: ReadAt + WriteAt + Size>(dev: &Device<D>) -> Result<Self> {
        let mut raw = [0u8; core::mem::size_of::<NxSuperblock>()];
        dev.read_exact_at(0, &mut raw)?;

        let superblock: NxSuperblock = bytemuck::pod_read_unaligned(&raw);
        if &superblock.magic != NX_MAGIC {
            return Err(Error::CorruptStructure(
                "invalid container superblock magic".into(),
            ));
        }

        let block_size = superblock.block_size();
        if !(512..=65536).contains(&block_size) || !block_size.is_power_of_two() {
            return Err(Error::CorruptStructure(format!(
                "invalid container block size {block_size}"
            )));
        }

        info!(
            target: "apfs",
            "parsed APFS container: block size {block_size}, omap at block {}",
            superblock.omap_oid()
        );

        Ok(Self { superblock })
    }

    /// Logical block size of the container, in bytes.
    pub fn block_size(&self) -> u32 {
        self.superblock.block_size()
    }

    /// Enumerates the volumes of the container through the container object map.
    pub fn volumes<D: ReadAt + WriteAt + Size>(&self, dev: &Device<D>) -> Result<Vec<VolumeInfo>> {
        let bs = u64::from(self.block_size());
        let omap = OmapPhys::read(dev, self.superblock.omap_oid() * bs)?;
        let root = Node::read(dev, omap.tree_oid() * bs, self.block_size())?;

        let mut volumes = Vec::new();
        for (_, paddr) in root.omap_entries()? {
            let mut raw = [0u8; core::mem::size_of::<ApfsVolumeSuperblock>()];
            dev.read_exact_at(paddr * bs, &mut raw)?;

            let vsb: ApfsVolumeSuperblock = bytemuck::pod_read_unaligned(&raw);
            if &vsb.magic != APSB_MAGIC {
                return Err(Error::CorruptStructure(format!(
                    "object map leaf points at block {paddr}, which is not a volume superblock"
                )));
            }

            volumes.push(VolumeInfo {
                omap_oid: u64::from_le(vsb.omap_oid),
                root_tree_oid: u64::from_le(vsb.root_tree_oid),
            });
        }

        Ok(volumes)
    }

    /// Resolves the physical location of every inode record in the container.
    ///
    /// For each volume, the volume object map enumerates the nodes of the file-system
    /// tree. The volume's own root node is skipped when its OID is the first enumerated
    /// one; the remaining leaf nodes are scanned for records whose kind tag marks an
    /// inode.
    pub fn all_inodes<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
    ) -> Result<Vec<InodeLocation>> {
        let bs = u64::from(self.block_size());
        let mut locations = Vec::new();

        for volume in self.volumes(dev)? {
            let omap = OmapPhys::read(dev, volume.omap_oid * bs)?;
            let vroot = Node::read(dev, omap.tree_oid() * bs, self.block_size())?;

            let mut mappings = vroot.omap_entries()?;
            if let Some(&(first_oid, _)) = mappings.first() {
                if first_oid == volume.root_tree_oid {
                    mappings.remove(0);
                }
            }

            for (_, paddr) in mappings {
                let node = Node::read(dev, paddr * bs, self.block_size())?;
                if !node.is_leaf() {
                    continue;
                }

                for record in node.fs_leaf_records()? {
                    if record.kind == RECORD_KIND_INODE {
                        locations.push(InodeLocation {
                            block: paddr * bs,
                            offset: record.value_offset,
                        });
                    }
                }
            }

            debug!(
                target: "apfs",
                "volume omap at block {}: {} inode records so far",
                volume.omap_oid,
                locations.len()
            );
        }

        Ok(locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_superblock_field_offsets() {
        assert_eq!(core::mem::size_of::<ObjPhys>(), 32);
        assert_eq!(core::mem::size_of::<NxSuperblock>(), 176);
        assert_eq!(core::mem::size_of::<ApfsVolumeSuperblock>(), 144);
        assert_eq!(core::mem::offset_of!(NxSuperblock, omap_oid), 160);
        assert_eq!(core::mem::offset_of!(ApfsVolumeSuperblock, omap_oid), 128);
    }
}
