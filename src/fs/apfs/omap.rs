//! APFS object maps.
//!
//! An object map is a B-tree mapping virtual object identifiers to physical block
//! addresses. The `omap_phys` structure itself is tiny: everything of interest is the
//! address of the tree's root node.

use bytemuck::{Pod, Zeroable};
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::Result;
use crate::fs::apfs::ObjPhys;

/// On-disk layout of an object map.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct OmapPhys {
    header: ObjPhys,

    /// Object map flags
    flags: u32,

    /// Count of snapshots of this object map
    snap_count: u32,

    /// Type of the mapping tree
    tree_type: u32,

    /// Type of the snapshot tree
    snapshot_tree_type: u32,

    /// Physical block number of the root node of the mapping tree
    tree_oid: u64,

    /// Virtual object identifier of the snapshot tree
    snapshot_tree_oid: u64,

    /// Transaction identifier of the most recent snapshot
    most_recent_snap: u64,
}

impl OmapPhys {
    /// Reads an object map structure at an absolute byte address.
    pub fn read<D: ReadAt + WriteAt + Size>(dev: &Device<D>, byte_addr: u64) -> Result<Self> {
        let mut raw = [0u8; core::mem::size_of::<Self>()];
        dev.read_exact_at(byte_addr, &mut raw)?;

        Ok(bytemuck::pod_read_unaligned(&raw))
    }

    /// Physical block number of the root node of the mapping tree.
    pub fn tree_oid(&self) -> u64 {
        u64::from_le(self.tree_oid)
    }
}
