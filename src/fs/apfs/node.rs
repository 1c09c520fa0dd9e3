//! APFS B-tree nodes.
//!
//! A node block begins with a fixed 56-byte header, followed by a table of contents,
//! a key area growing downwards from the table, and a value area growing upwards from
//! the end of the block. Value offsets in the table are counted backwards from the end
//! of the value area; on a root node, the last 40 bytes of the block hold the static
//! tree information footer, so the value area ends 40 bytes early. This is where the
//! `block_size - value_offset - 40 * (flags & 1)` resolution below comes from: the root
//! flag is bit 0.

use bytemuck::{Pod, Zeroable};
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::{Error, Result};
use crate::fs::apfs::ObjPhys;

/// Flag marking a root node. Root nodes carry a 40-byte tree-info footer.
pub const BTNODE_ROOT: u16 = 0x1;

/// Flag marking a leaf node.
pub const BTNODE_LEAF: u16 = 0x2;

/// Flag marking a node whose table of contents uses fixed-size key/value offsets.
pub const BTNODE_FIXED_KV_SIZE: u16 = 0x4;

/// Size of the `btree_info` footer of a root node.
const BTREE_INFO_SIZE: u32 = 40;

/// A location within a node: offset and length, both in bytes.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct Nloc {
    off: u16,
    len: u16,
}

/// Fixed-size table-of-contents entry: key and value offsets only.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct KvOff {
    k: u16,
    v: u16,
}

/// Variable-size table-of-contents entry: key and value locations.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct KvLoc {
    k: Nloc,
    v: Nloc,
}

/// Fixed header of every B-tree node block.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct BtreeNodePhys {
    header: ObjPhys,

    /// Node flags
    flags: u16,

    /// Depth of the node in the tree; zero for leaves
    level: u16,

    /// Count of keys stored in this node
    nkeys: u32,

    /// Location of the table of contents, relative to the end of this header
    table_space: Nloc,

    /// Location of the free space shared by keys and values
    free_space: Nloc,

    /// Linked list of free key space
    key_free_list: Nloc,

    /// Linked list of free value space
    val_free_list: Nloc,
}

/// Size of [`BtreeNodePhys`]; key and value areas start past this.
const NODE_HEADER_SIZE: u32 = 56;

/// One record of a file-system tree leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsLeafRecord {
    /// Record kind: the high nibble of the key's 32-bit type tag.
    pub kind: u32,

    /// Offset of the record's value from the start of the node block.
    pub value_offset: u32,
}

/// An in-memory B-tree node, holding its whole block.
#[derive(Clone, Debug)]
pub struct Node {
    phys: BtreeNodePhys,
    raw: Vec<u8>,
    block_size: u32,
}

impl Node {
    /// Reads the node block at an absolute byte address.
    pub fn read<D: ReadAt + WriteAt + Size>(
        dev: &Device<D>,
        byte_addr: u64,
        block_size: u32,
    ) -> Result<Self> {
        let mut raw = vec![0u8; block_size as usize];
        dev.read_exact_at(byte_addr, &mut raw)?;

        let phys: BtreeNodePhys = bytemuck::pod_read_unaligned(&raw[..NODE_HEADER_SIZE as usize]);

        Ok(Self {
            phys,
            raw,
            block_size,
        })
    }

    pub fn flags(&self) -> u16 {
        u16::from_le(self.phys.flags)
    }

    pub fn is_root(&self) -> bool {
        self.flags() & BTNODE_ROOT != 0
    }

    pub fn is_leaf(&self) -> bool {
        self.flags() & BTNODE_LEAF != 0
    }

    pub fn is_fixed_kv(&self) -> bool {
        self.flags() & BTNODE_FIXED_KV_SIZE != 0
    }

    /// Count of keys stored in this node.
    pub fn nkeys(&self) -> u32 {
        u32::from_le(self.phys.nkeys)
    }

    /// Start of the table of contents, from the beginning of the block.
    fn toc_start(&self) -> u32 {
        NODE_HEADER_SIZE + u32::from(u16::from_le(self.phys.table_space.off))
    }

    /// Start of the key area, from the beginning of the block.
    fn key_area(&self) -> u32 {
        self.toc_start() + u32::from(u16::from_le(self.phys.table_space.len))
    }

    /// End of the value area, from the beginning of the block.
    ///
    /// Root nodes end 40 bytes early because of the tree-info footer.
    fn value_area_end(&self) -> u32 {
        self.block_size - BTREE_INFO_SIZE * u32::from(self.flags() & BTNODE_ROOT)
    }

    /// Decodes the entries of an object-map node as `(oid, paddr)` pairs.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CorruptStructure`] if the node's table of contents is not
    /// fixed-size, or if any entry points outside the block.
    pub fn omap_entries(&self) -> Result<Vec<(u64, u64)>> {
        if !self.is_fixed_kv() {
            return Err(Error::CorruptStructure(
                "object map node without fixed-size table of contents".into(),
            ));
        }

        let mut entries = Vec::with_capacity(self.nkeys() as usize);
        for i in 0..self.nkeys() {
            let toc: KvOff = self.read_pod(self.toc_start() + i * 4, 4)?;

            let key_off = self.key_area() + u32::from(u16::from_le(toc.k));
            let oid = u64::from_le_bytes(self.slice(key_off, 8)?.try_into().unwrap());

            // Object map value: flags, size, then the physical address.
            let value_off = self
                .value_area_end()
                .checked_sub(u32::from(u16::from_le(toc.v)))
                .ok_or_else(|| {
                    Error::CorruptStructure("object map value offset past block start".into())
                })?;
            let paddr = u64::from_le_bytes(self.slice(value_off + 8, 8)?.try_into().unwrap());

            entries.push((oid, paddr));
        }

        Ok(entries)
    }

    /// Decodes the records of a file-system tree leaf.
    ///
    /// Each record's kind is the high nibble of the 32-bit tag stored in the upper half
    /// of the key header; its value offset is resolved against the end of the value
    /// area.
    pub fn fs_leaf_records(&self) -> Result<Vec<FsLeafRecord>> {
        if self.is_fixed_kv() {
            return Err(Error::CorruptStructure(
                "file-system tree node with fixed-size table of contents".into(),
            ));
        }

        let mut records = Vec::with_capacity(self.nkeys() as usize);
        for i in 0..self.nkeys() {
            let toc: KvLoc = self.read_pod(self.toc_start() + i * 8, 8)?;

            let key_off = self.key_area() + u32::from(u16::from_le(toc.k.off));
            let tag = u32::from_le_bytes(self.slice(key_off + 4, 4)?.try_into().unwrap());

            let value_offset = self
                .value_area_end()
                .checked_sub(u32::from(u16::from_le(toc.v.off)))
                .ok_or_else(|| {
                    Error::CorruptStructure("record value offset past block start".into())
                })?;

            records.push(FsLeafRecord {
                kind: tag >> 28,
                value_offset,
            });
        }

        Ok(records)
    }

    fn read_pod<T: Pod>(&self, offset: u32, len: u32) -> Result<T> {
        Ok(bytemuck::pod_read_unaligned(self.slice(offset, len as usize)?))
    }

    fn slice(&self, offset: u32, len: usize) -> Result<&[u8]> {
        self.raw
            .get(offset as usize..offset as usize + len)
            .ok_or_else(|| {
                Error::CorruptStructure(format!(
                    "node record at {offset}..+{len} lies outside the block"
                ))
            })
    }
}
