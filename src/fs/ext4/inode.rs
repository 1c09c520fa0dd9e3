//! ext4 inode related structures.
//!
//! `Inode` (index node) structures hold data about file-system objects. The techniques
//! in this crate never interpret a whole inode: they only need to locate one by number
//! and address two specific byte ranges inside it, so this module is limited to inode
//! addressing and the layout constants of the `osd2` field.

use bytemuck::{Pod, Zeroable};

/// Byte offset of the 12-byte OS-dependent `osd2` field inside an inode.
pub const OSD2_OFFSET: u64 = 0x74;

/// Byte offset of the unused tail of `osd2`, relative to the start of the field.
///
/// On Linux the field holds `blocks_high`, `file_acl_high`, `uid_high`, `gid_high` and
/// `checksum_lo`; the final two bytes are reserved and stay zero on freshly written
/// inodes.
pub const OSD2_TAIL_OFFSET: u64 = 0x0A;

/// Width of the unused `osd2` tail, in bytes.
pub const OSD2_TAIL_SIZE: usize = 2;

/// A number representing an inode.
///
/// Inode numbers are 1-based: inode `n` lives at index `n - 1` of its group's table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct InodeNumber(pub u32);

impl InodeNumber {
    /// Inode 0 represents an unused directory entry and is never stored on disk.
    pub const UNUSED: Self = Self(0);

    /// The first valid inode number.
    pub const FIRST: Self = Self(1);

    /// Inode 2 is reserved for the root directory of the file system.
    pub const ROOT_DIR: Self = Self(2);

    /// Inode 7 is the reserved group descriptors inode, owning the reserved GDT blocks.
    pub const RESIZE: Self = Self(7);

    /// Inode 8 is the ext4 journal.
    pub const JOURNAL: Self = Self(8);

    /// The inode following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u32> for InodeNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<InodeNumber> for u32 {
    fn from(value: InodeNumber) -> Self {
        value.0
    }
}
