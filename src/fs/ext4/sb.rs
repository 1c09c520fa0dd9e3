//! ext4 Superblock related structures.
//!
//! The superblock stores various information about the filesystem (supported features,
//! block count, inode count, ...). It starts 1024 bytes into the volume, and copies are
//! kept in other block groups: in every group, or only in groups 0, 1 and powers of 3, 5
//! and 7 when the `sparse_super` feature is set.

use bytemuck::{Pod, Zeroable};

use crate::errors::{CanFail, Error};

/// Byte offset of the primary superblock.
pub const SUPERBLOCK_OFFSET: u64 = 1024;

/// On-disk size of the superblock structure.
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Defines a standard structure for flag-related fields in the [`Ext4Superblock`].
macro_rules! ext4_flag_field {
    ($struct_name: tt, $size: ident, $desc: literal) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
        #[repr(transparent)]
        #[doc = $desc]
        pub struct $struct_name($size);

        impl $struct_name {
            /// Checks if this set includes all the flags passed as argument.
            pub fn includes(self, features: Self) -> bool {
                <$size>::from_le(self.0) & <$size>::from_le(features.0)
                    == <$size>::from_le(features.0)
            }
        }
    };
}

ext4_flag_field!(
    IncompatibleFeatureSet,
    u32,
    "Incompatible feature set flags. The system should not mount the filesystem if it \
does not understand one of the incompatible feature flags defined in the superblock."
);

impl IncompatibleFeatureSet {
    /// This feature allows the mapping of logical to physical blocks to be stored using
    /// an extent tree.
    pub const EXT4_FEATURE_INCOMPAT_EXTENTS: Self = Self(0x0040u32.to_le());

    /// This feature allows for a file system size above 2^32 blocks, and widens group
    /// descriptors to 64 bytes.
    pub const EXT4_FEATURE_INCOMPAT_64BIT: Self = Self(0x0080u32.to_le());
}

ext4_flag_field!(
    ReadOnlyCompatibleFeatureSet,
    u32,
    "Read-only compatible feature set flags. If the system does not understand one of \
these flags, it may still mount the filesystem read-only."
);

impl ReadOnlyCompatibleFeatureSet {
    /// Backup copies of the superblock and group descriptors are present only in a
    /// subset of block groups.
    pub const EXT4_FEATURE_R0_COMPAT_SPARSE_SUPER: Self = Self(0x0001u32.to_le());
}

ext4_flag_field!(
    CompatibleFeatureSet,
    u32,
    "Compatible feature set flags. The system may still read/write to this filesystem \
even if it doesn't implement all flags defined in the superblock."
);

impl CompatibleFeatureSet {
    /// Space has been reserved so that the block group descriptor table can be extended
    /// while resizing a mounted file system.
    pub const EXT4_FEATURE_COMPAT_RESIZE_INODE: Self = Self(0x0010u32.to_le());
}

/// Magic number [`Ext4Superblock`] field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Ext4SuperblockMagic(u16);

impl Ext4SuperblockMagic {
    pub const MAGIC: Self = Self(0xEF53u16.to_le());

    pub fn is_valid(self) -> bool {
        self == Self::MAGIC
    }
}

/// The ext4 `Superblock` holds useful information about the filesystem's characteristics
/// and attributes (block count, sizes, required features, ...).
///
/// Only the first 256 bytes are represented; the techniques in this crate do not consume
/// anything past the descriptor size field.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct Ext4Superblock {
    /// Inodes count
    inodes_count: u32,

    /// Blocks count
    blocks_count: u32,

    /// Reserved blocks count
    r_blocks_count: u32,

    /// Free blocks count
    free_blocks_count: u32,

    /// Free inodes count
    free_inodes_count: u32,

    /// First Data Block.
    ///
    /// Block number of the block containing the superblock: 1 on 1024-byte block
    /// filesystems, 0 otherwise.
    first_data_block: u32,

    /// Block size.
    ///
    /// Defined as `log_2(block_size) - 10`
    log_block_size: u32,

    /// Allocation cluster size.
    ///
    /// Defined as `log_2(cluster_size) - 10`
    log_cluster_size: u32,

    /// Number of blocks in each group
    blocks_per_group: u32,

    /// Number of clusters in each group
    clusters_per_group: u32,

    /// Number of inodes in each group
    inodes_per_group: u32,

    /// Last mount time
    mtime: u32,

    /// Last write time
    wtime: u32,

    /// Mount count (since last consistency check)
    mnt_count: u16,

    /// Number of mounts allowed before a consistency check is required
    max_mnt_count: u16,

    /// `ext4` magic signature: `0xEF53`
    magic: Ext4SuperblockMagic,

    /// File system state
    state: u16,

    /// Behavior on error detection
    errors: u16,

    /// Minor revision level
    minor_rev_level: u16,

    /// Time of last consistency check
    lastcheck: u32,

    /// Max time between successive consistency checks
    checkinterval: u32,

    /// Operating System ID from which the filesystem was created
    creator_os: u32,

    /// Major revision level
    rev_level: u32,

    /// Default user ID for reserved blocks
    def_resuid: u16,

    /// Default group ID for reserved blocks
    def_resgid: u16,

    /// First non-reserved inode in file system
    first_ino: u32,

    /// Size of each inode structure in bytes
    inode_size: u16,

    /// Block group number of this superblock
    block_group_nr: u16,

    /// Compatible feature set
    feature_compat: CompatibleFeatureSet,

    /// Incompatible feature set
    feature_incompat: IncompatibleFeatureSet,

    /// Read-only compatible feature set
    feature_ro_compat: ReadOnlyCompatibleFeatureSet,

    /// 128-bit UUID for volume
    uuid: [u8; 16],

    /// Volume name
    volume_name: [u8; 16],

    /// Directory where the filesystem was last mounted
    last_mounted: [u8; 64],

    /// Compression usage bitmap (unused)
    algorithm_usage_bitmap: u32,

    /// Number of blocks to preallocate for files
    prealloc_blocks: u8,

    /// Number of blocks to preallocate for directories
    prealloc_dir_blocks: u8,

    /// Number of reserved GDT entries for future filesystem growth
    reserved_gdt_blocks: u16,

    /// UUID of the journal superblock
    journal_uuid: [u8; 16],

    /// Inode number of the journal file
    journal_inum: u32,

    /// Device number of the journal file
    journal_dev: u32,

    /// Start of the list of orphaned inodes to delete
    last_orphan: u32,

    /// HTREE hash seed
    hash_seed: [u32; 4],

    /// Default hash algorithm to use for directory hashes
    def_hash_version: u8,

    /// Journal backup type
    jnl_backup_type: u8,

    /// Size of group descriptors, in bytes, if the 64bit incompat feature flag is set
    desc_size: u16,
}

impl Ext4Superblock {
    /// Validates the magic signature and the geometry fields the parsers rely on.
    pub fn validate(&self) -> CanFail<Error> {
        if !self.magic.is_valid() {
            return Err(Error::CorruptStructure("invalid ext superblock magic".into()));
        }
        if u32::from_le(self.log_block_size) > 6 {
            return Err(Error::CorruptStructure(format!(
                "unreasonable block size exponent {}",
                u32::from_le(self.log_block_size)
            )));
        }
        if self.blocks_per_group() == 0 || self.inodes_per_group() == 0 {
            return Err(Error::CorruptStructure("null group geometry".into()));
        }
        if self.inode_size() < 128 || !self.inode_size().is_power_of_two() {
            return Err(Error::CorruptStructure(format!(
                "invalid inode size {}",
                self.inode_size()
            )));
        }

        Ok(())
    }

    /// Size of a logical block, in bytes.
    pub fn blk_size(&self) -> u64 {
        1024 << u32::from_le(self.log_block_size)
    }

    /// Total count of blocks on the filesystem.
    pub fn blk_count(&self) -> u64 {
        u64::from(u32::from_le(self.blocks_count))
    }

    /// Total count of inodes on the filesystem.
    pub fn inodes_count(&self) -> u32 {
        u32::from_le(self.inodes_count)
    }

    /// Count of inodes in each block group.
    pub fn inodes_per_group(&self) -> u32 {
        u32::from_le(self.inodes_per_group)
    }

    /// Count of blocks in each block group.
    pub fn blocks_per_group(&self) -> u32 {
        u32::from_le(self.blocks_per_group)
    }

    /// Block number of the block holding the primary superblock.
    pub fn first_data_block(&self) -> u64 {
        u64::from(u32::from_le(self.first_data_block))
    }

    /// Size of an on-disk inode structure, in bytes.
    pub fn inode_size(&self) -> u16 {
        u16::from_le(self.inode_size)
    }

    /// Count of block groups on the filesystem.
    pub fn bg_count(&self) -> u32 {
        let blocks = self.blk_count();
        let per_group = u64::from(self.blocks_per_group());

        u32::try_from(blocks.div_ceil(per_group)).unwrap_or(u32::MAX)
    }

    /// Size of a group descriptor, in bytes.
    pub fn desc_size(&self) -> u64 {
        if self
            .feature_incompat
            .includes(IncompatibleFeatureSet::EXT4_FEATURE_INCOMPAT_64BIT)
        {
            let size = u64::from(u16::from_le(self.desc_size));
            if size >= 64 {
                return size;
            }
        }

        32
    }

    /// Count of GDT entries reserved in each backup-holding group for future growth.
    pub fn reserved_gdt_blocks(&self) -> u32 {
        u32::from(u16::from_le(self.reserved_gdt_blocks))
    }

    /// Whether superblock/GDT backups are kept only in a sparse subset of groups.
    pub fn sparse_super(&self) -> bool {
        self.feature_ro_compat
            .includes(ReadOnlyCompatibleFeatureSet::EXT4_FEATURE_R0_COMPAT_SPARSE_SUPER)
    }

    /// Whether the given block group holds a superblock (and GDT) backup.
    ///
    /// Without `sparse_super`, every group does. With it, only groups 0 and 1 and
    /// powers of 3, 5 and 7.
    pub fn group_has_backup(&self, group: u32) -> bool {
        if !self.sparse_super() {
            return true;
        }
        if group <= 1 {
            return true;
        }

        [3u32, 5, 7].iter().any(|&base| {
            let mut power = base;
            while power < group {
                power = match power.checked_mul(base) {
                    Some(p) => p,
                    None => return false,
                };
            }
            power == group
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superblock_layout_is_256_bytes() {
        assert_eq!(core::mem::size_of::<Ext4Superblock>(), 256);
    }

    #[test]
    fn sparse_super_backup_groups() {
        let mut raw = [0u8; 256];
        raw[56..58].copy_from_slice(&0xEF53u16.to_le_bytes());
        raw[100..104].copy_from_slice(&1u32.to_le_bytes());
        let sb: Ext4Superblock = bytemuck::pod_read_unaligned(&raw);

        for group in [0, 1, 3, 9, 25, 27, 49] {
            assert!(sb.group_has_backup(group), "group {group}");
        }
        for group in [2, 4, 6, 10, 50] {
            assert!(!sb.group_has_backup(group), "group {group}");
        }
    }
}
