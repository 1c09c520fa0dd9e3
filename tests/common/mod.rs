//! Synthetic filesystem images for the integration suites.
//!
//! Each builder lays out the minimum set of on-disk structures the parsers consume,
//! with every slack region zero-filled. The geometry constants below are re-exported so
//! the suites can compute expected offsets independently of the parsers under test.

#![allow(dead_code)]

pub fn put_u16(image: &mut [u8], offset: usize, value: u16) {
    image[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u32(image: &mut [u8], offset: usize, value: u32) {
    image[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn put_u64(image: &mut [u8], offset: usize, value: u64) {
    image[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// FAT16
// ---------------------------------------------------------------------------

/// Cluster size of the FAT16 image: 8 sectors of 512 bytes.
pub const FAT16_CLUSTER_SIZE: u32 = 4096;

/// Byte offset of cluster 2 on the FAT16 image (data starts at sector 65).
pub const FAT16_DATA_OFFSET: usize = 65 * 512;

/// Size of the single file on the FAT16 image.
pub const FAT16_FILE_SIZE: u32 = 7;

/// A 512 KiB FAT16 volume holding one 7-byte file `HELLO.TXT` in cluster 2.
///
/// Geometry: 512-byte sectors, 8 sectors per cluster, 1 reserved sector, two FATs of
/// 16 sectors, 512 root entries (32 sectors). Data area starts at sector 65.
pub fn fat16_image() -> Vec<u8> {
    let mut image = vec![0u8; 1024 * 512];

    put_u16(&mut image, 11, 512); // bytes per sector
    image[13] = 8; // sectors per cluster
    put_u16(&mut image, 14, 1); // reserved sectors
    image[16] = 2; // FAT count
    put_u16(&mut image, 17, 512); // root entries
    put_u16(&mut image, 19, 1024); // total sectors
    image[21] = 0xF8; // media descriptor
    put_u16(&mut image, 22, 16); // FAT size in sectors
    image[54..62].copy_from_slice(b"FAT16   ");
    image[510] = 0x55;
    image[511] = 0xAA;

    // FAT entries 0 and 1 are reserved; the file occupies cluster 2, end of chain.
    for fat_base in [512, 17 * 512] {
        put_u16(&mut image, fat_base, 0xFFF8);
        put_u16(&mut image, fat_base + 2, 0xFFFF);
        put_u16(&mut image, fat_base + 4, 0xFFFF);
    }

    // Root directory entry for HELLO.TXT.
    let root = 33 * 512;
    image[root..root + 11].copy_from_slice(b"HELLO   TXT");
    image[root + 11] = 0x20; // archive
    put_u16(&mut image, root + 26, 2); // first cluster
    put_u32(&mut image, root + 28, FAT16_FILE_SIZE);

    image[FAT16_DATA_OFFSET..FAT16_DATA_OFFSET + 7].copy_from_slice(b"content");

    image
}

// ---------------------------------------------------------------------------
// FAT12
// ---------------------------------------------------------------------------

/// Cluster size of the FAT12 image: one 512-byte sector.
pub const FAT12_CLUSTER_SIZE: u32 = 512;

/// Byte offset of cluster 2 on the FAT12 image (data starts at sector 6).
pub const FAT12_DATA_OFFSET: usize = 6 * 512;

/// A 32 KiB FAT12 volume holding one 10-byte file `A.TXT` in cluster 2.
///
/// Geometry: 512-byte sectors, 1 sector per cluster, 1 reserved sector, two FATs of
/// 2 sectors, 16 root entries (1 sector). Data area starts at sector 6; 58 clusters.
pub fn fat12_image() -> Vec<u8> {
    let mut image = vec![0u8; 64 * 512];

    put_u16(&mut image, 11, 512);
    image[13] = 1;
    put_u16(&mut image, 14, 1);
    image[16] = 2;
    put_u16(&mut image, 17, 16);
    put_u16(&mut image, 19, 64);
    image[21] = 0xF8;
    put_u16(&mut image, 22, 2);
    image[54..62].copy_from_slice(b"FAT12   ");
    image[510] = 0x55;
    image[511] = 0xAA;

    // FAT12 entries 0..3: 0xFF8, 0xFFF, 0xFFF (A.TXT, end of chain), 0x000.
    for fat_base in [512, 3 * 512] {
        image[fat_base] = 0xF8;
        image[fat_base + 1] = 0xFF;
        image[fat_base + 2] = 0xFF;
        image[fat_base + 3] = 0xFF;
        image[fat_base + 4] = 0x0F;
    }

    let root = 5 * 512;
    image[root..root + 11].copy_from_slice(b"A       TXT");
    image[root + 11] = 0x20;
    put_u16(&mut image, root + 26, 2);
    put_u32(&mut image, root + 28, 10);

    image[FAT12_DATA_OFFSET..FAT12_DATA_OFFSET + 10].copy_from_slice(b"0123456789");

    image
}

// ---------------------------------------------------------------------------
// FAT32
// ---------------------------------------------------------------------------

/// A 512 KiB FAT32 volume with an empty-but-for-one-file root directory.
///
/// Geometry: 512-byte sectors, 1 sector per cluster, 32 reserved sectors, two FATs of
/// 4 sectors. Root directory is cluster 2; `B.BIN` (100 bytes) occupies cluster 3.
pub fn fat32_image() -> Vec<u8> {
    let mut image = vec![0u8; 1024 * 512];

    put_u16(&mut image, 11, 512);
    image[13] = 1;
    put_u16(&mut image, 14, 32);
    image[16] = 2;
    put_u32(&mut image, 32, 550); // total sectors (32-bit), 510 data clusters
    put_u32(&mut image, 36, 4); // FAT size (32-bit)
    put_u16(&mut image, 42, 0); // fat version
    put_u32(&mut image, 44, 2); // root cluster
    image[82..90].copy_from_slice(b"FAT32   ");
    image[510] = 0x55;
    image[511] = 0xAA;

    // FAT entries: reserved, reserved, root (EOC), B.BIN (EOC).
    for fat_base in [32 * 512, 36 * 512] {
        put_u32(&mut image, fat_base, 0x0FFF_FFF8);
        put_u32(&mut image, fat_base + 4, 0x0FFF_FFFF);
        put_u32(&mut image, fat_base + 8, 0x0FFF_FFFF);
        put_u32(&mut image, fat_base + 12, 0x0FFF_FFFF);
    }

    // Root directory entry for B.BIN, in cluster 2 (data starts at sector 40).
    let root = 40 * 512;
    image[root..root + 11].copy_from_slice(b"B       BIN");
    image[root + 11] = 0x20;
    put_u16(&mut image, root + 26, 3);
    put_u32(&mut image, root + 28, 100);

    image
}

/// The FAT32 boot sector with the version field set to 1 (FAT+).
pub fn fat_plus_image() -> Vec<u8> {
    let mut image = fat32_image();
    put_u16(&mut image, 42, 1);

    image
}

// ---------------------------------------------------------------------------
// ext4
// ---------------------------------------------------------------------------

/// Block size of the ext4 image.
pub const EXT4_BLOCK_SIZE: u64 = 4096;

/// Inode count (one group) of the ext4 image.
pub const EXT4_INODE_COUNT: u32 = 1024;

/// On-disk inode size of the ext4 image.
pub const EXT4_INODE_SIZE: u64 = 256;

/// First block of the inode table on the ext4 image.
pub const EXT4_INODE_TABLE_BLOCK: u64 = 8;

/// Reserved GDT blocks of the ext4 image: blocks 2..6.
pub const EXT4_RESERVED_GDT_FIRST: u64 = 2;
pub const EXT4_RESERVED_GDT_COUNT: u32 = 4;

/// Absolute byte offset of the osd2 tail of inode `n` (1-based) on the ext4 image.
pub fn ext4_osd2_offset(inode: u32) -> usize {
    (EXT4_INODE_TABLE_BLOCK * EXT4_BLOCK_SIZE) as usize
        + (inode as usize - 1) * EXT4_INODE_SIZE as usize
        + 0x74
        + 0x0A
}

/// A 2 MiB single-group ext4 filesystem: 512 blocks of 4096 bytes, 1024 inodes of 256
/// bytes, sparse_super + resize_inode, 4 reserved GDT blocks.
///
/// Layout: block 0 = padding + superblock, block 1 = group descriptor table, blocks
/// 2..6 = reserved GDT blocks, block 6 = block bitmap, block 7 = inode bitmap, blocks
/// 8..72 = inode table (zeroed, so every osd2 tail reads empty).
pub fn ext4_image() -> Vec<u8> {
    let mut image = vec![0u8; 512 * EXT4_BLOCK_SIZE as usize];
    let sb = 1024;

    put_u32(&mut image, sb, EXT4_INODE_COUNT); // inodes_count
    put_u32(&mut image, sb + 4, 512); // blocks_count
    put_u32(&mut image, sb + 20, 0); // first_data_block
    put_u32(&mut image, sb + 24, 2); // log_block_size (4096)
    put_u32(&mut image, sb + 28, 2); // log_cluster_size
    put_u32(&mut image, sb + 32, 32768); // blocks_per_group
    put_u32(&mut image, sb + 36, 32768); // clusters_per_group
    put_u32(&mut image, sb + 40, EXT4_INODE_COUNT); // inodes_per_group
    put_u16(&mut image, sb + 52, 1); // mount count
    put_u16(&mut image, sb + 56, 0xEF53); // magic
    put_u16(&mut image, sb + 58, 1); // state: cleanly unmounted
    put_u32(&mut image, sb + 76, 1); // rev_level
    put_u32(&mut image, sb + 84, 11); // first_ino
    put_u16(&mut image, sb + 88, EXT4_INODE_SIZE as u16); // inode_size
    put_u32(&mut image, sb + 92, 0x0010); // feature_compat: resize_inode
    put_u32(&mut image, sb + 96, 0x0040); // feature_incompat: extents
    put_u32(&mut image, sb + 100, 0x0001); // feature_ro_compat: sparse_super
    put_u16(&mut image, sb + 206, EXT4_RESERVED_GDT_COUNT as u16); // reserved_gdt_blocks

    // Group 0 descriptor.
    let gdt = EXT4_BLOCK_SIZE as usize;
    put_u32(&mut image, gdt, 6); // block bitmap
    put_u32(&mut image, gdt + 4, 7); // inode bitmap
    put_u32(&mut image, gdt + 8, EXT4_INODE_TABLE_BLOCK as u32); // inode table

    image
}

// ---------------------------------------------------------------------------
// APFS
// ---------------------------------------------------------------------------

/// Block size of the APFS image.
pub const APFS_BLOCK_SIZE: u32 = 4096;

/// Expected inode record locations on the APFS image: `(block byte address, offset)`.
pub const APFS_INODE_LOCATIONS: [(u64, u32); 3] = [
    (10 * APFS_BLOCK_SIZE as u64, 4004),
    (10 * APFS_BLOCK_SIZE as u64, 3912),
    (12 * APFS_BLOCK_SIZE as u64, 4004),
];

fn node_header(image: &mut [u8], block: usize, flags: u16, nkeys: u32, table_len: u16) {
    let base = block * APFS_BLOCK_SIZE as usize;
    put_u16(image, base + 32, flags);
    put_u16(image, base + 34, 0); // level
    put_u32(image, base + 36, nkeys);
    put_u16(image, base + 40, 0); // table space offset
    put_u16(image, base + 42, table_len);
}

/// Writes one fixed-size object-map entry: key `(oid, xid)` and value `(flags, size,
/// paddr)`. Key offsets are relative to the key area; value offsets count back from the
/// end of the value area.
fn omap_entry(image: &mut [u8], block: usize, index: usize, oid: u64, paddr: u64) {
    let base = block * APFS_BLOCK_SIZE as usize;
    let key_area = base + 56 + 16;
    let value_end = base + APFS_BLOCK_SIZE as usize - 40; // root nodes carry the footer

    let key_off = (index * 16) as u16;
    let val_off = ((index + 1) * 16) as u16;
    put_u16(image, base + 56 + index * 4, key_off);
    put_u16(image, base + 56 + index * 4 + 2, val_off);

    put_u64(image, key_area + key_off as usize, oid);
    put_u64(image, key_area + key_off as usize + 8, 1); // xid
    put_u64(image, value_end - val_off as usize + 8, paddr);
}

/// Writes one variable-size file-system-tree entry with a 12-byte key whose tag encodes
/// `kind`, and a value of `val_len` bytes placed `val_off` bytes before the block end.
fn fs_entry(
    image: &mut [u8],
    block: usize,
    index: usize,
    table_len: u16,
    kind: u32,
    val_off: u16,
    val_len: u16,
) {
    let base = block * APFS_BLOCK_SIZE as usize;
    let toc = base + 56 + index * 8;
    let key_off = (index * 12) as u16;

    put_u16(image, toc, key_off);
    put_u16(image, toc + 2, 12);
    put_u16(image, toc + 4, val_off);
    put_u16(image, toc + 6, val_len);

    let key_area = base + 56 + table_len as usize;
    put_u32(image, key_area + key_off as usize, 0x10 + index as u32); // object id low half
    put_u32(image, key_area + key_off as usize + 4, kind << 28);
}

/// A 64 KiB APFS container with two volumes.
///
/// Volume A's file-system tree has one leaf (block 10) holding two inode records and an
/// extended-attribute record; volume B's tree has one leaf (block 12) with a single
/// inode record. Each volume's object map lists its root node first, which the
/// traversal must skip.
pub fn apfs_image() -> Vec<u8> {
    let bs = APFS_BLOCK_SIZE as usize;
    let mut image = vec![0u8; 16 * bs];

    // Container superblock.
    image[32..36].copy_from_slice(b"NXSB");
    put_u32(&mut image, 36, APFS_BLOCK_SIZE);
    put_u64(&mut image, 40, 16); // block count
    put_u64(&mut image, 160, 1); // container omap

    // Container omap (block 1) and its root node (block 2), mapping the two volumes.
    put_u64(&mut image, bs + 48, 2);
    node_header(&mut image, 2, 0x7, 2, 16);
    omap_entry(&mut image, 2, 0, 0x400, 3);
    omap_entry(&mut image, 2, 1, 0x401, 4);

    // Volume superblocks.
    for (block, omap, root_tree) in [(3usize, 5u64, 0x500u64), (4, 6, 0x600)] {
        let base = block * bs;
        image[base + 32..base + 36].copy_from_slice(b"APSB");
        put_u64(&mut image, base + 128, omap);
        put_u64(&mut image, base + 136, root_tree);
    }

    // Volume object maps and their root nodes. The first mapping of each is the
    // volume's own root tree node.
    put_u64(&mut image, 5 * bs + 48, 7);
    put_u64(&mut image, 6 * bs + 48, 8);
    node_header(&mut image, 7, 0x7, 2, 16);
    omap_entry(&mut image, 7, 0, 0x500, 9);
    omap_entry(&mut image, 7, 1, 0x501, 10);
    node_header(&mut image, 8, 0x7, 2, 16);
    omap_entry(&mut image, 8, 0, 0x600, 11);
    omap_entry(&mut image, 8, 1, 0x601, 12);

    // File-system tree root nodes (skipped by the traversal, left empty).
    node_header(&mut image, 9, 0x3, 0, 0);
    node_header(&mut image, 11, 0x3, 0, 0);

    // Volume A leaf: two inode records and one extended-attribute record.
    node_header(&mut image, 10, 0x2, 3, 24);
    fs_entry(&mut image, 10, 0, 24, 3, 92, 92);
    fs_entry(&mut image, 10, 1, 24, 3, 184, 92);
    fs_entry(&mut image, 10, 2, 24, 4, 200, 16);

    // Volume B leaf: a single inode record.
    node_header(&mut image, 12, 0x2, 1, 8);
    fs_entry(&mut image, 12, 0, 8, 3, 92, 92);

    image
}
