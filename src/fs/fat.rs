//! FAT filesystem support.
//!
//! Covers the three classic variants (FAT12, FAT16 and FAT32). The parser exposes the
//! structural facts the hiding techniques need: cluster geometry, directory entries,
//! cluster chains and per-file tail slack. All parsing is read-only; the single mutation
//! primitive is [`FatFs::write_fat_entry`], which updates every FAT copy on the volume.

use bytemuck::{Pod, Zeroable};
use hashbrown::HashSet;
use log::debug;
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::detect::FsKind;
use crate::errors::{CanFail, Error, Result};

/// Size of an on-disk directory entry.
pub const DIR_ENTRY_SIZE: usize = 32;

/// Bad cluster marker for a FAT12 file allocation table.
pub const FAT12_BAD_CLUSTER: u32 = 0xFF7;

/// Bad cluster marker for a FAT16 file allocation table.
pub const FAT16_BAD_CLUSTER: u32 = 0xFFF7;

/// The `BiosParameterBlock` contains the FAT file-system metadata.
///
/// It is located on the first sector of the volume, which may be called the `boot
/// sector`. These first 36 bytes are shared by every FAT variant; the bytes that follow
/// differ between FAT12/16 ([`Fat1216Ebpb`]) and FAT32 ([`Fat32Ebpb`]).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BiosParameterBlock {
    /// Jump instruction to boot code
    bs_jmpboot: [u8; 3],

    /// OEM Name Identifier
    bs_oemname: [u8; 8],

    /// Count of bytes per sector.
    bpb_byts_per_sec: u16,

    /// Number of sectors per allocation unit.
    ///
    /// This value must be a positive power of two
    bpb_sec_per_clus: u8,

    /// Number of reserved sectors in the reserved region of the volume starting at the
    /// first sector of the volume.
    bpb_rsvd_sec_cnt: u16,

    /// The count of File Allocation Tables (FAT) on the volume
    bpb_num_fats: u8,

    /// Count of 32-byte entries in the root directory.
    ///
    /// Must be null on FAT32, where the root directory is an ordinary cluster chain.
    bpb_root_ent_cnt: u16,

    /// 16-bit total count of sectors on the volume.
    ///
    /// Null when the count does not fit, in which case `bpb_tot_sec_32` holds it.
    bpb_tot_sec_16: u16,

    /// Media descriptor byte
    bpb_media: u8,

    /// 16-bit count of sectors occupied by one FAT.
    ///
    /// Null on FAT32, which uses the 32-bit count in its extended BPB.
    bpb_fat_sz_16: u16,

    /// Sectors per track for interrupt 13h
    bpb_sec_per_trk: u16,

    /// Number of heads for interrupt 13h
    bpb_num_heads: u16,

    /// Count of hidden sectors preceding the partition that contains the FAT volume.
    bpb_hidd_sec: u32,

    /// 32-bit total count of sectors on the volume.
    bpb_tot_sec_32: u32,
}

/// Extended BPB bytes at offset 36 on FAT12 and FAT16 volumes.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Fat1216Ebpb {
    /// Interrupt 13h drive number.
    bs_drv_num: u8,

    reserved: u8,

    /// Extended boot signature.
    ///
    /// Set to `0x29` if either of the following two fields are non-zero.
    bs_bootsig: u8,

    /// Volume serial number
    bs_vol_id: u32,

    /// Volume label
    bs_vol_lab: [u8; 11],

    /// `"FAT12   "` or `"FAT16   "`
    bs_fil_sys_type: [u8; 8],
}

/// Extended BPB bytes at offset 36 on FAT32 volumes.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Fat32Ebpb {
    /// FAT32 32-bit count of sectors occupied by one FAT
    bpb_fat_sz_32: u32,

    /// Flags
    bpb_ext_flags: u16,

    /// Version number.
    ///
    /// High byte is the major version, and the low byte is the minor version.
    /// A value of 1 marks the incompatible FAT+ extension.
    bpb_fs_ver: u16,

    /// Cluster number of the first cluster of the root directory
    bpb_root_clus: u32,

    /// Sector number of FSINFO structure in the reserved area of the FAT32 volume
    bpb_fs_info: u16,

    /// Indicates the sector number in the reserved area of a copy of the boot record.
    bpb_bk_boot_sec: u16,

    reserved: [u8; 12],

    /// Interrupt 13h drive number.
    bs_drv_num: u8,

    reserved1: u8,

    /// Extended boot signature.
    bs_bootsig: u8,

    /// Volume serial number
    bs_vol_id: u32,

    /// Volume label
    bs_vol_lab: [u8; 11],

    /// Should be set to string `"FAT32   "`
    bs_fil_sys_type: [u8; 8],
}

pub mod file_attr {
    //! Attribute values associated with a file or a sub-directory.

    /// The file cannot be modified.
    pub const ATTR_READ_ONLY: u8 = 0x01;

    /// The corresponding file or sub-directory must not be listed unless an explicit
    /// request is issued.
    pub const ATTR_HIDDEN: u8 = 0x02;

    /// The corresponding file is tagged as a component of the operating system.
    pub const ATTR_SYSTEM: u8 = 0x04;

    /// The corresponding entry contains the volume label.
    pub const ATTR_VOLUME_ID: u8 = 0x08;

    /// The corresponding entry represents a directory.
    pub const ATTR_DIRECTORY: u8 = 0x10;

    /// This attribute must be set when the file is created, renamed or modified.
    pub const ATTR_ARCHIVE: u8 = 0x20;

    /// Marker combination for a long file name record.
    pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;
}

/// FAT Directory contents are a series of `DirectoryEntry`, which represents a contained
/// file or a sub-directory entry.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DirectoryEntry {
    /// Short file name (11 characters at most).
    ///
    /// It is composed of 2 parts:
    ///
    /// - the 8-character main part of the name
    /// - the 3-character extension
    dir_name: [u8; 11],

    /// File attributes
    dir_attr: u8,

    /// Must be null
    reserved: u8,

    /// Component of the file creation time
    ///
    /// Count of tenths of a second
    dir_crt_time_tenth: u8,

    /// Creation time with a granularity of 2 seconds.
    dir_crt_time: u16,

    /// Creation date
    dir_crt_date: u16,

    /// Last access date
    dir_lst_acc_date: u16,

    /// High 16-bits of first data cluster number for file/directory described by this
    /// entry. Always null on FAT12 and FAT16.
    dir_fst_clus_hi: u16,

    /// Last modification (write) time
    dir_wrt_time: u16,

    /// Last modification (write) date
    dir_wrt_date: u16,

    /// Low 16-bits of first data cluster number for file/directory described by this
    /// entry
    dir_fst_clus_lo: u16,

    /// 32-bit quantity containing the size in bytes for the file described by this entry
    dir_file_size: u32,
}

impl DirectoryEntry {
    /// First byte value marking the end of a directory.
    const END_MARKER: u8 = 0x00;

    /// First byte value of a deleted entry.
    const FREE_MARKER: u8 = 0xE5;

    fn is_end_marker(&self) -> bool {
        self.dir_name[0] == Self::END_MARKER
    }

    fn is_free(&self) -> bool {
        self.dir_name[0] == Self::FREE_MARKER
    }

    fn is_long_name(&self) -> bool {
        self.dir_attr & file_attr::ATTR_LONG_NAME == file_attr::ATTR_LONG_NAME
    }

    fn is_volume_label(&self) -> bool {
        self.dir_attr & file_attr::ATTR_VOLUME_ID != 0
    }

    /// Number of the first data cluster of this entry.
    pub fn first_cluster(&self) -> u32 {
        let hi = u16::from_le(self.dir_fst_clus_hi);
        let lo = u16::from_le(self.dir_fst_clus_lo);

        (u32::from(hi) << 16) | u32::from(lo)
    }

    /// Size of the file, in bytes. Null for directories.
    pub fn file_size(&self) -> u32 {
        u32::from_le(self.dir_file_size)
    }

    /// Whether this entry describes a sub-directory.
    pub fn is_directory(&self) -> bool {
        self.dir_attr & file_attr::ATTR_DIRECTORY != 0
    }

    /// The raw 11-byte short name, `8.3` padded with spaces.
    pub fn short_name_raw(&self) -> [u8; 11] {
        self.dir_name
    }

    /// The short name rendered as `NAME.EXT`.
    pub fn short_name(&self) -> String {
        let base: String = self.dir_name[..8]
            .iter()
            .copied()
            .take_while(|&b| b != b' ')
            .map(char::from)
            .collect();
        let ext: String = self.dir_name[8..]
            .iter()
            .copied()
            .take_while(|&b| b != b' ')
            .map(char::from)
            .collect();

        if ext.is_empty() {
            base
        } else {
            format!("{base}.{ext}")
        }
    }
}

/// A `FatEntry` is a decoded entry in the File Allocation Table (FAT).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatEntry {
    /// Cluster is free
    Free,

    /// Cluster is allocated.
    ///
    /// The contained value is the cluster number of the next cluster.
    Allocated(u32),

    /// Bad cluster
    Defective,

    /// Cluster is allocated and is the final cluster of the file
    EndOfChain,
}

/// Parsed structural facts about a FAT volume.
///
/// Built once from a device; holds only plain values and never caches mutable state.
#[derive(Clone, Debug)]
pub struct FatFs {
    kind: FsKind,
    bytes_per_sector: u32,
    sectors_per_cluster: u32,
    reserved_sectors: u32,
    fat_count: u32,
    fat_size_sectors: u32,
    root_entries: u32,
    /// First cluster of the root directory chain. Only meaningful on FAT32.
    root_cluster: u32,
    /// Byte offset of the fixed root directory region. Only meaningful on FAT12/16.
    root_dir_offset: u64,
    /// Byte offset of the first data cluster (cluster 2).
    data_offset: u64,
    /// Count of data clusters on the volume.
    cluster_count: u32,
}

impl FatFs {
    /// Parses the boot sector of a FAT volume of the given (pre-detected) variant.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CorruptStructure`] if the BPB carries values outside the
    /// ranges the variant allows.
    pub fn parse<D: ReadAt + WriteAt + Size>(dev: &Device<D>, kind: FsKind) -> Result<Self> {
        if !kind.is_fat() {
            return Err(Error::UnsupportedFilesystem(format!(
                "expected a FAT variant, found {kind}"
            )));
        }

        let mut boot = [0u8; 90];
        dev.read_exact_at(0, &mut boot)?;

        let bpb: BiosParameterBlock = bytemuck::pod_read_unaligned(&boot[..36]);

        let bytes_per_sector = u32::from(u16::from_le(bpb.bpb_byts_per_sec));
        let sectors_per_cluster = u32::from(bpb.bpb_sec_per_clus);
        let reserved_sectors = u32::from(u16::from_le(bpb.bpb_rsvd_sec_cnt));
        let fat_count = u32::from(bpb.bpb_num_fats);
        let root_entries = u32::from(u16::from_le(bpb.bpb_root_ent_cnt));

        if !(512..=4096).contains(&bytes_per_sector) || !bytes_per_sector.is_power_of_two() {
            return Err(Error::CorruptStructure(format!(
                "invalid sector size {bytes_per_sector}"
            )));
        }
        if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
            return Err(Error::CorruptStructure(format!(
                "invalid cluster size {sectors_per_cluster} sectors"
            )));
        }
        if reserved_sectors == 0 || fat_count == 0 {
            return Err(Error::CorruptStructure(
                "null reserved sector or FAT count".into(),
            ));
        }

        let mut root_cluster = 0;
        let fat_size_sectors = match kind {
            FsKind::Fat32 => {
                let ebpb: Fat32Ebpb = bytemuck::pod_read_unaligned(&boot[36..90]);
                root_cluster = u32::from_le(ebpb.bpb_root_clus);

                u32::from_le(ebpb.bpb_fat_sz_32)
            }
            _ => {
                let ebpb: Fat1216Ebpb = bytemuck::pod_read_unaligned(&boot[36..62]);
                if ebpb.bs_bootsig == 0x29 {
                    debug!(
                        target: "fat",
                        "volume label: {}",
                        String::from_utf8_lossy(&ebpb.bs_vol_lab)
                    );
                }

                u32::from(u16::from_le(bpb.bpb_fat_sz_16))
            }
        };
        if fat_size_sectors == 0 {
            return Err(Error::CorruptStructure("null FAT size".into()));
        }

        let total_sectors = match u16::from_le(bpb.bpb_tot_sec_16) {
            0 => u32::from_le(bpb.bpb_tot_sec_32),
            n => u32::from(n),
        };

        let root_dir_sectors = (root_entries * DIR_ENTRY_SIZE as u32).div_ceil(bytes_per_sector);
        let first_data_sector = reserved_sectors + fat_count * fat_size_sectors + root_dir_sectors;
        if total_sectors <= first_data_sector {
            return Err(Error::CorruptStructure(
                "data region lies past the end of the volume".into(),
            ));
        }

        let cluster_count = (total_sectors - first_data_sector) / sectors_per_cluster;
        let root_dir_offset = u64::from(reserved_sectors + fat_count * fat_size_sectors)
            * u64::from(bytes_per_sector);

        debug!(
            target: "fat",
            "{kind} volume: {cluster_count} clusters of {} bytes, {fat_count} FATs",
            bytes_per_sector * sectors_per_cluster
        );

        Ok(Self {
            kind,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            fat_size_sectors,
            root_entries,
            root_cluster,
            root_dir_offset,
            data_offset: root_dir_offset + u64::from(root_dir_sectors) * u64::from(bytes_per_sector),
            cluster_count,
        })
    }

    /// The FAT variant this volume was parsed as.
    pub fn kind(&self) -> FsKind {
        self.kind
    }

    /// Size of one allocation unit, in bytes.
    pub fn cluster_size(&self) -> u32 {
        self.bytes_per_sector * self.sectors_per_cluster
    }

    /// Count of data clusters on the volume.
    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    /// Byte offset of the data area of a cluster.
    pub fn cluster_offset(&self, cluster: u32) -> Result<u64> {
        self.check_cluster(cluster)?;

        Ok(self.data_offset + u64::from(cluster - 2) * u64::from(self.cluster_size()))
    }

    /// The bad-cluster marker value for this variant's FAT.
    ///
    /// # Errors
    ///
    /// FAT32 volumes are refused: their FAT entries carry reserved upper bits that some
    /// drivers rewrite, so a bad-cluster mark cannot be relied upon as a carrier.
    pub fn bad_cluster_marker(&self) -> Result<u32> {
        match self.kind {
            FsKind::Fat12 => Ok(FAT12_BAD_CLUSTER),
            FsKind::Fat16 => Ok(FAT16_BAD_CLUSTER),
            _ => Err(Error::UnsupportedFilesystem(
                "bad-cluster marking is only supported on FAT12 and FAT16".into(),
            )),
        }
    }

    /// Reads the raw FAT entry of `cluster` from the first FAT copy.
    pub fn read_fat_entry<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        cluster: u32,
    ) -> Result<u32> {
        self.check_cluster(cluster)?;
        self.read_fat_entry_from_copy(dev, 0, cluster)
    }

    /// Decodes the FAT entry of `cluster`.
    pub fn fat_entry<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        cluster: u32,
    ) -> Result<FatEntry> {
        let raw = self.read_fat_entry(dev, cluster)?;

        let (bad, eoc_min) = match self.kind {
            FsKind::Fat12 => (FAT12_BAD_CLUSTER, 0xFF8),
            FsKind::Fat16 => (FAT16_BAD_CLUSTER, 0xFFF8),
            _ => (0x0FFF_FFF7, 0x0FFF_FFF8),
        };

        Ok(if raw == 0 {
            FatEntry::Free
        } else if raw == bad {
            FatEntry::Defective
        } else if raw >= eoc_min {
            FatEntry::EndOfChain
        } else {
            FatEntry::Allocated(raw)
        })
    }

    /// Writes a raw FAT entry for `cluster`, mirrored to every FAT copy on the volume.
    ///
    /// This is the only mutation primitive the parser exposes.
    pub fn write_fat_entry<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &mut Device<D>,
        cluster: u32,
        value: u32,
    ) -> CanFail<Error> {
        self.check_cluster(cluster)?;

        for copy in 0..self.fat_count {
            let base = self.fat_offset(copy);
            match self.kind {
                FsKind::Fat12 => {
                    let off = base + u64::from(cluster) * 3 / 2;
                    let old = dev.read_u16_at(off)?;
                    let new = if cluster & 1 == 1 {
                        (old & 0x000F) | ((value as u16 & 0x0FFF) << 4)
                    } else {
                        (old & 0xF000) | (value as u16 & 0x0FFF)
                    };
                    dev.write_all_at(off, &new.to_le_bytes())?;
                }
                FsKind::Fat16 => {
                    let off = base + u64::from(cluster) * 2;
                    dev.write_all_at(off, &(value as u16).to_le_bytes())?;
                }
                _ => {
                    let off = base + u64::from(cluster) * 4;
                    let old = dev.read_u32_at(off)?;
                    let new = (old & 0xF000_0000) | (value & 0x0FFF_FFFF);
                    dev.write_all_at(off, &new.to_le_bytes())?;
                }
            }
        }

        Ok(())
    }

    /// Walks the cluster chain starting at `start`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::CorruptStructure`] on an out-of-range link, a link into a
    /// free or defective cluster, or a cycle.
    pub fn cluster_chain<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        start: u32,
    ) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = start;

        loop {
            self.check_cluster(current)?;
            if !seen.insert(current) {
                return Err(Error::CorruptStructure(format!(
                    "cyclic cluster chain through cluster {current}"
                )));
            }
            chain.push(current);

            match self.fat_entry(dev, current)? {
                FatEntry::EndOfChain => break,
                FatEntry::Allocated(next) => current = next,
                other => {
                    return Err(Error::CorruptStructure(format!(
                        "chain links into a {other:?} cluster after {current}"
                    )))
                }
            }
        }

        Ok(chain)
    }

    /// Enumerates the entries of the root directory.
    pub fn root_dir_entries<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
    ) -> Result<Vec<DirectoryEntry>> {
        match self.kind {
            FsKind::Fat32 => self.chain_dir_entries(dev, self.root_cluster),
            _ => {
                let mut raw = vec![0u8; self.root_entries as usize * DIR_ENTRY_SIZE];
                dev.read_exact_at(self.root_dir_offset, &mut raw)?;

                Ok(Self::decode_dir_region(&raw))
            }
        }
    }

    /// Enumerates the entries of the directory whose chain starts at `start`.
    pub fn chain_dir_entries<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        start: u32,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut raw = vec![0u8; self.cluster_size() as usize];
        let mut entries = Vec::new();

        for cluster in self.cluster_chain(dev, start)? {
            dev.read_exact_at(self.cluster_offset(cluster)?, &mut raw)?;
            entries.extend(Self::decode_dir_region(&raw));
        }

        Ok(entries)
    }

    /// Resolves a `/`-separated path to its directory entry, starting from the root
    /// directory. Name components use short `8.3` names, case-insensitively.
    pub fn resolve_path<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        path: &str,
    ) -> Result<DirectoryEntry> {
        let mut components = path.split('/').filter(|c| !c.is_empty()).peekable();
        let mut entries = self.root_dir_entries(dev)?;

        while let Some(component) = components.next() {
            let wanted = format_short_name(component)?;
            let entry = entries
                .iter()
                .find(|e| e.short_name_raw() == wanted)
                .copied()
                .ok_or_else(|| {
                    Error::PreconditionViolated(format!("no such file on volume: {path}"))
                })?;

            if components.peek().is_none() {
                return Ok(entry);
            }
            if !entry.is_directory() {
                return Err(Error::PreconditionViolated(format!(
                    "{component} is not a directory"
                )));
            }

            entries = self.chain_dir_entries(dev, entry.first_cluster())?;
        }

        Err(Error::PreconditionViolated("empty path".into()))
    }

    /// Collects every cluster referenced by a directory entry anywhere on the volume.
    ///
    /// Used to guarantee that a candidate carrier cluster is not reachable from any
    /// live file or directory.
    pub fn referenced_clusters<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
    ) -> Result<HashSet<u32>> {
        let mut referenced = HashSet::new();
        let mut pending: Vec<DirectoryEntry> = self.root_dir_entries(dev)?;

        if self.kind == FsKind::Fat32 {
            referenced.extend(self.cluster_chain(dev, self.root_cluster)?);
        }

        while let Some(entry) = pending.pop() {
            let start = entry.first_cluster();
            if start == 0 || referenced.contains(&start) {
                continue;
            }

            referenced.extend(self.cluster_chain(dev, start)?);
            if entry.is_directory() {
                let children = self.chain_dir_entries(dev, start)?;
                pending.extend(
                    children
                        .into_iter()
                        .filter(|e| e.short_name_raw()[0] != b'.'),
                );
            }
        }

        Ok(referenced)
    }

    fn fat_offset(&self, copy: u32) -> u64 {
        u64::from(self.reserved_sectors + copy * self.fat_size_sectors)
            * u64::from(self.bytes_per_sector)
    }

    fn read_fat_entry_from_copy<D: ReadAt + WriteAt + Size>(
        &self,
        dev: &Device<D>,
        copy: u32,
        cluster: u32,
    ) -> Result<u32> {
        let base = self.fat_offset(copy);

        Ok(match self.kind {
            FsKind::Fat12 => {
                let raw = dev.read_u16_at(base + u64::from(cluster) * 3 / 2)?;
                if cluster & 1 == 1 {
                    u32::from(raw >> 4)
                } else {
                    u32::from(raw & 0x0FFF)
                }
            }
            FsKind::Fat16 => u32::from(dev.read_u16_at(base + u64::from(cluster) * 2)?),
            _ => dev.read_u32_at(base + u64::from(cluster) * 4)? & 0x0FFF_FFFF,
        })
    }

    fn check_cluster(&self, cluster: u32) -> CanFail<Error> {
        if cluster < 2 || cluster - 2 >= self.cluster_count {
            return Err(Error::CorruptStructure(format!(
                "cluster {cluster} out of range (2..{})",
                self.cluster_count + 2
            )));
        }

        Ok(())
    }

    fn decode_dir_region(raw: &[u8]) -> Vec<DirectoryEntry> {
        let mut entries = Vec::new();

        for record in raw.chunks_exact(DIR_ENTRY_SIZE) {
            let entry: DirectoryEntry = bytemuck::pod_read_unaligned(record);
            if entry.is_end_marker() {
                break;
            }
            if entry.is_free() || entry.is_long_name() || entry.is_volume_label() {
                continue;
            }

            entries.push(entry);
        }

        entries
    }
}

/// Encodes a `NAME.EXT` component into the padded 11-byte short form.
fn format_short_name(component: &str) -> Result<[u8; 11]> {
    let mut out = [b' '; 11];
    let (base, ext) = match component.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (component, ""),
    };

    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        return Err(Error::PreconditionViolated(format!(
            "{component} is not a valid 8.3 name"
        )));
    }

    for (i, b) in base.bytes().enumerate() {
        out[i] = b.to_ascii_uppercase();
    }
    for (i, b) in ext.bytes().enumerate() {
        out[8 + i] = b.to_ascii_uppercase();
    }

    Ok(out)
}
