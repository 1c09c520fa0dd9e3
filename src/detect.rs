//! Filesystem variant detection.
//!
//! The detector probes signature fields at well-known offsets in the boot sector /
//! superblock region of a raw stream. Probe order is fixed: FAT first (cheapest probe),
//! then ext, then APFS; the first match wins. The caller's stream offset is saved on
//! entry and restored on every exit path, including failures.
//!
//! The FAT probes rely on the `fil_sys_type` string of the boot sector. That field need
//! not be correct, although common formatting tools set it the right way.

use core::fmt;
use std::io::{Read, Seek, SeekFrom};

use log::debug;
use positioned_io::{ReadAt, Size, WriteAt};

use crate::device::Device;
use crate::errors::{Error, Result};

/// `ext4` superblock signature, stored little-endian at superblock offset 0x38.
pub const EXT4_SIGNATURE: u16 = 0xEF53;

/// APFS container superblock magic, at byte 32 of block zero.
pub const APFS_SIGNATURE: &[u8; 4] = b"NXSB";

/// Byte offset of the primary ext superblock.
const EXT4_SUPERBLOCK_OFFSET: u64 = 1024;

/// A supported filesystem variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsKind {
    Fat12,
    Fat16,
    Fat32,
    Ext4,
    Apfs,
}

impl FsKind {
    /// Whether this variant is one of the FAT family.
    pub fn is_fat(self) -> bool {
        matches!(self, Self::Fat12 | Self::Fat16 | Self::Fat32)
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fat12 => f.write_str("FAT12"),
            Self::Fat16 => f.write_str("FAT16"),
            Self::Fat32 => f.write_str("FAT32"),
            Self::Ext4 => f.write_str("ext4"),
            Self::Apfs => f.write_str("APFS"),
        }
    }
}

/// Classifies the filesystem found at the stream's current offset.
///
/// The stream offset is restored before returning, on success and on failure alike.
///
/// # Errors
///
/// Fails with [`Error::UnsupportedFilesystem`] if no signature matches, or if the FAT32
/// version field marks the volume as FAT+.
pub fn detect<R: Read + Seek>(stream: &mut R) -> Result<FsKind> {
    let base = stream.stream_position()?;
    let outcome = probe(stream, base);

    stream.seek(SeekFrom::Start(base))?;
    outcome
}

/// Classifies the filesystem on a [`Device`], probing from offset zero.
pub fn detect_device<D: ReadAt + WriteAt + Size>(dev: &Device<D>) -> Result<FsKind> {
    detect(&mut dev.stream())
}

fn probe<R: Read + Seek>(stream: &mut R, base: u64) -> Result<FsKind> {
    let mut tag = [0u8; 8];
    if read_full_at(stream, base + 54, &mut tag)? {
        match &tag {
            b"FAT12   " => return Ok(FsKind::Fat12),
            b"FAT16   " => return Ok(FsKind::Fat16),
            _ => {}
        }
    }

    if read_full_at(stream, base + 82, &mut tag)? && &tag == b"FAT32   " {
        // The FAT32 signature alone does not rule out FAT+, which reuses the boot
        // sector layout with fat_version set to 1.
        let mut version = [0u8; 2];
        if read_full_at(stream, base + 42, &mut version)? {
            match u16::from_le_bytes(version) {
                0 => return Ok(FsKind::Fat32),
                1 => {
                    return Err(Error::UnsupportedFilesystem(
                        "FAT+ is currently not supported".into(),
                    ))
                }
                v => debug!(target: "detect", "unknown fat version {v:#x}, not a FAT volume"),
            }
        }
    }

    let mut magic = [0u8; 2];
    if read_full_at(stream, base + EXT4_SUPERBLOCK_OFFSET + 0x38, &mut magic)?
        && u16::from_le_bytes(magic) == EXT4_SIGNATURE
    {
        let mut incompat = [0u8; 4];
        if read_full_at(stream, base + EXT4_SUPERBLOCK_OFFSET + 0x60, &mut incompat)? {
            debug!(
                target: "detect",
                "ext superblock found, feature_incompat = {:#x}",
                u32::from_le_bytes(incompat)
            );
        }
        return Ok(FsKind::Ext4);
    }

    let mut nx_magic = [0u8; 4];
    if read_full_at(stream, base + 32, &mut nx_magic)? && &nx_magic == APFS_SIGNATURE {
        return Ok(FsKind::Apfs);
    }

    Err(Error::UnsupportedFilesystem(
        "could not detect filesystem".into(),
    ))
}

/// Reads `buf.len()` bytes at `offset`, reporting `false` on a short read.
///
/// Short reads are the one failure the detector swallows: a probe beyond the end of a
/// small image simply means the signature is absent.
fn read_full_at<R: Read + Seek>(stream: &mut R, offset: u64, buf: &mut [u8]) -> Result<bool> {
    stream.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }

    Ok(true)
}
