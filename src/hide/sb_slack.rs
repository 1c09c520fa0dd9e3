//! Hiding data in the slack after the primary ext4 superblock.
//!
//! The primary superblock occupies bytes 1024..2048 of block zero. On filesystems with
//! blocks larger than 2048 bytes, the rest of that block is allocated but never read:
//! a fixed, small carrier. The payload is stored with an embedded little-endian `u32`
//! length prefix; the recovery record carries the offset and length as well, so the
//! record alone suffices to read the payload back.

use std::io::{Read, Write};

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::{CanFail, Error, Result};
use crate::fs::ext4::Ext4Fs;
use crate::hide::read_payload;

pub const MODULE_ID: &str = "ext4-superblock-slack";

/// Start of the slack: boot area plus the superblock structure.
const SLACK_OFFSET: u64 = 2048;

/// Width of the embedded length prefix.
const LENGTH_PREFIX: u64 = 4;

/// Recovery record of the superblock-slack technique.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperblockSlackMeta {
    /// Byte offset of the payload (past the embedded length prefix).
    pub offset: u64,

    /// Payload length in bytes.
    pub length: u32,
}

/// The ext4 backend of the superblock-slack technique.
pub struct Ext4SuperblockSlack<D> {
    dev: Device<D>,
    fs: Ext4Fs,
}

impl<D: ReadAt + WriteAt + Size> Ext4SuperblockSlack<D> {
    pub fn new(dev: Device<D>) -> Result<Self> {
        let fs = Ext4Fs::parse(&dev)?;

        Ok(Self { dev, fs })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Usable slack capacity, in bytes.
    pub fn capacity(&self) -> u64 {
        self.fs
            .blk_size()
            .saturating_sub(SLACK_OFFSET + LENGTH_PREFIX)
    }

    /// Hides the input stream in the tail of block zero.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<SuperblockSlackMeta> {
        if self.fs.blk_size() <= SLACK_OFFSET + LENGTH_PREFIX {
            return Err(Error::InsufficientSpace(
                "no slack after the primary superblock on this block size".into(),
            ));
        }

        let payload = read_payload(instream)?;
        if payload.len() as u64 > self.capacity() {
            return Err(Error::InsufficientSpace(format!(
                "payload of {} bytes exceeds the {} bytes of superblock slack",
                payload.len(),
                self.capacity()
            )));
        }

        let length = payload.len() as u32;
        self.dev.write_all_at(SLACK_OFFSET, &length.to_le_bytes())?;
        self.dev.write_all_at(SLACK_OFFSET + LENGTH_PREFIX, &payload)?;

        info!(target: "sb-slack", "hid {length} bytes after the primary superblock");

        Ok(SuperblockSlackMeta {
            offset: SLACK_OFFSET + LENGTH_PREFIX,
            length,
        })
    }

    /// Replays the recorded region into the output sink.
    pub fn read(&self, meta: &SuperblockSlackMeta, outstream: &mut dyn Write) -> CanFail<Error> {
        self.check_region(meta)?;

        let mut buf = vec![0u8; meta.length as usize];
        self.dev.read_exact_at(meta.offset, &mut buf)?;
        outstream.write_all(&buf)?;

        Ok(())
    }

    /// Zero-fills the length prefix and the recorded payload region.
    pub fn clear(&mut self, meta: &SuperblockSlackMeta) -> CanFail<Error> {
        self.check_region(meta)?;

        self.dev.zero_at(
            meta.offset - LENGTH_PREFIX,
            LENGTH_PREFIX as usize + meta.length as usize,
        )
    }

    /// Capacity and usage summary.
    pub fn info(&self, meta: Option<&SuperblockSlackMeta>) -> String {
        let mut out = format!(
            "Superblock slack: {} bytes in block 0",
            self.capacity()
        );

        if let Some(meta) = meta {
            out.push_str(&format!("\nUsed: {} bytes", meta.length));
        }

        out
    }

    fn check_region(&self, meta: &SuperblockSlackMeta) -> CanFail<Error> {
        let end = meta.offset + u64::from(meta.length);
        if meta.offset < SLACK_OFFSET + LENGTH_PREFIX || end > self.fs.blk_size() {
            return Err(Error::CorruptStructure(format!(
                "recorded slack region {}..{end} lies outside block 0",
                meta.offset
            )));
        }

        Ok(())
    }
}
