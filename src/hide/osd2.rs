//! Hiding data in the `osd2` field of ext4 inodes.
//!
//! The last 2 bytes of the 12-byte OS-dependent `osd2` field are reserved on Linux and
//! stay zero on freshly written inodes. This technique walks the first inode table and
//! places one 2-byte chunk of the payload in each tail that currently reads `0x0000`,
//! skipping occupied ones. Capacity is two bytes per inode.
//!
//! The empty discriminator is `0x0000`: recovery is only reliable as long as unused
//! `osd2` tails remain zero, which holds on unmodified filesystems but is not verified
//! system-wide before writing. An occupied tail is skipped and the walk continues.

use std::io::{Read, Write};

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::{CanFail, Error, Result};
use crate::fs::ext4::inode::{InodeNumber, OSD2_TAIL_SIZE};
use crate::fs::ext4::Ext4Fs;
use crate::hide::read_payload;

pub const MODULE_ID: &str = "ext4-osd2";

/// Recovery record of the `osd2` technique: the inodes written, in payload order, plus
/// the exact payload length so odd-length payloads round-trip.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Osd2Meta {
    pub inode_numbers: Vec<u32>,
    pub length: u64,
}

/// The ext4 backend of the `osd2` technique.
pub struct Ext4Osd2<D> {
    dev: Device<D>,
    fs: Ext4Fs,
}

impl<D: ReadAt + WriteAt + Size> Ext4Osd2<D> {
    pub fn new(dev: Device<D>) -> Result<Self> {
        let fs = Ext4Fs::parse(&dev)?;

        Ok(Self { dev, fs })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Hides the input stream in the `osd2` tails of the first inode table.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InsufficientSpace`] if the payload exceeds the volume's
    /// `osd2` capacity, or once the first inode table runs out of empty tails.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<Osd2Meta> {
        let payload = read_payload(instream)?;

        let capacity = u64::from(self.fs.superblock().inodes_count()) * OSD2_TAIL_SIZE as u64;
        if payload.len() as u64 > capacity {
            return Err(Error::InsufficientSpace(format!(
                "payload of {} bytes exceeds the {capacity} bytes of osd2 space",
                payload.len()
            )));
        }

        let table_inodes = self
            .fs
            .superblock()
            .inodes_per_group()
            .min(self.fs.superblock().inodes_count());

        let mut meta = Osd2Meta {
            inode_numbers: Vec::with_capacity(payload.len().div_ceil(OSD2_TAIL_SIZE)),
            length: payload.len() as u64,
        };
        let mut inode = InodeNumber::FIRST;

        for chunk in payload.chunks(OSD2_TAIL_SIZE) {
            loop {
                if u32::from(inode) > table_inodes {
                    return Err(Error::InsufficientSpace(
                        "every empty osd2 tail of the first inode table is used".into(),
                    ));
                }

                let offset = self.fs.osd2_tail_offset(inode)?;
                let mut current = [0u8; OSD2_TAIL_SIZE];
                self.dev.read_exact_at(offset, &mut current)?;

                if current == [0, 0] {
                    let mut slot = [0u8; OSD2_TAIL_SIZE];
                    slot[..chunk.len()].copy_from_slice(chunk);
                    self.dev.write_all_at(offset, &slot)?;

                    meta.inode_numbers.push(inode.into());
                    inode = inode.next();
                    break;
                }

                inode = inode.next();
            }
        }

        info!(
            target: "osd2",
            "hid {} bytes in the osd2 tails of {} inodes",
            meta.length,
            meta.inode_numbers.len()
        );

        Ok(meta)
    }

    /// Replays the recorded inodes into the output sink.
    pub fn read(&self, meta: &Osd2Meta, outstream: &mut dyn Write) -> CanFail<Error> {
        let mut remaining = meta.length as usize;

        for &nr in &meta.inode_numbers {
            let offset = self.fs.osd2_tail_offset(InodeNumber(nr))?;
            let mut slot = [0u8; OSD2_TAIL_SIZE];
            self.dev.read_exact_at(offset, &mut slot)?;

            let take = remaining.min(OSD2_TAIL_SIZE);
            outstream.write_all(&slot[..take])?;
            remaining -= take;
        }

        if remaining > 0 {
            return Err(Error::CorruptStructure(format!(
                "metadata records too few inodes: {remaining} bytes unaccounted for"
            )));
        }

        Ok(())
    }

    /// Restores every recorded `osd2` tail to `0x0000`.
    pub fn clear(&mut self, meta: &Osd2Meta) -> CanFail<Error> {
        for &nr in &meta.inode_numbers {
            let offset = self.fs.osd2_tail_offset(InodeNumber(nr))?;
            self.dev.write_all_at(offset, &[0, 0])?;
        }

        Ok(())
    }

    /// Capacity and usage summary.
    pub fn info(&self, meta: Option<&Osd2Meta>) -> String {
        let inodes = self.fs.superblock().inodes_count();
        let mut out = format!(
            "Inodes: {inodes}\nTotal hiding space in osd2 fields: {} bytes",
            u64::from(inodes) * OSD2_TAIL_SIZE as u64
        );

        if let Some(meta) = meta {
            out.push_str(&format!(
                "\nUsed: {} bytes",
                meta.inode_numbers.len() * OSD2_TAIL_SIZE
            ));
        }

        out
    }
}
