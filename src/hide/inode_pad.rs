//! Hiding data in the padding field of APFS inode records.
//!
//! Every inode record value carries a 2-byte `pad1` field after the file mode, kept
//! zero by every known implementation. The container and volume object maps resolve the
//! physical location of each inode record (see [`crate::fs::apfs`]); the technique then
//! places one 2-byte chunk per inode whose padding currently reads `0x0000`, skipping
//! occupied ones, exactly like the ext4 `osd2` carrier.

use std::io::{Read, Write};

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::{CanFail, Error, Result};
use crate::fs::apfs::{ApfsContainer, InodeLocation};
use crate::hide::read_payload;

pub const MODULE_ID: &str = "apfs-inode-pad";

/// Byte offset of the `pad1` field inside an inode record value.
const PAD_FIELD_OFFSET: u32 = 82;

/// Width of the padding carrier per inode.
const PAD_SIZE: usize = 2;

/// One written padding slot: node block byte address and in-block offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSlot {
    pub block: u64,
    pub offset: u32,
}

/// Recovery record of the inode-pad technique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodePadMeta {
    pub slots: Vec<PadSlot>,
    pub length: u64,
}

/// The APFS backend of the inode-pad technique.
pub struct ApfsInodePad<D> {
    dev: Device<D>,
    locations: Vec<InodeLocation>,
}

impl<D: ReadAt + WriteAt + Size> ApfsInodePad<D> {
    pub fn new(dev: Device<D>) -> Result<Self> {
        let container = ApfsContainer::parse(&dev)?;
        let locations = container.all_inodes(&dev)?;

        Ok(Self { dev, locations })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Hides the input stream in the padding of the container's inode records.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<InodePadMeta> {
        let payload = read_payload(instream)?;

        let capacity = self.locations.len() * PAD_SIZE;
        if payload.len() > capacity {
            return Err(Error::InsufficientSpace(format!(
                "payload of {} bytes exceeds the {capacity} bytes of inode padding",
                payload.len()
            )));
        }

        let mut meta = InodePadMeta {
            slots: Vec::with_capacity(payload.len().div_ceil(PAD_SIZE)),
            length: payload.len() as u64,
        };
        let mut next = 0usize;

        for chunk in payload.chunks(PAD_SIZE) {
            loop {
                let location = *self.locations.get(next).ok_or_else(|| {
                    Error::InsufficientSpace(
                        "every empty inode padding field is used".into(),
                    )
                })?;
                next += 1;

                let offset = location.offset + PAD_FIELD_OFFSET;
                let abs = location.block + u64::from(offset);

                let mut current = [0u8; PAD_SIZE];
                self.dev.read_exact_at(abs, &mut current)?;
                if current != [0, 0] {
                    continue;
                }

                let mut slot = [0u8; PAD_SIZE];
                slot[..chunk.len()].copy_from_slice(chunk);
                self.dev.write_all_at(abs, &slot)?;

                meta.slots.push(PadSlot {
                    block: location.block,
                    offset,
                });
                break;
            }
        }

        info!(
            target: "inode-pad",
            "hid {} bytes in the padding of {} inode records",
            meta.length,
            meta.slots.len()
        );

        Ok(meta)
    }

    /// Replays the recorded padding slots into the output sink.
    pub fn read(&self, meta: &InodePadMeta, outstream: &mut dyn Write) -> CanFail<Error> {
        let mut remaining = meta.length as usize;

        for slot in &meta.slots {
            let mut buf = [0u8; PAD_SIZE];
            self.dev
                .read_exact_at(slot.block + u64::from(slot.offset), &mut buf)?;

            let take = remaining.min(PAD_SIZE);
            outstream.write_all(&buf[..take])?;
            remaining -= take;
        }

        if remaining > 0 {
            return Err(Error::CorruptStructure(format!(
                "metadata records too few slots: {remaining} bytes unaccounted for"
            )));
        }

        Ok(())
    }

    /// Restores every recorded padding field to `0x0000`.
    pub fn clear(&mut self, meta: &InodePadMeta) -> CanFail<Error> {
        for slot in &meta.slots {
            self.dev
                .write_all_at(slot.block + u64::from(slot.offset), &[0, 0])?;
        }

        Ok(())
    }

    /// Capacity and usage summary.
    pub fn info(&self, meta: Option<&InodePadMeta>) -> String {
        let mut out = format!(
            "Inode records: {}\nTotal hiding space in inode padding: {} bytes",
            self.locations.len(),
            self.locations.len() * PAD_SIZE
        );

        if let Some(meta) = meta {
            out.push_str(&format!("\nUsed: {} bytes", meta.slots.len() * PAD_SIZE));
        }

        out
    }
}
