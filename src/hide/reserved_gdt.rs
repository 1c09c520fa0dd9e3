//! Hiding data in reserved GDT blocks of an ext4 filesystem.
//!
//! Filesystems created with the `resize_inode` feature reserve a run of blocks after
//! each backup descriptor table so that the table can grow during an online resize.
//! Those blocks are allocated, owned by the resize inode, and carry no data until a
//! resize actually happens, which makes them a roomy carrier: one block of payload per
//! reserved block, across every backup-holding group.
//!
//! An online resize of the filesystem overwrites the carrier.

use std::io::{Read, Write};

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::errors::{CanFail, Error, Result};
use crate::fs::ext4::Ext4Fs;
use crate::hide::read_payload;

pub const MODULE_ID: &str = "ext4-reserved-gdt-blocks";

/// One written reserved-GDT block: its group, block number and payload byte count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdtBlockRun {
    pub group: u32,
    pub block: u64,
    pub length: u32,
}

/// Recovery record of the reserved-GDT-blocks technique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedGdtMeta {
    pub blocks: Vec<GdtBlockRun>,
}

/// The ext4 backend of the reserved-GDT-blocks technique.
pub struct Ext4ReservedGdtBlocks<D> {
    dev: Device<D>,
    fs: Ext4Fs,
}

impl<D: ReadAt + WriteAt + Size> Ext4ReservedGdtBlocks<D> {
    pub fn new(dev: Device<D>) -> Result<Self> {
        let fs = Ext4Fs::parse(&dev)?;

        Ok(Self { dev, fs })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Hides the input stream across the reserved GDT blocks, in group order.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<ReservedGdtMeta> {
        let payload = read_payload(instream)?;
        let runs = self.fs.reserved_gdt_runs();
        let blk_size = self.fs.blk_size();

        let capacity: u64 = runs.iter().map(|r| u64::from(r.count) * blk_size).sum();
        if payload.len() as u64 > capacity {
            return Err(Error::InsufficientSpace(format!(
                "payload of {} bytes exceeds the {capacity} bytes of reserved GDT space",
                payload.len()
            )));
        }

        let mut meta = ReservedGdtMeta::default();
        let mut cursor = 0usize;

        'groups: for run in runs {
            for i in 0..run.count {
                if cursor == payload.len() {
                    break 'groups;
                }

                let block = run.first_block + u64::from(i);
                let take = (payload.len() - cursor).min(blk_size as usize);
                self.dev
                    .write_all_at(block * blk_size, &payload[cursor..cursor + take])?;

                meta.blocks.push(GdtBlockRun {
                    group: run.group,
                    block,
                    length: take as u32,
                });
                cursor += take;
            }
        }

        info!(
            target: "reserved-gdt",
            "hid {} bytes across {} reserved GDT blocks",
            payload.len(),
            meta.blocks.len()
        );

        Ok(meta)
    }

    /// Replays the recorded blocks into the output sink.
    pub fn read(&self, meta: &ReservedGdtMeta, outstream: &mut dyn Write) -> CanFail<Error> {
        let blk_size = self.fs.blk_size();

        for run in &meta.blocks {
            if u64::from(run.length) > blk_size {
                return Err(Error::CorruptStructure(format!(
                    "recorded run of {} bytes exceeds the block size",
                    run.length
                )));
            }

            let mut buf = vec![0u8; run.length as usize];
            self.dev.read_exact_at(run.block * blk_size, &mut buf)?;
            outstream.write_all(&buf)?;
        }

        Ok(())
    }

    /// Zero-fills the written prefix of every recorded block.
    pub fn clear(&mut self, meta: &ReservedGdtMeta) -> CanFail<Error> {
        let blk_size = self.fs.blk_size();

        for run in &meta.blocks {
            self.dev
                .zero_at(run.block * blk_size, run.length.min(blk_size as u32) as usize)?;
        }

        Ok(())
    }

    /// Capacity and usage summary.
    pub fn info(&self, meta: Option<&ReservedGdtMeta>) -> String {
        let runs = self.fs.reserved_gdt_runs();
        let blk_size = self.fs.blk_size();
        let blocks: u64 = runs.iter().map(|r| u64::from(r.count)).sum();

        let mut out = format!(
            "Reserved GDT blocks: {blocks} across {} groups\nTotal hiding space: {} bytes",
            runs.len(),
            blocks * blk_size
        );

        if let Some(meta) = meta {
            let used: u64 = meta.blocks.iter().map(|r| u64::from(r.length)).sum();
            out.push_str(&format!("\nUsed: {used} bytes"));
        }

        out
    }
}
