//! Hiding data in the tail slack of FAT files.
//!
//! A file whose size is not a multiple of the cluster size leaves
//! `cluster_size - size % cluster_size` unused bytes at the end of its final cluster.
//! Those bytes stay allocated to the file and survive normal operations, but are never
//! exposed through the filesystem. The technique fills the tail slack of the configured
//! target files, in order, until the payload is placed.
//!
//! Extending or rewriting a carrier file destroys the hidden payload.

use std::io::{Read, Write};

use log::{info, warn};
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::detect::FsKind;
use crate::errors::{CanFail, Error, Result};
use crate::fs::fat::FatFs;
use crate::hide::read_payload;

pub const MODULE_ID: &str = "fat-file-slack";

/// One written slack region: the carrier cluster, the offset of the region inside it,
/// and the payload byte count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackRun {
    pub cluster: u32,
    pub offset: u32,
    pub length: u32,
}

/// Recovery record of the file-slack technique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSlackMeta {
    pub runs: Vec<SlackRun>,
}

/// The FAT backend of the file-slack technique.
pub struct FatFileSlack<D> {
    dev: Device<D>,
    fs: FatFs,
    targets: Vec<String>,
}

impl<D: ReadAt + WriteAt + Size> FatFileSlack<D> {
    /// Builds the backend for a volume of the given (pre-detected) FAT variant, bound
    /// to the target files whose slack will carry the payload.
    pub fn new(dev: Device<D>, kind: FsKind, targets: Vec<String>) -> Result<Self> {
        let fs = FatFs::parse(&dev, kind)?;

        Ok(Self { dev, fs, targets })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Hides the input stream in the tail slack of the target files, in order.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InsufficientSpace`] once every target's slack is filled and
    /// payload remains.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<FileSlackMeta> {
        let payload = read_payload(instream)?;
        let cluster_size = self.fs.cluster_size();

        let mut meta = FileSlackMeta::default();
        let mut cursor = 0usize;

        for target in &self.targets {
            if cursor == payload.len() {
                break;
            }

            let entry = self.fs.resolve_path(&self.dev, target)?;
            if entry.is_directory() {
                warn!(target: "file-slack", "{target} is a directory, skipping");
                continue;
            }

            let size = entry.file_size();
            let used = size % cluster_size;
            if size == 0 || used == 0 {
                // Empty file, or a final cluster filled exactly: no slack to use.
                continue;
            }

            let chain = self.fs.cluster_chain(&self.dev, entry.first_cluster())?;
            let last = chain.last().copied().ok_or_else(|| {
                Error::CorruptStructure(format!("{target} has an empty cluster chain"))
            })?;

            let take = ((cluster_size - used) as usize).min(payload.len() - cursor);
            let offset = self.fs.cluster_offset(last)? + u64::from(used);
            self.dev
                .write_all_at(offset, &payload[cursor..cursor + take])?;

            meta.runs.push(SlackRun {
                cluster: last,
                offset: used,
                length: take as u32,
            });
            cursor += take;
        }

        if cursor < payload.len() {
            return Err(Error::InsufficientSpace(format!(
                "target files offer too little slack: {} of {} bytes placed",
                cursor,
                payload.len()
            )));
        }

        info!(
            target: "file-slack",
            "hid {} bytes in the slack of {} clusters",
            payload.len(),
            meta.runs.len()
        );

        Ok(meta)
    }

    /// Replays the recorded slack regions into the output sink.
    pub fn read(&self, meta: &FileSlackMeta, outstream: &mut dyn Write) -> CanFail<Error> {
        for run in &meta.runs {
            let offset = self.fs.cluster_offset(run.cluster)? + u64::from(run.offset);
            let mut buf = vec![0u8; run.length as usize];
            self.dev.read_exact_at(offset, &mut buf)?;
            outstream.write_all(&buf)?;
        }

        Ok(())
    }

    /// Zero-fills every recorded slack region.
    pub fn clear(&mut self, meta: &FileSlackMeta) -> CanFail<Error> {
        for run in &meta.runs {
            let offset = self.fs.cluster_offset(run.cluster)? + u64::from(run.offset);
            self.dev.zero_at(offset, run.length as usize)?;
        }

        Ok(())
    }

    /// Capacity and usage summary over the configured targets.
    pub fn info(&self, meta: Option<&FileSlackMeta>) -> String {
        let cluster_size = self.fs.cluster_size();
        let mut capacity = 0u64;

        for target in &self.targets {
            let slack = self
                .fs
                .resolve_path(&self.dev, target)
                .ok()
                .filter(|e| !e.is_directory())
                .map(|e| match e.file_size() % cluster_size {
                    0 => 0,
                    used => u64::from(cluster_size - used),
                })
                .unwrap_or(0);
            capacity += slack;
        }

        let mut out = format!(
            "File slack in {} target(s): {capacity} bytes",
            self.targets.len()
        );

        if let Some(meta) = meta {
            let used: u64 = meta.runs.iter().map(|r| u64::from(r.length)).sum();
            out.push_str(&format!("\nUsed: {used} bytes"));
        }

        out
    }
}
