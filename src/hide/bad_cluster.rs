//! Hiding data in clusters flagged as bad in the FAT.
//!
//! A cluster marked defective is never allocated, scanned or repaired by normal
//! filesystem operations, so its data area is a stable carrier. Candidate clusters must
//! be free in the FAT *and* unreferenced by any directory entry on the volume; the mark
//! is mirrored to every FAT copy. Supported on FAT12 and FAT16 only: FAT32 entries
//! carry reserved upper bits that drivers may rewrite.

use std::io::{Read, Write};

use log::info;
use positioned_io::{ReadAt, Size, WriteAt};
use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::detect::FsKind;
use crate::errors::{CanFail, Error, Result};
use crate::fs::fat::{FatEntry, FatFs};
use crate::hide::read_payload;

pub const MODULE_ID: &str = "fat-bad-cluster";

/// Recovery record of the bad-cluster technique: the flagged clusters in payload order,
/// plus the exact payload length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadClusterMeta {
    pub clusters: Vec<u32>,
    pub length: u64,
}

/// The FAT12/16 backend of the bad-cluster technique.
pub struct FatBadCluster<D> {
    dev: Device<D>,
    fs: FatFs,
}

impl<D: ReadAt + WriteAt + Size> FatBadCluster<D> {
    pub fn new(dev: Device<D>, kind: FsKind) -> Result<Self> {
        let fs = FatFs::parse(&dev, kind)?;
        // Refuse FAT32 up front rather than after a partial write.
        fs.bad_cluster_marker()?;

        Ok(Self { dev, fs })
    }

    /// Releases the device handle back to the caller.
    pub fn into_device(self) -> Device<D> {
        self.dev
    }

    /// Hides the input stream in freshly flagged bad clusters.
    ///
    /// Candidates are gathered before anything is mutated, so an
    /// [`Error::InsufficientSpace`] failure leaves the volume untouched.
    pub fn write(&mut self, instream: &mut dyn Read) -> Result<BadClusterMeta> {
        let payload = read_payload(instream)?;
        let mut meta = BadClusterMeta {
            clusters: Vec::new(),
            length: payload.len() as u64,
        };
        if payload.is_empty() {
            return Ok(meta);
        }

        let cluster_size = self.fs.cluster_size() as usize;
        let needed = payload.len().div_ceil(cluster_size);
        let candidates = self.free_unreferenced_clusters(Some(needed))?;
        if candidates.len() < needed {
            return Err(Error::InsufficientSpace(format!(
                "{needed} free unreferenced clusters needed, {} found",
                candidates.len()
            )));
        }

        let marker = self.fs.bad_cluster_marker()?;
        for (chunk, &cluster) in payload.chunks(cluster_size).zip(&candidates) {
            self.fs.write_fat_entry(&mut self.dev, cluster, marker)?;
            self.dev
                .write_all_at(self.fs.cluster_offset(cluster)?, chunk)?;
            meta.clusters.push(cluster);
        }

        info!(
            target: "bad-cluster",
            "hid {} bytes in {} clusters flagged bad",
            payload.len(),
            meta.clusters.len()
        );

        Ok(meta)
    }

    /// Replays the recorded clusters into the output sink.
    pub fn read(&self, meta: &BadClusterMeta, outstream: &mut dyn Write) -> CanFail<Error> {
        let cluster_size = self.fs.cluster_size() as usize;
        let mut remaining = meta.length as usize;

        for &cluster in &meta.clusters {
            let take = remaining.min(cluster_size);
            let mut buf = vec![0u8; take];
            self.dev
                .read_exact_at(self.fs.cluster_offset(cluster)?, &mut buf)?;
            outstream.write_all(&buf)?;
            remaining -= take;
        }

        if remaining > 0 {
            return Err(Error::CorruptStructure(format!(
                "metadata records too few clusters: {remaining} bytes unaccounted for"
            )));
        }

        Ok(())
    }

    /// Zero-fills the written prefix of every recorded cluster and frees its FAT entry
    /// in all FAT copies.
    pub fn clear(&mut self, meta: &BadClusterMeta) -> CanFail<Error> {
        let cluster_size = self.fs.cluster_size() as usize;
        let mut remaining = meta.length as usize;

        for &cluster in &meta.clusters {
            let take = remaining.min(cluster_size);
            self.dev.zero_at(self.fs.cluster_offset(cluster)?, take)?;
            self.fs.write_fat_entry(&mut self.dev, cluster, 0)?;
            remaining -= take;
        }

        Ok(())
    }

    /// Capacity and usage summary.
    pub fn info(&self, meta: Option<&BadClusterMeta>) -> Result<String> {
        let free = self.free_unreferenced_clusters(None)?;
        let mut out = format!(
            "Free unreferenced clusters: {}\nTotal hiding space: {} bytes",
            free.len(),
            free.len() as u64 * u64::from(self.fs.cluster_size())
        );

        if let Some(meta) = meta {
            out.push_str(&format!("\nUsed: {} bytes", meta.length));
        }

        Ok(out)
    }

    /// Clusters that are free in the FAT and unreachable from any directory entry.
    fn free_unreferenced_clusters(&self, limit: Option<usize>) -> Result<Vec<u32>> {
        let referenced = self.fs.referenced_clusters(&self.dev)?;
        let mut candidates = Vec::new();

        for cluster in 2..2 + self.fs.cluster_count() {
            if limit.is_some_and(|l| candidates.len() == l) {
                break;
            }
            if referenced.contains(&cluster) {
                continue;
            }
            if self.fs.fat_entry(&self.dev, cluster)? == FatEntry::Free {
                candidates.push(cluster);
            }
        }

        Ok(candidates)
    }
}
