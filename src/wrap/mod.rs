//! Technique dispatchers.
//!
//! One thin wrapper per hiding technique. At construction a wrapper runs the detector
//! on the device, instantiates the matching filesystem backend (failing with
//! [`crate::errors::Error::UnsupportedFilesystem`] when the variant has no backend for
//! the technique), and takes ownership of the metadata envelope. `write` delegates to
//! the backend and attaches the emitted record to the envelope; `read`, `clear` and
//! `info` retrieve records from the envelope and delegate symmetrically.
//!
//! `read` without a key recovers the envelope entry under key `"0"` — the first hidden
//! file; use `read_file` to pick an entry by name.

use std::path::Path;

use crate::errors::Error;
use crate::meta::TechniqueMeta;

mod bad_cluster;
mod file_slack;
mod inode_pad;
mod osd2;
mod reserved_gdt;
mod sb_slack;

pub use bad_cluster::BadCluster;
pub use file_slack::FileSlack;
pub use inode_pad::InodePad;
pub use osd2::Osd2;
pub use reserved_gdt::ReservedGdtBlocks;
pub use sb_slack::SuperblockSlack;

/// Strips any directory components from a caller-provided filename.
fn basename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// The envelope entry was emitted by a different technique than this dispatcher's.
///
/// Reported as [`Error::UnsupportedFilesystem`]: dispatchers map every variant
/// mismatch, backend or metadata, to that kind.
fn module_mismatch(found: &TechniqueMeta, expected: &str) -> Error {
    Error::UnsupportedFilesystem(format!(
        "metadata entry was written by {}, not {expected}",
        found.module()
    ))
}

/// The envelope holds no entry under the requested key.
///
/// An unmet operation precondition, not a parse or I/O failure.
fn no_such_entry(key: &str) -> Error {
    Error::PreconditionViolated(format!("no hidden file recorded under key {key:?}"))
}
