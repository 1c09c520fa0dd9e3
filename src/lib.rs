//! slackfs: hiding data in the slack space of on-disk filesystem structures.
//!
//! A normal mount of a volume never exposes the byte ranges this crate writes to:
//! allocated-but-unused regions such as the tail slack of FAT file clusters, the
//! reserved GDT blocks of an ext4 filesystem, the unused tail of inode fields, or the
//! padding of APFS inode records. Hiding a payload emits a compact recovery record; the
//! [`meta::Metadata`] envelope collects those records out-of-band, and is all that is
//! needed to recover or erase the payload later.
//!
//! The crate is layered bottom-up:
//!
//! - [`device`] — a cursor-less, byte-addressable random-access device;
//! - [`detect`] — filesystem variant detection over a raw stream;
//! - [`fs`] — read-only structure parsers for FAT12/16/32, ext4 and APFS;
//! - [`hide`] — the hiding techniques (write / read / clear / info);
//! - [`wrap`] — per-technique dispatchers routing to the right backend and keeping the
//!   metadata envelope up to date.
//!
//! Volumes must be operated on offline: the device is an exclusive resource for the
//! duration of any operation, and nothing here coordinates with a running kernel mount.

pub mod detect;
pub mod device;
pub mod errors;
pub mod fs;
pub mod hide;
pub mod meta;
pub mod wrap;

pub use crate::errors::{CanFail, Error, Result};
