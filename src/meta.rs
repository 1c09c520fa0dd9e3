//! Recovery metadata envelope.
//!
//! Every successful `write` emits a technique-specific metadata record; the envelope
//! maps a filename to that record, tagged with the identifier of the technique that
//! produced it. The envelope is persisted out-of-band by the caller and is the only
//! thing needed to recover or clear a hidden payload.
//!
//! Serialization is JSON and round-trip exact: writing an envelope and reading it back
//! yields an equal envelope. Entries keep insertion order.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CanFail, Error, Result};
use crate::hide::bad_cluster::BadClusterMeta;
use crate::hide::file_slack::FileSlackMeta;
use crate::hide::inode_pad::InodePadMeta;
use crate::hide::osd2::Osd2Meta;
use crate::hide::reserved_gdt::ReservedGdtMeta;
use crate::hide::sb_slack::SuperblockSlackMeta;

/// Envelope format version.
const METADATA_VERSION: u32 = 1;

/// The metadata record emitted by one technique, tagged by its module identifier.
///
/// Every variant is sufficient on its own to reconstruct the payload it describes,
/// without re-scanning the filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "module")]
pub enum TechniqueMeta {
    #[serde(rename = "fat-file-slack")]
    FileSlack(FileSlackMeta),

    #[serde(rename = "fat-bad-cluster")]
    BadCluster(BadClusterMeta),

    #[serde(rename = "ext4-osd2")]
    Osd2(Osd2Meta),

    #[serde(rename = "ext4-reserved-gdt-blocks")]
    ReservedGdt(ReservedGdtMeta),

    #[serde(rename = "ext4-superblock-slack")]
    SuperblockSlack(SuperblockSlackMeta),

    #[serde(rename = "apfs-inode-pad")]
    InodePad(InodePadMeta),
}

impl TechniqueMeta {
    /// The module identifier this record is tagged with.
    pub fn module(&self) -> &'static str {
        match self {
            Self::FileSlack(_) => crate::hide::file_slack::MODULE_ID,
            Self::BadCluster(_) => crate::hide::bad_cluster::MODULE_ID,
            Self::Osd2(_) => crate::hide::osd2::MODULE_ID,
            Self::ReservedGdt(_) => crate::hide::reserved_gdt::MODULE_ID,
            Self::SuperblockSlack(_) => crate::hide::sb_slack::MODULE_ID,
            Self::InodePad(_) => crate::hide::inode_pad::MODULE_ID,
        }
    }
}

/// One hidden file: its envelope key and the record needed to recover it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub metadata: TechniqueMeta,
}

/// The metadata envelope: an ordered collection of hidden-file records plus the
/// identifier of the technique that last wrote through it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    version: u32,
    module: Option<String>,
    files: Vec<FileEntry>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            version: METADATA_VERSION,
            module: None,
            files: Vec::new(),
        }
    }

    /// Records which technique last wrote through this envelope.
    pub fn set_module(&mut self, id: &str) {
        self.module = Some(id.to_string());
    }

    /// The identifier of the technique that last wrote, if any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Appends a hidden-file record, generating a stable pseudorandom name when none is
    /// given. Returns the key the entry was stored under.
    pub fn add_file(&mut self, filename: Option<&str>, metadata: TechniqueMeta) -> String {
        let filename = match filename {
            Some(name) => name.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };

        self.files.push(FileEntry {
            filename: filename.clone(),
            metadata,
        });

        filename
    }

    /// Looks up a hidden-file record by filename, or by decimal index (`"0"` is the
    /// first entry).
    pub fn get_file(&self, key: &str) -> Option<&FileEntry> {
        self.files
            .iter()
            .find(|entry| entry.filename == key)
            .or_else(|| {
                key.parse::<usize>()
                    .ok()
                    .and_then(|index| self.files.get(index))
            })
    }

    /// All hidden-file records, in insertion order.
    pub fn get_files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Serializes the envelope as JSON.
    pub fn save_to<W: Write>(&self, writer: W) -> CanFail<Error> {
        serde_json::to_writer(writer, self)
            .map_err(|e| Error::IOFailure(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    /// Deserializes an envelope previously written by [`Metadata::save_to`].
    pub fn load_from<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader)
            .map_err(|e| Error::CorruptStructure(format!("metadata envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hide::osd2::Osd2Meta;

    #[test]
    fn envelope_round_trips() {
        let mut envelope = Metadata::new();
        envelope.set_module(crate::hide::osd2::MODULE_ID);
        envelope.add_file(
            Some("secret.bin"),
            TechniqueMeta::Osd2(Osd2Meta {
                inode_numbers: vec![1, 3, 9],
                length: 5,
            }),
        );

        let mut raw = Vec::new();
        envelope.save_to(&mut raw).unwrap();
        let restored = Metadata::load_from(raw.as_slice()).unwrap();

        assert_eq!(envelope, restored);
    }

    #[test]
    fn index_keys_resolve_in_insertion_order() {
        let mut envelope = Metadata::new();
        let first = envelope.add_file(
            None,
            TechniqueMeta::Osd2(Osd2Meta {
                inode_numbers: vec![1],
                length: 2,
            }),
        );
        envelope.add_file(
            Some("second"),
            TechniqueMeta::Osd2(Osd2Meta {
                inode_numbers: vec![2],
                length: 2,
            }),
        );

        assert_eq!(envelope.get_file("0").unwrap().filename, first);
        assert_eq!(envelope.get_file("1").unwrap().filename, "second");
        assert_eq!(envelope.get_file("second").unwrap().filename, "second");
    }
}
