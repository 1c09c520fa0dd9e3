//! Dispatcher for the reserved-GDT-blocks technique.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use positioned_io::{ReadAt, Size, WriteAt};

use crate::detect::{detect_device, FsKind};
use crate::device::Device;
use crate::errors::{CanFail, Error, Result};
use crate::hide::reserved_gdt::{Ext4ReservedGdtBlocks, MODULE_ID};
use crate::meta::{Metadata, TechniqueMeta};
use crate::wrap::{basename, module_mismatch, no_such_entry};

/// Hides data in reserved GDT blocks. See [`crate::hide::reserved_gdt`].
pub struct ReservedGdtBlocks<D> {
    backend: Ext4ReservedGdtBlocks<D>,
    metadata: Metadata,
}

impl<D: ReadAt + WriteAt + Size> ReservedGdtBlocks<D> {
    /// Detects the filesystem on `dev` and binds the matching backend.
    pub fn new(dev: Device<D>, metadata: Metadata) -> Result<Self> {
        match detect_device(&dev)? {
            FsKind::Ext4 => Ok(Self {
                backend: Ext4ReservedGdtBlocks::new(dev)?,
                metadata,
            }),
            other => Err(Error::UnsupportedFilesystem(format!(
                "no reserved-gdt-blocks backend for {other}"
            ))),
        }
    }

    /// Hides `instream` and records the result in the envelope under `filename` (or a
    /// generated name). Returns the key used.
    pub fn write(&mut self, instream: &mut dyn Read, filename: Option<&str>) -> Result<String> {
        let name = filename.map(basename);
        let meta = self.backend.write(instream)?;

        self.metadata.set_module(MODULE_ID);
        Ok(self
            .metadata
            .add_file(name.as_deref(), TechniqueMeta::ReservedGdt(meta)))
    }

    /// Recovers the first hidden file into `outstream`.
    pub fn read(&self, outstream: &mut dyn Write) -> CanFail<Error> {
        self.read_file("0", outstream)
    }

    /// Recovers the hidden file stored under `key` into `outstream`.
    pub fn read_file(&self, key: &str, outstream: &mut dyn Write) -> CanFail<Error> {
        let entry = self.metadata.get_file(key).ok_or_else(|| no_such_entry(key))?;

        match &entry.metadata {
            TechniqueMeta::ReservedGdt(meta) => self.backend.read(meta, outstream),
            other => Err(module_mismatch(other, MODULE_ID)),
        }
    }

    /// Recovers the first hidden file into a freshly created file at `path`.
    ///
    /// An existing file is overwritten. The file is closed on every exit path.
    pub fn read_into_file(&self, path: &Path) -> CanFail<Error> {
        let mut outfile = File::create(path)?;
        self.read(&mut outfile)?;
        std::io::Write::flush(&mut outfile)?;

        Ok(())
    }

    /// Clears every region recorded in the envelope.
    pub fn clear(&mut self) -> CanFail<Error> {
        for entry in self.metadata.get_files() {
            match &entry.metadata {
                TechniqueMeta::ReservedGdt(meta) => self.backend.clear(meta)?,
                other => return Err(module_mismatch(other, MODULE_ID)),
            }
        }

        Ok(())
    }

    /// Capacity and per-entry usage summary.
    pub fn info(&self) -> Result<String> {
        if self.metadata.get_files().is_empty() {
            return Ok(self.backend.info(None));
        }

        let mut sections = Vec::new();
        for entry in self.metadata.get_files() {
            if let TechniqueMeta::ReservedGdt(meta) = &entry.metadata {
                sections.push(format!(
                    "{}:\n{}",
                    entry.filename,
                    self.backend.info(Some(meta))
                ));
            }
        }

        Ok(sections.join("\n\n"))
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }
}
