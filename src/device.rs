//! Random-access device surface.
//!
//! Every higher layer consumes a [`Device`]: a byte-addressable image supporting absolute
//! offset reads and writes. There is no cursor; each primitive names the offset it works
//! on, so no operation depends on where a previous one left the stream.
//!
//! [`std::fs::File`] and in-memory `Vec<u8>` images both satisfy the
//! [`ReadAt`] + [`WriteAt`] + [`Size`] bound, which keeps the parsers testable against
//! synthetic volumes without touching the disk.

use std::io::{Read, Seek, SeekFrom};

use positioned_io::{ReadAt, Size, WriteAt};

use crate::errors::{CanFail, Error, Result};

/// A fixed-size, byte-addressable random-access device.
#[derive(Debug)]
pub struct Device<D> {
    inner: D,
    len: u64,
}

impl<D: ReadAt + WriteAt + Size> Device<D> {
    /// Wraps a random-access image, capturing its length.
    pub fn new(inner: D) -> Result<Self> {
        let len = inner
            .size()?
            .ok_or_else(|| Error::CorruptStructure("device has no known size".into()))?;

        Ok(Self { inner, len })
    }

    /// Total size of the device, in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `buf` from the absolute offset `pos`.
    ///
    /// A read past the end of the device is an [`Error::IOFailure`], never a short read.
    pub fn read_exact_at(&self, mut pos: u64, mut buf: &mut [u8]) -> CanFail<Error> {
        while !buf.is_empty() {
            match self.inner.read_at(pos, buf)? {
                0 => {
                    return Err(Error::IOFailure(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "read past end of device",
                    )))
                }
                n => {
                    pos += n as u64;
                    buf = &mut buf[n..];
                }
            }
        }

        Ok(())
    }

    /// Writes all of `buf` at the absolute offset `pos`.
    pub fn write_all_at(&mut self, mut pos: u64, mut buf: &[u8]) -> CanFail<Error> {
        while !buf.is_empty() {
            match self.inner.write_at(pos, buf)? {
                0 => {
                    return Err(Error::IOFailure(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "write past end of device",
                    )))
                }
                n => {
                    pos += n as u64;
                    buf = &buf[n..];
                }
            }
        }

        Ok(())
    }

    /// Reads a little-endian `u16` at `pos`.
    pub fn read_u16_at(&self, pos: u64) -> Result<u16> {
        let mut raw = [0u8; 2];
        self.read_exact_at(pos, &mut raw)?;

        Ok(u16::from_le_bytes(raw))
    }

    /// Reads a little-endian `u32` at `pos`.
    pub fn read_u32_at(&self, pos: u64) -> Result<u32> {
        let mut raw = [0u8; 4];
        self.read_exact_at(pos, &mut raw)?;

        Ok(u32::from_le_bytes(raw))
    }

    /// Zero-fills `count` bytes starting at `pos`.
    pub fn zero_at(&mut self, pos: u64, count: usize) -> CanFail<Error> {
        self.write_all_at(pos, &vec![0u8; count])
    }

    /// A seekable read-only view of the device, for the detector boundary.
    ///
    /// The cursor starts at offset 0 and is independent of any other view.
    pub fn stream(&self) -> DeviceStream<'_, D> {
        DeviceStream {
            dev: self,
            position: 0,
        }
    }

    /// The wrapped image.
    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    /// Unwraps the device, handing the image back to the caller.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

/// A cursor over a [`Device`], bridging the absolute-offset surface to the
/// [`Read`] + [`Seek`] interface the detector contract is written against.
#[derive(Debug)]
pub struct DeviceStream<'d, D> {
    dev: &'d Device<D>,
    position: u64,
}

impl<D: ReadAt + WriteAt + Size> Read for DeviceStream<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.position >= self.dev.len() {
            return Ok(0);
        }

        let n = self.dev.inner.read_at(self.position, buf)?;
        self.position += n as u64;

        Ok(n)
    }
}

impl<D: ReadAt + WriteAt + Size> Seek for DeviceStream<'_, D> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.dev.len().checked_add_signed(delta),
        };

        self.position = target.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek before offset 0")
        })?;

        Ok(self.position)
    }
}
