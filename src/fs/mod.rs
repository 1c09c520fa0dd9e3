//! On-disk filesystem structure parsers.
//!
//! One parser per supported variant: [`fat::FatFs`] for FAT12/16/32, [`ext4::Ext4Fs`]
//! for ext4, and [`apfs::ApfsContainer`] for APFS containers. Parsers are constructed
//! once per operation from a [`crate::device::Device`], cache only structural facts as
//! plain values, and never write to the device. The hiding techniques in
//! [`crate::hide`] consume their outputs.

pub mod apfs;
pub mod ext4;
pub mod fat;
