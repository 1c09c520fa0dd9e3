//! Detector behavior over synthetic images.

mod common;

use std::io::Cursor;

use slackfs::detect::{detect, detect_device, FsKind};
use slackfs::device::Device;
use slackfs::errors::Error;

#[test]
fn zero_filled_image_is_unsupported_and_offset_preserved() {
    let mut stream = Cursor::new(vec![0u8; 1024 * 1024]);
    stream.set_position(42);

    let err = detect(&mut stream).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFilesystem(_)));
    assert_eq!(stream.position(), 42);
}

#[test]
fn classifies_every_supported_variant() {
    let cases = [
        (common::fat12_image(), FsKind::Fat12),
        (common::fat16_image(), FsKind::Fat16),
        (common::fat32_image(), FsKind::Fat32),
        (common::ext4_image(), FsKind::Ext4),
        (common::apfs_image(), FsKind::Apfs),
    ];

    for (image, expected) in cases {
        let dev = Device::new(image).unwrap();
        assert_eq!(detect_device(&dev).unwrap(), expected);
    }
}

#[test]
fn offset_preserved_on_success() {
    let mut stream = Cursor::new(common::ext4_image());
    stream.set_position(777);

    // The probe offsets are relative to the stream position, so detection from a
    // non-zero base fails here; what matters is that the offset comes back intact.
    let _ = detect(&mut stream);
    assert_eq!(stream.position(), 777);

    stream.set_position(0);
    assert_eq!(detect(&mut stream).unwrap(), FsKind::Ext4);
    assert_eq!(stream.position(), 0);
}

#[test]
fn fat_plus_version_field_is_rejected() {
    let mut stream = Cursor::new(common::fat_plus_image());

    match detect(&mut stream).unwrap_err() {
        Error::UnsupportedFilesystem(msg) => {
            assert_eq!(msg, "FAT+ is currently not supported");
        }
        other => panic!("expected UnsupportedFilesystem, got {other:?}"),
    }
    assert_eq!(stream.position(), 0);
}

#[test]
fn truncated_image_is_not_an_error() {
    // Too short for any probe: every signature read is a short read.
    let err = detect(&mut Cursor::new(vec![0u8; 40])).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFilesystem(_)));
}
