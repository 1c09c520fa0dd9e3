//! File-slack technique over synthetic FAT volumes.

mod common;

use slackfs::detect::FsKind;
use slackfs::device::Device;
use slackfs::errors::Error;
use slackfs::fs::fat::FatFs;
use slackfs::hide::file_slack::FatFileSlack;
use slackfs::meta::{Metadata, TechniqueMeta};
use slackfs::wrap::FileSlack;

fn device(image: Vec<u8>) -> Device<Vec<u8>> {
    Device::new(image).unwrap()
}

fn targets() -> Vec<String> {
    vec!["HELLO.TXT".to_string()]
}

#[test]
fn hides_after_the_file_tail() {
    let mut wrapper = FileSlack::new(device(common::fat16_image()), Metadata::new(), targets())
        .unwrap();

    let mut input: &[u8] = b"hello\n";
    let key = wrapper.write(&mut input, Some("greeting")).unwrap();
    assert_eq!(key, "greeting");
    assert_eq!(
        wrapper.metadata().module(),
        Some(slackfs::hide::file_slack::MODULE_ID)
    );

    let entry = wrapper.metadata().get_file("0").unwrap();
    match &entry.metadata {
        TechniqueMeta::FileSlack(meta) => {
            assert_eq!(meta.runs.len(), 1);
            assert_eq!(meta.runs[0].cluster, 2);
            assert_eq!(meta.runs[0].offset, common::FAT16_FILE_SIZE);
            assert_eq!(meta.runs[0].length, 6);
        }
        other => panic!("unexpected metadata variant: {other:?}"),
    }

    let mut recovered = Vec::new();
    wrapper.read(&mut recovered).unwrap();
    assert_eq!(recovered, b"hello\n");
}

#[test]
fn file_contents_survive_the_write() {
    let mut backend =
        FatFileSlack::new(device(common::fat16_image()), FsKind::Fat16, targets()).unwrap();

    let mut input: &[u8] = b"hidden";
    backend.write(&mut input).unwrap();

    let image = backend.into_device().into_inner();
    assert_eq!(
        &image[common::FAT16_DATA_OFFSET..common::FAT16_DATA_OFFSET + 7],
        b"content"
    );
}

#[test]
fn clear_restores_the_image() {
    let pristine = common::fat16_image();
    let mut backend =
        FatFileSlack::new(device(common::fat16_image()), FsKind::Fat16, targets()).unwrap();

    let mut input: &[u8] = b"hello\n";
    let meta = backend.write(&mut input).unwrap();
    backend.clear(&meta).unwrap();
    backend.clear(&meta).unwrap(); // clearing twice equals clearing once

    assert_eq!(backend.into_device().into_inner(), pristine);
}

#[test]
fn capacity_boundary() {
    let slack = common::FAT16_CLUSTER_SIZE - common::FAT16_FILE_SIZE;

    // Exactly the slack fits.
    let mut backend =
        FatFileSlack::new(device(common::fat16_image()), FsKind::Fat16, targets()).unwrap();
    let payload = vec![0xA5u8; slack as usize];
    let meta = backend.write(&mut payload.as_slice()).unwrap();
    let mut recovered = Vec::new();
    backend.read(&meta, &mut recovered).unwrap();
    assert_eq!(recovered, payload);

    // One byte more does not.
    let mut backend =
        FatFileSlack::new(device(common::fat16_image()), FsKind::Fat16, targets()).unwrap();
    let payload = vec![0xA5u8; slack as usize + 1];
    match backend.write(&mut payload.as_slice()) {
        Err(Error::InsufficientSpace(_)) => {}
        other => panic!("expected InsufficientSpace, got {other:?}"),
    }

    // A zero-length payload succeeds and yields empty metadata.
    let mut backend =
        FatFileSlack::new(device(common::fat16_image()), FsKind::Fat16, targets()).unwrap();
    let meta = backend.write(&mut std::io::empty()).unwrap();
    assert!(meta.runs.is_empty());
}

#[test]
fn parser_is_read_only() {
    let pristine = common::fat16_image();
    let dev = device(common::fat16_image());

    let fs = FatFs::parse(&dev, FsKind::Fat16).unwrap();
    let entries = fs.root_dir_entries(&dev).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].short_name(), "HELLO.TXT");
    fs.cluster_chain(&dev, entries[0].first_cluster()).unwrap();
    fs.referenced_clusters(&dev).unwrap();

    assert_eq!(dev.into_inner(), pristine);
}

#[test]
fn works_on_fat32_volumes() {
    let mut wrapper = FileSlack::new(
        device(common::fat32_image()),
        Metadata::new(),
        vec!["B.BIN".to_string()],
    )
    .unwrap();

    let mut input: &[u8] = b"stowaway";
    wrapper.write(&mut input, None).unwrap();

    let mut recovered = Vec::new();
    wrapper.read(&mut recovered).unwrap();
    assert_eq!(recovered, b"stowaway");
}

#[test]
fn rejects_non_fat_volumes() {
    match FileSlack::new(device(common::ext4_image()), Metadata::new(), targets()) {
        Err(Error::UnsupportedFilesystem(_)) => {}
        _ => panic!("expected UnsupportedFilesystem"),
    }
}
