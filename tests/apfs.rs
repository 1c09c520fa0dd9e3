//! APFS traversal and inode-pad technique over a synthetic container.

mod common;

use slackfs::device::Device;
use slackfs::errors::Error;
use slackfs::fs::apfs::{ApfsContainer, InodeLocation};
use slackfs::hide::inode_pad::ApfsInodePad;
use slackfs::meta::Metadata;
use slackfs::wrap::InodePad;

fn device(image: Vec<u8>) -> Device<Vec<u8>> {
    Device::new(image).unwrap()
}

#[test]
fn enumerates_inode_records_across_volumes() {
    let dev = device(common::apfs_image());
    let container = ApfsContainer::parse(&dev).unwrap();

    let volumes = container.volumes(&dev).unwrap();
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[0].root_tree_oid, 0x500);
    assert_eq!(volumes[1].root_tree_oid, 0x600);

    // One location per inode record; each volume's root node is excluded, and the
    // extended-attribute record does not count.
    let inodes = container.all_inodes(&dev).unwrap();
    let expected: Vec<InodeLocation> = common::APFS_INODE_LOCATIONS
        .iter()
        .map(|&(block, offset)| InodeLocation { block, offset })
        .collect();
    assert_eq!(inodes, expected);
}

#[test]
fn parser_is_read_only() {
    let pristine = common::apfs_image();
    let dev = device(common::apfs_image());

    let container = ApfsContainer::parse(&dev).unwrap();
    container.volumes(&dev).unwrap();
    container.all_inodes(&dev).unwrap();

    assert_eq!(dev.into_inner(), pristine);
}

#[test]
fn pad_round_trip_with_odd_length() {
    let mut backend = ApfsInodePad::new(device(common::apfs_image())).unwrap();

    let mut input: &[u8] = b"pads!";
    let meta = backend.write(&mut input).unwrap();
    assert_eq!(meta.length, 5);
    assert_eq!(meta.slots.len(), 3);

    let mut recovered = Vec::new();
    backend.read(&meta, &mut recovered).unwrap();
    assert_eq!(recovered, b"pads!");
}

#[test]
fn occupied_pads_are_skipped() {
    let mut image = common::apfs_image();
    // Preoccupy the first inode's padding field.
    let (block, offset) = common::APFS_INODE_LOCATIONS[0];
    image[(block + u64::from(offset) + 82) as usize] = 0xEE;

    let mut backend = ApfsInodePad::new(device(image)).unwrap();
    let mut input: &[u8] = b"hi";
    let meta = backend.write(&mut input).unwrap();

    assert_eq!(meta.slots.len(), 1);
    assert_eq!(meta.slots[0].block, common::APFS_INODE_LOCATIONS[1].0);
    assert_eq!(meta.slots[0].offset, common::APFS_INODE_LOCATIONS[1].1 + 82);

    let mut recovered = Vec::new();
    backend.read(&meta, &mut recovered).unwrap();
    assert_eq!(recovered, b"hi");
}

#[test]
fn clear_restores_the_image() {
    let pristine = common::apfs_image();
    let mut backend = ApfsInodePad::new(device(common::apfs_image())).unwrap();

    let mut input: &[u8] = b"gone";
    let meta = backend.write(&mut input).unwrap();
    backend.clear(&meta).unwrap();
    backend.clear(&meta).unwrap();

    assert_eq!(backend.into_device().into_inner(), pristine);
}

#[test]
fn capacity_boundary() {
    // Three inode records, two bytes each.
    let mut backend = ApfsInodePad::new(device(common::apfs_image())).unwrap();
    let meta = backend.write(&mut &b"sixSix"[..]).unwrap();
    assert_eq!(meta.slots.len(), 3);

    let mut backend = ApfsInodePad::new(device(common::apfs_image())).unwrap();
    match backend.write(&mut &b"seven b"[..]) {
        Err(Error::InsufficientSpace(_)) => {}
        other => panic!("expected InsufficientSpace, got {other:?}"),
    }

    let mut backend = ApfsInodePad::new(device(common::apfs_image())).unwrap();
    let meta = backend.write(&mut std::io::empty()).unwrap();
    assert!(meta.slots.is_empty());
}

#[test]
fn wrapper_round_trip() {
    let mut wrapper = InodePad::new(device(common::apfs_image()), Metadata::new()).unwrap();

    let mut input: &[u8] = b"000000";
    wrapper.write(&mut input, Some("/tmp/padfile")).unwrap();
    assert_eq!(
        wrapper.metadata().get_file("0").unwrap().filename,
        "padfile"
    );

    let mut recovered = Vec::new();
    wrapper.read(&mut recovered).unwrap();
    assert_eq!(recovered, b"000000");
}
