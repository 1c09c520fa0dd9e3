//! Bad-cluster technique over synthetic FAT volumes.

mod common;

use slackfs::detect::FsKind;
use slackfs::device::Device;
use slackfs::errors::Error;
use slackfs::fs::fat::{FatEntry, FatFs, FAT12_BAD_CLUSTER};
use slackfs::hide::bad_cluster::FatBadCluster;
use slackfs::meta::Metadata;
use slackfs::wrap::BadCluster;

fn device(image: Vec<u8>) -> Device<Vec<u8>> {
    Device::new(image).unwrap()
}

#[test]
fn round_trips_across_multiple_clusters() {
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    // 700 bytes spans two 512-byte clusters, the second one partially.
    let payload: Vec<u8> = (0..700u32).map(|i| (i % 251) as u8).collect();
    let meta = backend.write(&mut payload.as_slice()).unwrap();
    assert_eq!(meta.clusters.len(), 2);
    assert_eq!(meta.length, 700);

    let mut recovered = Vec::new();
    backend.read(&meta, &mut recovered).unwrap();
    assert_eq!(recovered, payload);
}

#[test]
fn carrier_clusters_are_flagged_bad_in_every_fat_copy() {
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    let mut input: &[u8] = b"stowaway";
    let meta = backend.write(&mut input).unwrap();
    let cluster = meta.clusters[0];

    let dev = backend.into_device();
    let fs = FatFs::parse(&dev, FsKind::Fat12).unwrap();
    assert_eq!(fs.fat_entry(&dev, cluster).unwrap(), FatEntry::Defective);

    // Both FAT copies carry the mark.
    let image = dev.into_inner();
    for fat_base in [512usize, 3 * 512] {
        let off = fat_base + cluster as usize * 3 / 2;
        let raw = u16::from_le_bytes([image[off], image[off + 1]]);
        let value = if cluster & 1 == 1 { raw >> 4 } else { raw & 0xFFF };
        assert_eq!(u32::from(value), FAT12_BAD_CLUSTER);
    }
}

#[test]
fn never_claims_referenced_clusters() {
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    let payload = vec![0x5Au8; 512];
    let meta = backend.write(&mut payload.as_slice()).unwrap();

    // Cluster 2 belongs to A.TXT and must never be claimed.
    assert!(!meta.clusters.contains(&2));
}

#[test]
fn clear_restores_the_image() {
    let pristine = common::fat12_image();
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    let payload = vec![0xC3u8; 700];
    let meta = backend.write(&mut payload.as_slice()).unwrap();
    backend.clear(&meta).unwrap();
    backend.clear(&meta).unwrap();

    assert_eq!(backend.into_device().into_inner(), pristine);
}

#[test]
fn insufficient_space_leaves_the_volume_untouched() {
    let pristine = common::fat12_image();
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    // 58 data clusters minus the one referenced one: 57 free, 29184 bytes.
    let payload = vec![1u8; 58 * 512];
    match backend.write(&mut payload.as_slice()) {
        Err(Error::InsufficientSpace(_)) => {}
        other => panic!("expected InsufficientSpace, got {other:?}"),
    }

    assert_eq!(backend.into_device().into_inner(), pristine);
}

#[test]
fn zero_length_payload_yields_empty_metadata() {
    let mut backend = FatBadCluster::new(device(common::fat12_image()), FsKind::Fat12).unwrap();

    let meta = backend.write(&mut std::io::empty()).unwrap();
    assert!(meta.clusters.is_empty());
    assert_eq!(meta.length, 0);
}

#[test]
fn fat32_volumes_are_refused() {
    match BadCluster::new(device(common::fat32_image()), Metadata::new()) {
        Err(Error::UnsupportedFilesystem(msg)) => assert!(msg.contains("FAT32")),
        _ => panic!("expected UnsupportedFilesystem"),
    }
}

#[test]
fn wrapper_round_trip_on_fat16() {
    let mut wrapper = BadCluster::new(device(common::fat16_image()), Metadata::new()).unwrap();

    let mut input: &[u8] = b"under a bad flag";
    wrapper.write(&mut input, None).unwrap();

    let mut recovered = Vec::new();
    wrapper.read(&mut recovered).unwrap();
    assert_eq!(recovered, b"under a bad flag");
}
