//! Behaviour shared by every verifier, exercised through the public API.

use proptest::prelude::*;
use std::io::Write;
use sumcheck_core::{Algorithm, Digest, TarSum, Verifier, VerifierKind, Verify, Version};

fn archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in files {
        let mut header = tar::Header::new_ustar();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_uid(1000);
        header.set_gid(1000);
        header.set_mtime(1_600_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, path, &data[..]).unwrap();
    }
    builder.into_inner().unwrap()
}

fn tarsum_of(data: &[u8], version: Version) -> Digest {
    let mut tarsum = TarSum::new(data, version);
    tarsum.consume().unwrap();
    tarsum.digest()
}

fn run(verifier: &mut Verifier, data: &[u8], chunk: usize) -> bool {
    for piece in data.chunks(chunk.max(1)) {
        verifier.write_all(piece).unwrap();
    }
    verifier.close().unwrap();
    verifier.verified()
}

#[test]
fn direct_digests_pick_hash_verifier() {
    let digest = Digest::parse("md5:5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
    let mut verifier = Verifier::for_digest(&digest);
    assert_eq!(verifier.kind(), VerifierKind::Hash);
    assert!(run(&mut verifier, b"hello world", 4));
}

#[test]
fn tarsum_digests_pick_tarsum_verifier() {
    let data = archive(&[("docs/readme.txt", b"read me".to_vec())]);
    let digest = tarsum_of(&data, Version::V1);
    assert!(digest.as_str().starts_with("tarsum.v1+sha256:"));

    let mut verifier = Verifier::for_digest(&digest);
    assert_eq!(verifier.kind(), VerifierKind::TarSum);
    assert!(run(&mut verifier, &data, 4096));
    assert_eq!(verifier.actual(), Some(digest));
}

#[test]
fn tarsum_ignores_entry_order() {
    let one = archive(&[("a", b"alpha".to_vec()), ("b", b"beta".to_vec())]);
    let two = archive(&[("b", b"beta".to_vec()), ("a", b"alpha".to_vec())]);

    let mut verifier = Verifier::for_digest(&tarsum_of(&one, Version::V1));
    assert!(run(&mut verifier, &two, 100));
}

#[test]
fn tarsum_v0_and_v1_differ() {
    let data = archive(&[("a", b"alpha".to_vec())]);
    let v0 = tarsum_of(&data, Version::V0);
    let v1 = tarsum_of(&data, Version::V1);
    assert_ne!(v0.hex(), v1.hex());

    // A v1 sum never verifies as v0.
    let forged = Digest::parse(&format!("tarsum+sha256:{}", v1.hex())).unwrap();
    let mut verifier = Verifier::for_digest(&forged);
    assert!(!run(&mut verifier, &data, 512));
}

#[test]
fn tarsum_with_other_hash() {
    let data = archive(&[("a", vec![7u8; 3000])]);
    let mut tarsum = TarSum::with_algorithm(&data[..], Version::Dev, Algorithm::Sha512);
    tarsum.consume().unwrap();
    let digest = tarsum.digest();
    assert!(digest.as_str().starts_with("tarsum.dev+sha512:"));

    let mut verifier = Verifier::for_digest(&digest);
    assert!(run(&mut verifier, &data, 1000));
}

#[test]
fn length_verifier_counts_exactly() {
    let mut exact = Verifier::for_length(10);
    assert!(run(&mut exact, b"0123456789", 3));

    let mut short = Verifier::for_length(10);
    assert!(!run(&mut short, b"012345678", 3));
}

#[test]
fn verified_is_stable_without_writes() {
    let digest = Digest::from_bytes(b"stable");
    let mut verifier = Verifier::for_digest(&digest);
    verifier.write_all(b"stable").unwrap();
    verifier.close().unwrap();

    let first = verifier.verified();
    assert_eq!(first, verifier.verified());
    assert_eq!(first, verifier.verified());
    assert!(first);
}

#[test]
fn digests_round_trip_through_json() {
    let digest = Digest::from_bytes(b"json");
    let json = serde_json::to_string(&digest).unwrap();
    let back: Digest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, digest);

    assert!(serde_json::from_str::<Digest>("\"sha256:nothex\"").is_err());
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// One big write and many small writes give the same answer.
    #[test]
    fn prop_chunking_is_irrelevant_for_tarsum(
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..1500), 1..4),
        chunk in 1usize..700,
    ) {
        let files: Vec<(String, Vec<u8>)> = contents
            .into_iter()
            .enumerate()
            .map(|(i, data)| (format!("dir/file{}", i), data))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> =
            files.iter().map(|(name, data)| (name.as_str(), data.clone())).collect();
        let data = archive(&borrowed);
        let digest = tarsum_of(&data, Version::V1);

        let mut whole = Verifier::for_digest(&digest);
        let mut pieces = Verifier::for_digest(&digest);
        prop_assert!(run(&mut whole, &data, data.len()));
        prop_assert!(run(&mut pieces, &data, chunk));
    }

    /// Hash and length verifiers agree with a one-shot computation.
    #[test]
    fn prop_hash_and_length_agree(
        data in prop::collection::vec(any::<u8>(), 0..4096),
        chunk in 1usize..512,
    ) {
        let mut hash = Verifier::for_digest(&Digest::from_bytes(&data));
        let mut length = Verifier::for_length(data.len() as u64);
        prop_assert!(run(&mut hash, &data, chunk));
        prop_assert!(run(&mut length, &data, chunk));
    }
}
