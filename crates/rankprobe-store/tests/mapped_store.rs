//! Integration tests for file-backed key stores.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rankprobe_store::{KeyStore, Layout, RankResult, StoreError, write_key_file};
use std::io::Write;
use tempfile::{NamedTempFile, tempdir};

fn counted_file(keys: &[u64]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temporary data file");
    write_key_file(file.path(), keys, Layout::Counted).expect("Failed to write data file");
    file
}

#[test]
fn test_open_counted_matches_in_memory() {
    let keys: Vec<u64> = (0..10_000).map(|i| i * 3 + (i % 7)).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    let file = counted_file(&sorted);

    let mapped = KeyStore::<u64>::open(file.path()).unwrap();
    let owned = KeyStore::from_vec(sorted.clone()).unwrap();

    assert_eq!(mapped.size(), owned.size());
    assert_eq!(mapped.source(), Some(file.path()));
    for key in sorted.iter().step_by(37) {
        assert_eq!(mapped.rank(*key), owned.rank(*key));
    }
    assert_eq!(mapped.rank(u64::MAX), RankResult::NotFound);
}

#[test]
fn test_open_headerless_uses_supplied_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys_uint64");
    write_key_file(&path, &[10u64, 20, 30, 40], Layout::Headerless).unwrap();

    let store = KeyStore::<u64>::open_headerless(&path, 3).unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store.rank(30), RankResult::Found(2));
    assert_eq!(store.rank(40), RankResult::NotFound);
}

#[test]
fn test_open_uint32_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fb_200M_uint32");
    write_key_file(&path, &[1u32, 1, 2, 3, 5, 8], Layout::Counted).unwrap();

    let store = KeyStore::<u32>::open(&path).unwrap();
    assert_eq!(store.size(), 6);
    assert_eq!(store.rank(1), RankResult::Found(0));
    assert_eq!(store.rank(8), RankResult::Found(5));
    assert_eq!(store.rank(4), RankResult::NotFound);
}

#[test]
fn test_open_missing_file_is_io_failure() {
    let dir = tempdir().unwrap();
    let err = KeyStore::<u64>::open(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
}

#[test]
fn test_open_truncated_header() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    file.flush().unwrap();

    let err = KeyStore::<u64>::open(file.path()).unwrap_err();
    assert!(matches!(err, StoreError::Format { .. }));
}

#[test]
fn test_open_header_overstates_count() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&100u64.to_le_bytes()).unwrap();
    file.write_all(&7u64.to_le_bytes()).unwrap();
    file.flush().unwrap();

    let err = KeyStore::<u64>::open(file.path()).unwrap_err();
    match err {
        StoreError::Format { reason, .. } => assert!(reason.contains("100")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_open_headerless_too_many_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keys");
    write_key_file(&path, &[1u64, 2], Layout::Headerless).unwrap();

    let err = KeyStore::<u64>::open_headerless(&path, 3).unwrap_err();
    assert!(matches!(err, StoreError::Format { .. }));
}

#[test]
fn test_reopen_yields_identical_results() {
    let keys: Vec<u64> = (0..2_000).map(|i| i * i).collect();
    let file = counted_file(&keys);
    let probes: Vec<u64> = (0..4_000).step_by(3).collect();

    let mut first = Vec::new();
    for round in 0..3 {
        let mut store = KeyStore::<u64>::open(file.path()).unwrap();
        let results: Vec<RankResult> = probes.iter().map(|k| store.rank(*k)).collect();
        store.close();
        store.close();

        if round == 0 {
            first = results;
        } else {
            assert_eq!(results, first);
        }
    }
}

fn sorted_keys() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..500, 0..200).prop_map(|mut v| {
        v.sort_unstable();
        v
    })
}

proptest! {
    /// Present keys resolve to an index holding that key, and it is the first one.
    #[test]
    fn rank_finds_first_occurrence(keys in sorted_keys(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!keys.is_empty());
        let key = keys[pick.index(keys.len())];
        let store = KeyStore::from_vec(keys.clone()).unwrap();

        let idx = store.rank(key).index().unwrap();
        prop_assert_eq!(keys[idx], key);
        prop_assert!(idx == 0 || keys[idx - 1] < key);
    }

    /// Absent keys report the store size.
    #[test]
    fn rank_absent_reports_size(keys in sorted_keys(), key in 0u64..600) {
        prop_assume!(!keys.contains(&key));
        let store = KeyStore::from_vec(keys.clone()).unwrap();
        prop_assert_eq!(store.rank(key).to_sentinel(store.size()), keys.len());
    }

    /// Windowed search agrees with the full search when the true rank is inside
    /// the window and never reports a match from outside it.
    #[test]
    fn rank_within_agrees_inside_window(
        keys in sorted_keys(),
        key in 0u64..500,
        lo in 0usize..220,
        width in 0usize..220,
    ) {
        let store = KeyStore::from_vec(keys.clone()).unwrap();
        let hi = lo + width;
        let windowed = store.rank_within(key, lo, hi);

        match store.rank(key) {
            RankResult::Found(t) if t >= lo && t < hi.min(keys.len()) => {
                prop_assert_eq!(windowed, RankResult::Found(t));
            }
            _ => {
                if let RankResult::Found(i) = windowed {
                    prop_assert!(i >= lo && i < hi.min(keys.len()));
                    prop_assert_eq!(keys[i], key);
                }
            }
        }
    }
}
