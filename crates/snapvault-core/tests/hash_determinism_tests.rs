// Test suite for content hashing: identical relative structure and bytes
// hash identically regardless of location or creation order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use snapvault_core::{ContentHasher, FileTree};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_tree(root: &Path, files: &[(String, Vec<u8>)]) {
    for (rel, bytes) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
}

fn file_set() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-c]{1,2}(/[a-c]{1,2})?\\.txt",
        prop::collection::vec(any::<u8>(), 0..32),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn hash_ignores_location_and_write_order(files in file_set()) {
        let forward: Vec<_> = files.clone().into_iter().collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_tree(a.path(), &forward);
        write_tree(b.path(), &reversed);

        let hasher = ContentHasher::new();
        let ha = hasher.hash(a.path()).unwrap();
        let hb = hasher.hash(b.path()).unwrap();
        prop_assert_eq!(&ha, &hb);
        prop_assert_eq!(FileTree::from_dir(a.path()).unwrap().content_hash(), ha);
    }

    #[test]
    fn hash_changes_when_any_byte_changes(files in file_set(), extra in any::<u8>()) {
        let mut changed: Vec<_> = files.clone().into_iter().collect();
        changed[0].1.push(extra);

        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write_tree(a.path(), &files.into_iter().collect::<Vec<_>>());
        write_tree(b.path(), &changed);

        let hasher = ContentHasher::new();
        prop_assert_ne!(hasher.hash(a.path()).unwrap(), hasher.hash(b.path()).unwrap());
    }
}
