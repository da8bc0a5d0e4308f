// Test suite for the archive codec: extract(create(dir)) reproduces dir,
// including empty directories and symlinks, and leaves unrelated paths alone.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use snapvault_core::{ContentHasher, ExErrorKind, FileTree};
use snapvault_store::ArchiveStore;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn populate(root: &Path) {
    fs::create_dir_all(root.join("skill-a/docs")).unwrap();
    fs::create_dir_all(root.join("empty/nested-empty")).unwrap();
    fs::write(root.join("skill-a/SKILL.md"), "# Skill A\n").unwrap();
    fs::write(root.join("skill-a/docs/usage.md"), "usage").unwrap();
    fs::write(root.join("blob.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();
    let long_name = format!("{}.txt", "n".repeat(150));
    fs::write(root.join("skill-a").join(long_name), "long path").unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink("skill-a/SKILL.md", root.join("link-to-skill")).unwrap();
}

#[test]
fn test_round_trip_is_byte_exact() {
    let src = TempDir::new().unwrap();
    populate(src.path());

    let store = ArchiveStore::default();
    let bytes = store.create(src.path()).unwrap();
    let dest = TempDir::new().unwrap();
    store.extract(&bytes, dest.path()).unwrap();

    assert_eq!(
        FileTree::from_dir(src.path()).unwrap(),
        FileTree::from_dir(dest.path()).unwrap()
    );
    let hasher = ContentHasher::new();
    assert_eq!(
        hasher.hash(src.path()).unwrap(),
        hasher.hash(dest.path()).unwrap()
    );
    assert!(dest.path().join("empty/nested-empty").is_dir());
}

#[cfg(unix)]
#[test]
fn test_symlink_stored_as_link() {
    let src = TempDir::new().unwrap();
    populate(src.path());
    let store = ArchiveStore::default();
    let dest = TempDir::new().unwrap();
    store
        .extract(&store.create(src.path()).unwrap(), dest.path())
        .unwrap();

    let meta = fs::symlink_metadata(dest.path().join("link-to-skill")).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(
        fs::read_link(dest.path().join("link-to-skill")).unwrap(),
        Path::new("skill-a/SKILL.md")
    );
}

#[test]
fn test_extract_overwrites_archived_paths_only() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "archived").unwrap();
    let store = ArchiveStore::default();
    let bytes = store.create(src.path()).unwrap();

    let dest = TempDir::new().unwrap();
    fs::write(dest.path().join("a.txt"), "local").unwrap();
    fs::write(dest.path().join("untouched.txt"), "keep me").unwrap();

    let written = store.extract(&bytes, dest.path()).unwrap();
    assert_eq!(written, 1);
    assert_eq!(fs::read_to_string(dest.path().join("a.txt")).unwrap(), "archived");
    assert_eq!(
        fs::read_to_string(dest.path().join("untouched.txt")).unwrap(),
        "keep me"
    );
}

#[test]
fn test_decode_tree_matches_source_hash() {
    let src = TempDir::new().unwrap();
    populate(src.path());
    let store = ArchiveStore::new(9);
    let tree = store.decode_tree(&store.create(src.path()).unwrap()).unwrap();
    assert_eq!(
        tree.content_hash(),
        ContentHasher::new().hash(src.path()).unwrap()
    );
}

#[test]
fn test_flipped_byte_is_corrupt() {
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), "some content worth compressing").unwrap();
    let store = ArchiveStore::default();
    let mut bytes = store.create(src.path()).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;

    let err = store.decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::ArchiveCorrupt);
}
