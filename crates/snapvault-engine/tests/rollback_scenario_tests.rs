//! Rollback scenarios: conflicts, clean restores, idempotence, consent and
//! the safety snapshot + audit entry that every intelligent rollback leaves.

use snapvault_core::consent::{AlwaysConsent, DenyConsent, SafeOnlyConsent};
use snapvault_core::errors::ExErrorKind;
use snapvault_core::model::{ConflictType, OperationType, ResolutionStrategy};
use snapvault_engine::{
    ResolveRequest, RollbackOptions, Vault, VaultConfig, SAFETY_SNAPSHOT_MESSAGE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn setup_vault() -> (TempDir, Vault, PathBuf) {
    let dir = TempDir::new().unwrap();
    let live = dir.path().join("live");
    fs::create_dir_all(&live).unwrap();
    let config = VaultConfig {
        store_root: dir.path().join("store"),
        ..VaultConfig::default()
    }
    .with_collection("skills", &live);
    let vault = Vault::open(config).unwrap();
    (dir, vault, live)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

fn snapshot_count(vault: &Vault) -> usize {
    vault
        .list_snapshots("skills", Some(100), None)
        .unwrap()
        .snapshots
        .len()
}

fn audit_count(vault: &Vault) -> usize {
    vault.get_audit_history("skills", 100).unwrap().len()
}

fn no_confirm() -> RollbackOptions {
    RollbackOptions {
        confirm: false,
        ..RollbackOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Conflict surfaced, not lost
// ---------------------------------------------------------------------------

/// S1 has a.txt="1"; a second branch snapshots a.txt="3" as S2; the live
/// tree holds a.txt="2". Rolling back to S1 merges base "3", local "2",
/// target "1" and must leave "2" on disk.
fn diverged_branches(vault: &Vault, live: &Path) -> String {
    write(live, "a.txt", "1");
    let s1 = vault.create_snapshot("skills", "s1").unwrap();
    write(live, "a.txt", "3");
    vault.create_snapshot("skills", "s2").unwrap();
    write(live, "a.txt", "2");
    s1.id
}

#[test]
fn test_conflict_is_reported_and_local_file_untouched() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);

    let result = vault
        .intelligent_rollback(&s1, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(result.success);
    assert!(!result.is_fully_resolved());
    assert_eq!(result.conflicts.len(), 1);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.file_path, "a.txt");
    assert_eq!(conflict.conflict_type, ConflictType::Content);
    assert!(!conflict.auto_mergeable);
    assert_eq!(conflict.resolution_strategy, None);
    assert_eq!(conflict.base_content.as_deref(), Some("3"));
    assert_eq!(conflict.local_content.as_deref(), Some("2"));
    assert_eq!(conflict.target_content.as_deref(), Some("1"));
    assert_eq!(read(&live, "a.txt"), "2");
}

#[test]
fn test_analysis_matches_rollback_outcome() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);

    let analysis = vault.analyze_rollback_safety(&s1, "skills").unwrap();
    assert!(!analysis.is_safe);
    assert!(analysis.local_changes_detected);
    assert_eq!(analysis.files_with_conflicts, vec!["a.txt".to_string()]);
    assert!(analysis.warnings.is_empty());
    // Analysis writes nothing
    assert_eq!(snapshot_count(&vault), 2);
    assert_eq!(audit_count(&vault), 0);
}

#[test]
fn test_conflict_resolved_with_target_content() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let result = vault
        .intelligent_rollback(&s1, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    let resolved = vault
        .resolve_conflict(
            "skills",
            ResolveRequest::new(result.conflicts[0].clone(), ResolutionStrategy::UseRemote),
        )
        .unwrap();
    assert_eq!(resolved.resolution_strategy, Some(ResolutionStrategy::UseRemote));
    assert_eq!(read(&live, "a.txt"), "1");
}

// ---------------------------------------------------------------------------
// Clean restore and idempotence
// ---------------------------------------------------------------------------

fn clean_history(vault: &Vault, live: &Path) -> String {
    write(live, "a", "0");
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    write(live, "a", "1");
    write(live, "b", "1");
    vault.create_snapshot("skills", "s1").unwrap();
    s0.id
}

#[test]
fn test_clean_restore_leaves_paths_absent_from_target() {
    let (_dir, vault, live) = setup_vault();
    let s0 = clean_history(&vault, &live);

    let result = vault
        .intelligent_rollback(&s0, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(result.is_fully_resolved());
    assert_eq!(result.files_restored, 1);
    assert_eq!(result.files_merged, 0);
    assert_eq!(read(&live, "a"), "0");
    assert_eq!(read(&live, "b"), "1");
}

#[test]
fn test_second_rollback_to_same_snapshot_merges_nothing() {
    let (_dir, vault, live) = setup_vault();
    let s0 = clean_history(&vault, &live);

    vault
        .intelligent_rollback(&s0, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();
    let second = vault
        .intelligent_rollback(&s0, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(second.success);
    assert_eq!(second.files_merged, 0);
    assert!(second.conflicts.is_empty());
    assert_eq!(read(&live, "a"), "0");
}

#[test]
fn test_local_edit_is_preserved_when_target_agrees_with_base() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    write(&live, "notes.md", "v1");
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    write(&live, "a", "1");
    vault.create_snapshot("skills", "s1").unwrap();
    write(&live, "notes.md", "edited");

    let result = vault
        .intelligent_rollback(&s0.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert_eq!(result.files_restored, 1);
    assert_eq!(result.files_merged, 1);
    assert_eq!(read(&live, "a"), "0");
    assert_eq!(read(&live, "notes.md"), "edited");
}

#[test]
fn test_empty_directory_comes_back() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    fs::create_dir_all(live.join("empty")).unwrap();
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    fs::remove_dir(live.join("empty")).unwrap();
    vault.create_snapshot("skills", "s1").unwrap();

    vault
        .intelligent_rollback(&s0.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();
    assert!(live.join("empty").is_dir());
}

// ---------------------------------------------------------------------------
// Safety snapshot and audit entry
// ---------------------------------------------------------------------------

#[test]
fn test_every_intelligent_rollback_adds_one_snapshot_and_one_audit_entry() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let snapshots_before = snapshot_count(&vault);

    let result = vault
        .intelligent_rollback(&s1, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert_eq!(snapshot_count(&vault), snapshots_before + 1);
    assert_eq!(audit_count(&vault), 1);

    let safety_id = result.safety_snapshot_id.clone().unwrap();
    let safety = vault.get_snapshot(&safety_id, "skills").unwrap().unwrap();
    assert_eq!(safety.message, SAFETY_SNAPSHOT_MESSAGE);

    // The safety snapshot captured the pre-rollback live tree
    let undo = TempDir::new().unwrap();
    vault
        .restore_snapshot(&safety_id, "skills", undo.path())
        .unwrap();
    assert_eq!(read(undo.path(), "a.txt"), "2");

    let entry = &vault.get_audit_history("skills", 10).unwrap()[0];
    assert_eq!(entry.source_snapshot_id.as_deref(), Some(safety_id.as_str()));
    assert_eq!(entry.target_snapshot_id, s1);
    assert_eq!(entry.operation_type, OperationType::Intelligent);
    assert_eq!(entry.conflicts_pending, 1);
    assert!(entry.preserve_changes_enabled);
    assert!(entry.success);
    assert_eq!(
        vault.get_audit_entry("skills", &entry.id).unwrap().as_ref(),
        Some(entry)
    );
}

#[test]
fn test_safety_snapshot_taken_even_without_preserve_changes() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let options = RollbackOptions {
        preserve_changes: false,
        confirm: false,
        selective_paths: None,
    };

    let result = vault
        .intelligent_rollback(&s1, "skills", &options, &AlwaysConsent)
        .unwrap();

    assert!(result.safety_snapshot_id.is_some());
    assert!(result.conflicts.is_empty());
    assert_eq!(result.files_restored, 1);
    assert_eq!(read(&live, "a.txt"), "1");
    let entry = &vault.get_audit_history("skills", 1).unwrap()[0];
    assert!(!entry.preserve_changes_enabled);
}

// ---------------------------------------------------------------------------
// Consent and not-found
// ---------------------------------------------------------------------------

#[test]
fn test_withheld_consent_cancels_before_any_write() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let before = snapshot_count(&vault);

    let err = vault
        .intelligent_rollback(&s1, "skills", &RollbackOptions::default(), &DenyConsent)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.message(), "cancelled");
    assert_eq!(snapshot_count(&vault), before);
    assert_eq!(audit_count(&vault), 0);
    assert_eq!(read(&live, "a.txt"), "2");

    let err = vault.rollback(&s1, "skills", true, &DenyConsent).unwrap_err();
    assert_eq!(err.message(), "cancelled");
    assert_eq!(read(&live, "a.txt"), "2");
}

#[test]
fn test_safe_only_consent_follows_analysis() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let err = vault
        .intelligent_rollback(&s1, "skills", &RollbackOptions::default(), &SafeOnlyConsent)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Validation);

    let (_dir2, clean_vault, clean_live) = setup_vault();
    let s0 = clean_history(&clean_vault, &clean_live);
    let result = clean_vault
        .intelligent_rollback(&s0, "skills", &RollbackOptions::default(), &SafeOnlyConsent)
        .unwrap();
    assert!(result.success);
}

#[test]
fn test_confirm_false_skips_consent_hook() {
    let (_dir, vault, live) = setup_vault();
    let s0 = clean_history(&vault, &live);
    let result = vault
        .intelligent_rollback(&s0, "skills", &no_confirm(), &DenyConsent)
        .unwrap();
    assert!(result.success);
}

#[test]
fn test_missing_target_is_not_found() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    vault.create_snapshot("skills", "s0").unwrap();

    let err = vault
        .intelligent_rollback("20000101T000000.000000Z", "skills", &no_confirm(), &AlwaysConsent)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    let err = vault
        .rollback("20000101T000000.000000Z", "skills", false, &AlwaysConsent)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(snapshot_count(&vault), 1);
}

#[test]
fn test_analysis_warns_about_missing_target_and_empty_history() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");

    let analysis = vault
        .analyze_rollback_safety("20000101T000000.000000Z", "skills")
        .unwrap();
    assert!(!analysis.is_safe);
    assert_eq!(analysis.warnings.len(), 2);
    assert!(analysis.warnings[0].contains("does not exist"));
    assert!(analysis.warnings[1].contains("no prior snapshots"));
}

#[test]
fn test_analysis_names_collection_that_owns_target() {
    let dir = TempDir::new().unwrap();
    let skills = dir.path().join("skills");
    let agents = dir.path().join("agents");
    fs::create_dir_all(&skills).unwrap();
    fs::create_dir_all(&agents).unwrap();
    write(&agents, "agent.md", "x");
    let config = VaultConfig {
        store_root: dir.path().join("store"),
        ..VaultConfig::default()
    }
    .with_collection("skills", &skills)
    .with_collection("agents", &agents);
    let vault = Vault::open(config).unwrap();
    let foreign = vault.create_snapshot("agents", "a").unwrap();

    let analysis = vault.analyze_rollback_safety(&foreign.id, "skills").unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.contains("belongs to collection agents")));
}

// ---------------------------------------------------------------------------
// Selective and simple rollbacks
// ---------------------------------------------------------------------------

#[test]
fn test_selective_paths_limit_writes() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "docs/guide.md", "0");
    write(&live, "b.txt", "0");
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    write(&live, "docs/guide.md", "1");
    write(&live, "b.txt", "1");
    vault.create_snapshot("skills", "s1").unwrap();

    let options = RollbackOptions {
        selective_paths: Some(vec!["docs".to_string()]),
        confirm: false,
        ..RollbackOptions::default()
    };
    let result = vault
        .intelligent_rollback(&s0.id, "skills", &options, &AlwaysConsent)
        .unwrap();

    assert_eq!(result.files_restored, 1);
    assert_eq!(read(&live, "docs/guide.md"), "0");
    assert_eq!(read(&live, "b.txt"), "1");

    let entry = &vault.get_audit_history("skills", 1).unwrap()[0];
    assert_eq!(entry.operation_type, OperationType::Selective);
    assert_eq!(entry.selective_paths, Some(vec!["docs".to_string()]));
}

#[test]
fn test_selective_path_escaping_root_is_rejected() {
    let (_dir, vault, live) = setup_vault();
    let s0 = clean_history(&vault, &live);
    let options = RollbackOptions {
        selective_paths: Some(vec!["../outside".to_string()]),
        confirm: false,
        ..RollbackOptions::default()
    };
    let err = vault
        .intelligent_rollback(&s0, "skills", &options, &AlwaysConsent)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(audit_count(&vault), 0);
}

#[test]
fn test_simple_rollback_overwrites_without_safety_snapshot() {
    let (_dir, vault, live) = setup_vault();
    let s1 = diverged_branches(&vault, &live);
    let before = snapshot_count(&vault);

    let result = vault.rollback(&s1, "skills", true, &AlwaysConsent).unwrap();

    assert!(result.success);
    assert_eq!(result.safety_snapshot_id, None);
    assert_eq!(result.files_restored, 1);
    assert_eq!(read(&live, "a.txt"), "1");
    assert_eq!(snapshot_count(&vault), before);

    let entry = &vault.get_audit_history("skills", 1).unwrap()[0];
    assert_eq!(entry.operation_type, OperationType::Simple);
    let newest = vault.list_snapshots("skills", Some(1), None).unwrap();
    assert_eq!(entry.source_snapshot_id, Some(newest.snapshots[0].id.clone()));
}

#[test]
fn test_file_turned_directory_is_not_counted_as_restored_file() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    fs::create_dir_all(live.join("x")).unwrap();
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    fs::remove_dir(live.join("x")).unwrap();
    write(&live, "x", "now a file");
    vault.create_snapshot("skills", "s1").unwrap();

    let result = vault
        .intelligent_rollback(&s0.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(result.success);
    assert!(live.join("x").is_dir());
    assert_eq!(result.files_restored, 0);
}

// ---------------------------------------------------------------------------
// Write failures
// ---------------------------------------------------------------------------

#[test]
fn test_write_failure_reports_partial_progress_and_is_audited() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a.txt", "0");
    write(&live, "docs/new.md", "n");
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    write(&live, "a.txt", "1");
    fs::remove_file(live.join("docs/new.md")).unwrap();
    vault.create_snapshot("skills", "s1").unwrap();
    // A plain file where the target needs a directory
    fs::remove_dir(live.join("docs")).unwrap();
    write(&live, "docs", "not a directory");
    let before = snapshot_count(&vault);

    let result = vault
        .intelligent_rollback(&s0.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(result.files_restored, 1, "a.txt is written before docs/new.md");
    assert_eq!(read(&live, "a.txt"), "0");
    assert_eq!(read(&live, "docs"), "not a directory");
    assert!(result.safety_snapshot_id.is_some());
    assert_eq!(snapshot_count(&vault), before + 1);

    let history = vault.get_audit_history("skills", 10).unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(history[0].error, result.error);
    assert_eq!(history[0].files_restored, 1);
}

#[test]
fn test_failed_audit_append_still_returns_rollback_result() {
    let (dir, vault, live) = setup_vault();
    let s0 = clean_history(&vault, &live);
    let catalog = dir.path().join("store/collections/skills/catalog.db");
    let conn = rusqlite::Connection::open(&catalog).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER refuse_audit BEFORE INSERT ON rollback_audit
         BEGIN SELECT RAISE(ABORT, 'audit log unavailable'); END;",
    )
    .unwrap();
    drop(conn);

    let result = vault
        .intelligent_rollback(&s0, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("audit entry not written")));
    assert_eq!(result.files_restored, 1);
    assert!(result.safety_snapshot_id.is_some());
    assert_eq!(read(&live, "a"), "0");
    assert_eq!(audit_count(&vault), 0);
}

// ---------------------------------------------------------------------------
// Symlinks
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn test_restore_never_writes_through_symlinked_directory() {
    let (dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    write(&live, "docs/readme.md", "inside");
    let s0 = vault.create_snapshot("skills", "s0").unwrap();
    fs::remove_dir_all(live.join("docs")).unwrap();
    vault.create_snapshot("skills", "s1").unwrap();
    let outside = dir.path().join("outside");
    fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, live.join("docs")).unwrap();

    let result = vault
        .intelligent_rollback(&s0.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();

    let conflicts: Vec<(&str, ConflictType)> = result
        .conflicts
        .iter()
        .map(|c| (c.file_path.as_str(), c.conflict_type))
        .collect();
    assert_eq!(
        conflicts,
        vec![
            ("docs", ConflictType::AddAdd),
            ("docs/readme.md", ConflictType::AddAdd)
        ]
    );
    assert_eq!(result.files_restored, 0);
    assert!(!outside.join("readme.md").exists());
    assert!(fs::symlink_metadata(live.join("docs"))
        .unwrap()
        .file_type()
        .is_symlink());
}

#[cfg(unix)]
#[test]
fn test_symlink_conflict_resolves_to_a_symlink() {
    let (_dir, vault, live) = setup_vault();
    write(&live, "a", "0");
    std::os::unix::fs::symlink("one", live.join("link")).unwrap();
    let s1 = vault.create_snapshot("skills", "s1").unwrap();
    fs::remove_file(live.join("link")).unwrap();
    std::os::unix::fs::symlink("two", live.join("link")).unwrap();
    vault.create_snapshot("skills", "s2").unwrap();
    fs::remove_file(live.join("link")).unwrap();
    std::os::unix::fs::symlink("three", live.join("link")).unwrap();

    let result = vault
        .intelligent_rollback(&s1.id, "skills", &no_confirm(), &AlwaysConsent)
        .unwrap();
    let conflict = result.conflicts[0].clone();
    assert_eq!(conflict.file_path, "link");
    assert!(conflict.is_symlink);
    assert_eq!(conflict.target_content, None);

    let err = vault
        .resolve_conflict(
            "skills",
            ResolveRequest::new(conflict.clone(), ResolutionStrategy::UseRemote),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(fs::read_link(live.join("link")).unwrap(), Path::new("three"));

    let mut request = ResolveRequest::new(conflict, ResolutionStrategy::UseRemote);
    request.target_snapshot_id = Some(s1.id.clone());
    vault.resolve_conflict("skills", request).unwrap();
    assert_eq!(fs::read_link(live.join("link")).unwrap(), Path::new("one"));
}
