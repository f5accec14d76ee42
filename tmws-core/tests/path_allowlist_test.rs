//! Path allowlist enforcement, including symlink escapes.

use std::path::{Path, PathBuf};

use tmws_core::validation::validate_file_path;

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let allowed = dir.path().join("allowed");
    std::fs::create_dir_all(&allowed).expect("mkdir");
    (dir, allowed)
}

#[test]
fn accepts_files_under_allowlist_root() {
    let (_dir, allowed) = setup();
    let file = allowed.join("profiles.json");
    std::fs::write(&file, "{}").expect("write");

    let resolved = validate_file_path(&file, &[allowed.clone()]).expect("should be allowed");
    assert!(resolved.starts_with(std::fs::canonicalize(&allowed).unwrap()));
}

#[test]
fn accepts_not_yet_existing_file_in_allowed_dir() {
    let (_dir, allowed) = setup();
    let file = allowed.join("new_profiles.json");
    assert!(validate_file_path(&file, &[allowed]).is_ok());
}

#[test]
fn rejects_paths_outside_allowlist() {
    let (_dir, allowed) = setup();
    assert!(validate_file_path(Path::new("/etc/passwd"), &[allowed.clone()]).is_err());
    assert!(validate_file_path(Path::new("../../etc/passwd"), &[allowed]).is_err());
}

#[test]
fn rejects_dotdot_escape_from_allowed_dir() {
    let (dir, allowed) = setup();
    let outside = dir.path().join("outside.json");
    std::fs::write(&outside, "{}").expect("write");

    let sneaky = allowed.join("..").join("outside.json");
    assert!(validate_file_path(&sneaky, &[allowed]).is_err());
}

#[cfg(unix)]
#[test]
fn rejects_symlink_resolving_outside_allowlist() {
    let (dir, allowed) = setup();
    let target = dir.path().join("secret.json");
    std::fs::write(&target, "{}").expect("write");

    let link = allowed.join("innocent.json");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");

    assert!(validate_file_path(&link, &[allowed]).is_err());
}

#[cfg(unix)]
#[test]
fn rejects_write_through_symlinked_parent() {
    let (dir, allowed) = setup();
    let outside_dir = dir.path().join("elsewhere");
    std::fs::create_dir_all(&outside_dir).expect("mkdir");

    let linked_dir = allowed.join("sub");
    std::os::unix::fs::symlink(&outside_dir, &linked_dir).expect("symlink");

    // File doesn't exist yet; the parent resolves outside the allowlist.
    let escape = linked_dir.join("new.json");
    assert!(validate_file_path(&escape, &[allowed]).is_err());
}

#[test]
fn empty_and_null_paths_rejected() {
    let (_dir, allowed) = setup();
    assert!(validate_file_path(Path::new(""), &[allowed.clone()]).is_err());
    assert!(validate_file_path(Path::new("pro\0files.json"), &[allowed]).is_err());
}
