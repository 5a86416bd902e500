use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use quill_cli::{admin, init, load_connspec, migrate, migration_status, rollback, serve_config};
use quill_core::db::{self, ConnectionSpec};
use quill_test_helper::create_user;
use tempfile::TempDir;

const INIT: &str = "20240301_000000_init";
const INDEXES: &str = "20240315_000000_listing_indexes";

fn sqlite_project() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".quill");
    let db_path = dir.path().join("blog.db");
    init(&base, "sqlite", db_path.to_str().unwrap()).unwrap();
    (dir, base)
}

fn status(base: &Path) -> Vec<(&'static str, bool)> {
    let conn = db::connect(&load_connspec(base).unwrap()).unwrap();
    migration_status(&conn).unwrap()
}

#[test]
fn init_saves_connection() {
    let (dir, base) = sqlite_project();
    assert!(base.join("connection.json").exists());
    let spec = load_connspec(&base).unwrap();
    let db_path = dir.path().join("blog.db");
    assert_eq!(spec, ConnectionSpec::new("sqlite", db_path.to_str().unwrap()));
}

#[test]
fn init_rejects_unknown_backend() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".quill");
    let err = init(&base, "mongodb", "localhost").unwrap_err();
    assert_eq!(err.to_string(), "Unknown backend mongodb");
    assert!(!base.exists());
}

#[test]
fn commands_need_init() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".quill");
    let err = migrate(&base).unwrap_err();
    assert!(err.to_string().contains("quill init"));
}

#[test]
fn migrate_and_rollback() {
    let (_dir, base) = sqlite_project();
    assert_eq!(status(&base), vec![(INIT, false), (INDEXES, false)]);

    assert_eq!(migrate(&base).unwrap(), 2);
    assert_eq!(status(&base), vec![(INIT, true), (INDEXES, true)]);
    assert_eq!(migrate(&base).unwrap(), 0);

    rollback(&base, None).unwrap();
    assert_eq!(status(&base), vec![(INIT, true), (INDEXES, false)]);

    assert_eq!(migrate(&base).unwrap(), 1);
    rollback(&base, Some(INIT)).unwrap();
    assert_eq!(status(&base), vec![(INIT, true), (INDEXES, false)]);

    assert!(rollback(&base, Some("19990101_000000_nope")).is_err());
    rollback(&base, None).unwrap();
    assert!(rollback(&base, None).is_err());
}

#[test]
fn docstore_has_no_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join(".quill");
    let store = dir.path().join("blog.json");
    init(&base, "docstore", store.to_str().unwrap()).unwrap();
    assert_eq!(migrate(&base).unwrap(), 0);
    assert!(status(&base).is_empty());
}

#[test]
fn admin_grants_and_revokes() {
    let (_dir, base) = sqlite_project();
    migrate(&base).unwrap();
    {
        let conn = db::connect(&load_connspec(&base).unwrap()).unwrap();
        create_user(&conn, "carol", false);
    }

    let user = admin(&base, "carol", false).unwrap();
    assert!(user.is_admin);
    let user = admin(&base, "carol", true).unwrap();
    assert!(!user.is_admin);

    let err = admin(&base, "nobody", false).unwrap_err();
    assert_eq!(err.to_string(), "No user named nobody");
}

#[test]
fn serve_prefers_explicit_database() {
    let (_dir, base) = sqlite_project();
    let saved = load_connspec(&base).unwrap();

    let config = serve_config(&base, None, None).unwrap();
    assert_eq!(config.database_url, saved.to_url());

    let config = serve_config(
        &base,
        Some("docstore::memory:".to_string()),
        Some("0.0.0.0:8080".to_string()),
    )
    .unwrap();
    assert_eq!(config.database_url, "docstore::memory:");
    assert_eq!(config.bind, "0.0.0.0:8080");
}
