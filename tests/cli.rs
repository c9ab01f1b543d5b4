//! CLI integration tests for studytrack admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use studytrack::store::{SqliteStore, Store};
use studytrack::types::Role;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("studytrack").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self, email: &str) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--email",
                email,
            ])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("studytrack.db")).expect("failed to open store")
    }
}

#[test]
fn init_creates_database_file_and_admin_token_file() {
    let ctx = TestContext::new();

    ctx.init("head@school.example")
        .success()
        .stdout(predicate::str::contains("Admin token"));

    ctx.temp_dir
        .child("studytrack.db")
        .assert(predicate::path::exists());
    ctx.temp_dir
        .child(".admin_token")
        .assert(predicate::str::starts_with("studytrack_"));
}

#[cfg(unix)]
#[test]
fn init_restricts_admin_token_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new();
    ctx.init("head@school.example").success();

    let mode = std::fs::metadata(ctx.data_dir().join(".admin_token"))
        .expect("token metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn init_creates_admin_user_and_seeds_syllabus() {
    let ctx = TestContext::new();
    ctx.init("Head@School.example").success();

    let store = ctx.store();
    let admin = store
        .get_user_by_email("head@school.example")
        .expect("lookup admin")
        .expect("admin exists");
    assert_eq!(admin.role, Role::Admin);
    assert_eq!(admin.email, "head@school.example");
    assert_eq!(store.list_user_tokens(&admin.id).expect("tokens").len(), 1);
    assert!(store.count_subjects().expect("count subjects") > 0);
}

#[test]
fn init_rejects_second_initialization_with_existing_database() {
    let ctx = TestContext::new();
    ctx.init("head@school.example").success();

    ctx.init("other@school.example")
        .failure()
        .stderr(predicate::str::contains("already initialized"));

    let store = ctx.store();
    assert_eq!(store.list_all_users().expect("users").len(), 1);
}

#[test]
fn init_rejects_invalid_email() {
    let ctx = TestContext::new();

    ctx.init("not-an-email")
        .failure()
        .stderr(predicate::str::contains("Invalid admin email"));
}

#[test]
fn serve_refuses_to_start_before_init() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Server not initialized"));
}

#[test]
fn serve_rejects_unknown_config_keys() {
    let ctx = TestContext::new();
    ctx.init("head@school.example").success();

    let config = ctx.temp_dir.child("studytrack.toml");
    config
        .write_str("port = 9090\npublic_base_url = \"http://example.com\"\n")
        .expect("write config");

    ctx.cmd()
        .args([
            "serve",
            "--data-dir",
            &ctx.data_dir_str(),
            "--config",
            &config.path().to_string_lossy(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
