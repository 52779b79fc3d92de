//! End-to-end tests for CLI exit codes.
//!
//! - Exit code 0: Success
//! - Exit code 1: devsdk itself failed (bad configuration, module not open, ...)
//! - Exit code 2: Invalid command-line usage (handled by clap)
//! - Anything else: passed through from flatpak-builder or `flatpak run`

#[allow(dead_code)]
mod common;
#[allow(unused_imports)]
use common::prelude::*;

#[test]
fn test_exit_code_help() {
    let mut cmd = cargo_bin_cmd!("devsdk");
    cmd.arg("--help").assert().code(0);
}

#[test]
fn test_exit_code_version() {
    let mut cmd = cargo_bin_cmd!("devsdk");
    cmd.arg("--version")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("devsdk"));
}

#[test]
fn test_exit_code_unknown_subcommand() {
    let mut cmd = cargo_bin_cmd!("devsdk");
    cmd.arg("frobnicate").assert().code(2);
}

#[test]
fn test_exit_code_missing_module_argument() {
    let fixture = TestFixture::new();
    fixture.command().arg("open").assert().code(2);
}

#[test]
fn test_exit_code_invalid_config() {
    let fixture = TestFixture::new().with_file("devsdk.ini", "[Common]\nuser_installation = maybe\n");

    fixture
        .command()
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config"))
        .stderr(predicate::str::contains("not a boolean value"));
}

#[test]
fn test_unset_keys_use_defaults() {
    let temp = TempDir::new().unwrap();
    let workdir = temp.child("work");

    // Only the workdir is set; checkoutdir and modules come from defaults
    temp.child("devsdk.ini")
        .write_str(&format!("[Common]\nworkdir = {}\n", workdir.path().display()))
        .unwrap();

    let mut cmd = cargo_bin_cmd!("devsdk");
    cmd.arg("--config")
        .arg(temp.child("devsdk.ini").path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("at-spi2-core"))
        .stdout(predicate::str::contains("gtk3"));

    assert!(workdir.child("checkout").path().is_dir());
}

#[test]
fn test_config_from_environment() {
    let fixture = TestFixture::new();

    let mut cmd = cargo_bin_cmd!("devsdk");
    cmd.env("DEVSDK_CONFIG", fixture.config_path())
        .arg("list")
        .assert()
        .success()
        .stdout("   glib\n   pango\n   gtk3\n");
}

#[cfg(unix)]
#[test]
fn test_exit_code_run_passes_app_code_through() {
    let fixture = TestFixture::new().with_recording_flatpak();

    fixture
        .command()
        .args(["run", "org.gnome.Maps", "--verbose"])
        .env("FAKE_BUILDER_EXIT", "42")
        .assert()
        .code(42);
}
