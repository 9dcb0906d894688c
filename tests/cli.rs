use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Run in an empty directory so no local config.yaml is picked up
fn mashup(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mashup").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("MJ_APIKEY_PUBLIC")
        .env_remove("MJ_APIKEY_PRIVATE");
    cmd
}

#[test]
fn count_must_exceed_ten() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args(["create", "Adele", "10", "25", "out.mp3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Count must be > 10"));
}

#[test]
fn duration_must_exceed_twenty() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args(["create", "Adele", "11", "20", "out.mp3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Duration must be > 20"));
}

#[test]
fn output_must_be_mp3() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args(["create", "Adele", "11", "21", "out.wav"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Output must be .mp3"));
}

#[test]
fn email_without_keys_is_rejected() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args([
            "create",
            "Adele",
            "11",
            "21",
            "out.mp3",
            "--email",
            "fan@example.com",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("MJ_APIKEY_PUBLIC"));
}

#[test]
fn non_numeric_count_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args(["create", "Adele", "many", "21", "out.mp3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COUNT"));
}

#[test]
fn rejected_input_leaves_directory_untouched() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .args(["create", "Adele", "3", "25", "out.mp3"])
        .assert()
        .failure();

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    mashup(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("tools"));
}
