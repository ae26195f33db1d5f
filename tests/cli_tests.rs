/*
 * Integration tests for fwtap
 *
 * These run the built binary and check its output and exit status for the
 * commands that need no attached device.
 */

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn fwtap(dir: &Path, args: &[&str]) -> Output {
    // Point at a config that does not exist so the user's own is never read
    let config = dir.join("config.json");
    Command::new(env!("CARGO_BIN_EXE_fwtap"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env_remove("FWTAP_LOG")
        .output()
        .expect("run fwtap")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn write_dump(dir: &Path) -> std::path::PathBuf {
    let mut data = Vec::new();
    data.extend_from_slice(&0x4D4F_444Du32.to_le_bytes());
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&8192u32.to_le_bytes());
    data.extend_from_slice(&0x0400_0000u32.to_le_bytes());
    let mut build_id = [0u8; 64];
    build_id[..12].copy_from_slice(b"MPSS.AT.4.0c");
    data.extend_from_slice(&build_id);
    data.extend_from_slice(&[0xFF; 32]);
    data.extend_from_slice(b"QC_IMAGE_VERSION_STRING=MPSS\x00");
    data.extend_from_slice(&[0u8; 128]);
    let path = dir.join("modem.bin");
    fs::write(&path, data).unwrap();
    path
}

#[test]
fn test_chips_lists_vulnerable_only() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["chips"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("A10 (iPhone 7)"));
    assert!(text.contains("0x8015"));
    assert!(!text.contains("A12"));
}

#[test]
fn test_chips_all_json() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["chips", "--all", "--json"]);
    assert!(out.status.success());
    let chips: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let chips = chips.as_array().unwrap();
    assert_eq!(chips.len(), 11);
    let patched: Vec<_> = chips.iter().filter(|c| c["vulnerable"] == false).collect();
    assert_eq!(patched.len(), 2);
}

#[test]
fn test_analyze_text() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path());
    let out = fwtap(dir.path(), &["analyze", dump.to_str().unwrap()]);
    assert!(out.status.success(), "{}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Magic:       0x4D4F444D"));
    assert!(text.contains("Build ID:    MPSS.AT.4.0c"));
    assert!(text.contains("... 2 strings found"));
}

#[test]
fn test_analyze_json() {
    let dir = TempDir::new().unwrap();
    let dump = write_dump(dir.path());
    let out = fwtap(dir.path(), &["analyze", dump.to_str().unwrap(), "--json"]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["header"]["version"], 2);
    assert_eq!(report["string_count"], 2);
    assert_eq!(report["first_strings"][1]["text"], "QC_IMAGE_VERSION_STRING=MPSS");
}

#[test]
fn test_analyze_truncated_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bin");
    fs::write(&path, [0u8; 40]).unwrap();
    let out = fwtap(dir.path(), &["analyze", path.to_str().unwrap()]);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("too short"));
}

#[test]
fn test_identify_patched_chip() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "0x8020"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("NOT vulnerable"));
}

#[test]
fn test_identify_unknown_chip() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "1234"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("Unknown device CPID: 0x1234"));
    assert!(err.contains("fwtap chips --all"));
}

#[test]
fn test_identify_vulnerable_chip_needs_key() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "8000"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout(&out).contains("Vulnerable: YES"));
    assert!(stderr(&out).contains("--key"));
}

#[test]
fn test_identify_malformed_key() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "8000", "--key", "not-a-key"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Authentication failed"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), r#"{"partition_candidates": []}"#).unwrap();
    let out = fwtap(dir.path(), &["chips"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("partition_candidates"));
}

#[test]
fn test_identify_patched_chip_ignores_bad_key() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "0x8020", "--key", "bad"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("NOT vulnerable"), "{}", err);
    assert!(!err.contains("Authentication failed"));
}

#[test]
fn test_identify_patched_chip_ignores_missing_payload() {
    let dir = TempDir::new().unwrap();
    let out = fwtap(dir.path(), &["identify", "--cpid", "0x8020", "--payload", "/nonexistent/p.bin"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("NOT vulnerable"), "{}", err);
    assert!(!err.contains("Failed to read file"));
}

#[test]
fn test_identify_missing_payload_reports_os_error_once() {
    let dir = TempDir::new().unwrap();
    let key = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    let missing = dir.path().join("missing.bin");
    let out = fwtap(
        dir.path(),
        &["identify", "--cpid", "8000", "--key", key, "--payload", missing.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("Failed to read file"), "{}", err);
    assert_eq!(err.matches("os error 2").count(), 1, "{}", err);
}

#[test]
fn test_identify_without_dfu_device() {
    let dir = TempDir::new().unwrap();
    let usb = dir.path().join("usb");
    fs::create_dir_all(&usb).unwrap();
    let config = serde_json::json!({ "usb_sysfs_root": usb });
    fs::write(dir.path().join("config.json"), config.to_string()).unwrap();

    let out = fwtap(dir.path(), &["identify"]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("No device matching 05ac:1227"), "{}", err);
    assert!(err.contains("To enter DFU mode"));
}
