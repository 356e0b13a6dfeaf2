// CLI behavior that needs no browser: configuration errors, extraction, version

use std::fs;
use tempfile::TempDir;

mod common;
use common::{run_wavescan, stdout_json, wave_stub_path};

#[test]
fn test_scan_without_url_is_a_configuration_error() {
    let output = run_wavescan(&["scan"]);

    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["error"], true);
    assert_eq!(json["kind"], "config");
    assert_eq!(json["exit_code"], 2);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("WAVESCAN_URL")
    );
}

#[test]
fn test_scan_without_wave_script_fails_before_browser_start() {
    let output = run_wavescan(&["scan", "https://example.com/"]);

    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("WAVE script")
    );
}

#[test]
fn test_scan_rejects_invalid_url() {
    let stub = wave_stub_path();
    let output = run_wavescan(&[
        "scan",
        "example.com",
        "--wave-script",
        stub.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output)["kind"], "config");
}

#[test]
fn test_scan_with_unreadable_wave_script() {
    let output = run_wavescan(&[
        "scan",
        "https://example.com/",
        "--wave-script",
        "/definitely/not/wave.js",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(
        stdout_json(&output)["message"]
            .as_str()
            .unwrap()
            .contains("/definitely/not/wave.js")
    );
}

#[test]
fn test_batch_without_urls() {
    let stub = wave_stub_path();
    let output = run_wavescan(&["batch", "--wave-script", stub.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout_json(&output)["kind"], "config");
}

#[test]
fn test_batch_reads_urls_from_environment() {
    // An invalid entry in WAVESCAN_URLS proves the variable is read
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_wavescan"))
        .arg("batch")
        .env("WAVESCAN_URLS", "https://example.com/, ftp://example.com/")
        .env("WAVESCAN_WAVE_SCRIPT", wave_stub_path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(
        stdout_json(&output)["message"]
            .as_str()
            .unwrap()
            .contains("ftp")
    );
}

#[test]
fn test_extract_merges_reports() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("accessibility-results-example-com.csv"),
        "Test Information\nTest URL,https://example.com/\n\n\
         Rule ID,Category,Impact,Description,Element,XPath,Selector,Additional Info,Help URL\n\
         alt_missing,ERROR,Critical,Missing alternative text,/img,/img,img,\"\",u\n\
         nested_interactive,ERROR,Critical,Nested,/a,/a,a,\"\",u\n",
    )
    .unwrap();

    let output = run_wavescan(&["extract", dir.path().to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["rows"], 1);
    assert_eq!(json["excluded"], 1);
    assert!(dir.path().join("all-violations.csv").exists());
}

#[test]
fn test_extract_missing_directory() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    let output = run_wavescan(&["extract", missing.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_version_prints_json() {
    let output = run_wavescan(&["version"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["name"], "wavescan");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_logs_stay_off_stdout() {
    let dir = TempDir::new().unwrap();
    let output = run_wavescan(&["extract", dir.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
}
