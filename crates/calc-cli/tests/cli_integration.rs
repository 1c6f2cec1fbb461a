//! Integration tests for the calc CLI, using plain files as the backing store.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use calc_core::{Register, PAGE_BYTES, STATUS_COMPLETE};
use log as _;

fn run_calc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_calc"))
        .args(args)
        .output()
        .expect("failed to run calc")
}

fn write_register_page(path: &Path, status: u32, result: u32) {
    let mut page = vec![0u8; PAGE_BYTES];
    let offset = Register::Status.byte_offset();
    page[offset..offset + 4].copy_from_slice(&status.to_ne_bytes());
    let offset = Register::Result.byte_offset();
    page[offset..offset + 4].copy_from_slice(&result.to_ne_bytes());
    fs::write(path, page).unwrap();
}

#[test]
fn help_prints_usage_and_succeeds() {
    let output = run_calc(&["-h"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Usage: calc"));
}

#[test]
fn wrong_argument_count_fails_with_usage() {
    let output = run_calc(&["10", "+"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: expected 3 arguments"));
    assert!(stderr.contains("Usage: calc"));
}

#[test]
fn unknown_operator_fails() {
    let output = run_calc(&["10", "%", "3"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown operator '%'"));
}

#[test]
fn completed_block_prints_result() {
    let temp_dir = tempfile::tempdir().unwrap();
    let device = temp_dir.path().join("mem");
    write_register_page(&device, STATUS_COMPLETE, 15);

    let output = run_calc(&[
        "--device",
        device.to_str().unwrap(),
        "--base",
        "0",
        "10",
        "+",
        "5",
    ]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Result: 15\n");
}

#[test]
fn idle_block_reports_timeout_with_status() {
    let temp_dir = tempfile::tempdir().unwrap();
    let device = temp_dir.path().join("mem");
    write_register_page(&device, 0, 0);

    let output = run_calc(&[
        "--device",
        device.to_str().unwrap(),
        "--base",
        "0",
        "--budget",
        "1000",
        "10",
        "/",
        "0",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TIMEOUT: status=0"));
}

#[test]
fn missing_device_reports_access_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let device = temp_dir.path().join("absent");

    let output = run_calc(&["--device", device.to_str().unwrap(), "1", "+", "1"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error: cannot open"));
}

#[test]
fn unaligned_base_is_rejected_before_device_access() {
    let output = run_calc(&["--device", "/nonexistent", "--base", "0x10", "1", "+", "1"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("is not aligned"));
}

#[test]
fn verbose_logs_mapping_details() {
    let temp_dir = tempfile::tempdir().unwrap();
    let device = temp_dir.path().join("mem");
    write_register_page(&device, STATUS_COMPLETE, 7);

    let output = run_calc(&[
        "-v",
        "--device",
        device.to_str().unwrap(),
        "--base",
        "0",
        "10",
        "-",
        "3",
    ]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEBUG - mapped"));
    assert!(stderr.contains("DEBUG - unmapped"));
}
