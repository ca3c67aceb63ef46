// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the runtime reporter
//!
//! These drive the C-ABI entry points the way instrumented code does and
//! read the emitted stream back from a file. Tests share process-global
//! configuration, so everything that redirects the output stream runs
//! serially.

use std::ffi::CString;
use std::ptr;

use serial_test::serial;

use runtime::ffi::{
    trace2pass_check_pure_consistency, trace2pass_fini, trace2pass_init,
    trace2pass_report_bounds_violation, trace2pass_report_division_by_zero,
    trace2pass_report_loop_bound_exceeded, trace2pass_report_overflow,
    trace2pass_report_sign_conversion, trace2pass_report_unreachable, trace2pass_should_sample,
};
use runtime::{set_output_file, set_sample_rate};

fn pc(addr: usize) -> *const libc::c_void {
    addr as *const libc::c_void
}

/// Redirect the stream to a fresh temp file and return a closure that
/// reads it back (after redirecting away so the handle flushes and drops).
fn capture_output() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports.log");
    set_output_file(path.to_str().unwrap());
    (dir, path)
}

fn read_back(dir: &tempfile::TempDir, path: &std::path::Path) -> String {
    let other = dir.path().join("drain.log");
    set_output_file(other.to_str().unwrap());
    std::fs::read_to_string(path).unwrap()
}

#[test]
#[serial(runtime_config)]
fn test_same_site_reports_once_per_thread() {
    let (dir, path) = capture_output();
    let expr = CString::new("x * y").unwrap();

    // Unique pc per test to dodge earlier tests' bloom insertions.
    let site = 0x7700_0000;
    for _ in 0..5 {
        trace2pass_report_overflow(pc(site), expr.as_ptr(), 1_000_000, 1_000_000);
    }

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 1);
    assert!(text.contains("Type: arithmetic_overflow"));
    assert!(text.contains("Operands: 1000000, 1000000"));
}

#[test]
#[serial(runtime_config)]
fn test_distinct_sites_each_report() {
    let (dir, path) = capture_output();
    let expr = CString::new("x + y").unwrap();

    for i in 0..4u64 {
        trace2pass_report_overflow(pc(0x7710_0000 + i as usize * 4), expr.as_ptr(), 1, 2);
    }

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 4);
}

#[test]
#[serial(runtime_config)]
fn test_dedup_is_per_thread_not_per_process() {
    let (dir, path) = capture_output();
    let site = 0x7720_0000;

    let report_once = move || {
        let expr = CString::new("x * y").unwrap();
        trace2pass_report_overflow(pc(site), expr.as_ptr(), 7, 9);
    };

    report_once();
    report_once(); // same thread: suppressed
    let handle = std::thread::spawn(report_once); // fresh thread: emits
    handle.join().unwrap();

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 2);
}

#[test]
#[serial(runtime_config)]
fn test_pure_inconsistency_reports_exactly_once_with_both_results() {
    let (dir, path) = capture_output();
    let name = CString::new("pure_sum").unwrap();
    let site = 0x7730_0000;

    // First observation memoizes silently.
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 20, 22, 42);
    // Consistent repeat: silent.
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 20, 22, 42);
    // Drifted result: one report carrying both values.
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 20, 22, 1);
    // Further drift at the same site: bloom-suppressed.
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 20, 22, 5);

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 1);
    assert!(text.contains("Type: pure_function_inconsistency"));
    assert!(text.contains("Previous Result: 42"));
    assert!(text.contains("Current Result: 1"));
}

#[test]
#[serial(runtime_config)]
fn test_first_pure_observation_does_not_consume_dedup_budget() {
    let (dir, path) = capture_output();
    let name = CString::new("pure_mul").unwrap();
    let site = 0x7740_0000;

    // The memo-then-dedup order means a first observation must not mark
    // the site as seen.
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 3, 5, 15);
    trace2pass_check_pure_consistency(pc(site), name.as_ptr(), 3, 5, 16);

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 1);
}

#[test]
#[serial(runtime_config)]
fn test_every_entry_point_formats_its_payload() {
    let (dir, path) = capture_output();

    let expr = CString::new("x << y").unwrap();
    trace2pass_report_overflow(pc(0x7750_0000), expr.as_ptr(), 1, 40);

    trace2pass_report_sign_conversion(pc(0x7750_0010), -1, 4_294_967_295, 32, 32);

    let op = CString::new("urem").unwrap();
    trace2pass_report_division_by_zero(pc(0x7750_0020), op.as_ptr(), 9, 0);

    trace2pass_report_bounds_violation(pc(0x7750_0030), pc(0x1000), usize::MAX, 0);

    let message = CString::new("unreachable code executed").unwrap();
    trace2pass_report_unreachable(pc(0x7750_0040), message.as_ptr());

    let loop_name = CString::new("count:header").unwrap();
    trace2pass_report_loop_bound_exceeded(pc(0x7750_0050), loop_name.as_ptr(), 10_000_001, 10_000_000);

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 6);
    assert!(text.contains("Type: arithmetic_overflow"));
    assert!(text.contains("Type: sign_conversion"));
    assert!(text.contains("Cast Value (unsigned i32): 4294967295 (0xffffffff)"));
    assert!(text.contains("Type: division_by_zero"));
    assert!(text.contains("Operation: urem"));
    assert!(text.contains("Type: bounds_violation"));
    // usize::MAX round-trips to the signed offset -1.
    assert!(text.contains("Offset: -1"));
    assert!(text.contains("Type: unreachable_code_executed"));
    assert!(text.contains("Type: loop_bound_exceeded"));
    assert!(text.contains("Iteration Count: 10000001"));
}

#[test]
#[serial(runtime_config)]
fn test_null_strings_are_tolerated() {
    let (dir, path) = capture_output();
    trace2pass_report_overflow(pc(0x7760_0000), ptr::null(), 1, 2);
    trace2pass_report_unreachable(pc(0x7760_0010), ptr::null());

    let text = read_back(&dir, &path);
    assert_eq!(text.matches("=== Trace2Pass Report ===").count(), 2);
}

#[test]
#[serial(runtime_config)]
fn test_should_sample_abi_is_boolean_int() {
    set_sample_rate(1.0);
    assert_eq!(trace2pass_should_sample(), 1);
    set_sample_rate(0.0);
    assert_eq!(trace2pass_should_sample(), 0);
    set_sample_rate(1.0);
}

#[test]
#[serial(runtime_config)]
fn test_init_and_fini_write_lifecycle_lines() {
    let (dir, path) = capture_output();
    trace2pass_init();
    trace2pass_fini();

    let text = read_back(&dir, &path);
    // Init happened before this test redirected the stream, so only the
    // shutdown line is expected here.
    assert!(text.contains("Trace2Pass: Runtime shutting down"));
}

#[test]
#[serial(runtime_config)]
fn test_report_ids_are_present_and_site_stable() {
    let (dir, path) = capture_output();
    let expr = CString::new("x - y").unwrap();
    trace2pass_report_overflow(pc(0x7770_0000), expr.as_ptr(), -5, 3);

    let text = read_back(&dir, &path);
    let call_site = text
        .lines()
        .find_map(|l| l.strip_prefix("Call-Site: "))
        .expect("call-site line");
    assert_eq!(call_site.len(), 8);
    assert!(text.lines().any(|l| l.starts_with("Report-ID: ")));
}
