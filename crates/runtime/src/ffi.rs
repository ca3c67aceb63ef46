// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! C-ABI entry points
//!
//! The symbols the probes link against, all with C linkage and stable
//! signatures. Every report entry runs the same pipeline: hash the site,
//! consult the calling thread's bloom filter, build the record, emit under
//! the process-wide mutex. The pure-consistency entry consults its
//! memoization table before dedup, so a first observation never burns the
//! site's one report.
//!
//! Null string pointers are treated as empty strings; the runtime is
//! infallible from the caller's perspective.

use std::ffi::CStr;

use libc::{c_char, c_void};

use crate::bloom;
use crate::config;
use crate::hash;
use crate::pure_cache::{self, Observation};
use crate::report::{CheckKind, Payload, Report};
use crate::sampling;
use crate::sink;

fn cstr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // Safety: non-null and NUL-terminated per the ABI contract.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn pc_value(pc: *const c_void) -> u64 {
    pc as usize as u64
}

/// Bloom step of the pipeline: true iff this is the thread's first event
/// for the site.
fn accept(pc: u64, kind: CheckKind) -> bool {
    bloom::first_occurrence(hash::hash_report(pc, kind.dedup_tag()))
}

fn deliver(kind: CheckKind, pc: u64, payload: Payload) {
    sink::emit(&Report::new(kind, pc, payload));
}

#[no_mangle]
pub extern "C" fn trace2pass_init() {
    config::initialize();
}

#[no_mangle]
pub extern "C" fn trace2pass_fini() {
    config::finalize();
}

#[no_mangle]
pub extern "C" fn trace2pass_set_sample_rate(rate: f64) {
    config::set_sample_rate(rate);
}

#[no_mangle]
pub extern "C" fn trace2pass_set_output_file(path: *const c_char) {
    config::set_output_file(&cstr(path));
}

#[no_mangle]
pub extern "C" fn trace2pass_set_collector_url(url: *const c_char) {
    config::set_collector_url(&cstr(url));
}

#[no_mangle]
pub extern "C" fn trace2pass_should_sample() -> i32 {
    sampling::should_sample() as i32
}

#[no_mangle]
pub extern "C" fn trace2pass_report_overflow(
    pc: *const c_void,
    expr: *const c_char,
    a: i64,
    b: i64,
) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::ArithmeticOverflow) {
        return;
    }
    deliver(
        CheckKind::ArithmeticOverflow,
        pc,
        Payload::Overflow {
            expression: cstr(expr),
            a,
            b,
        },
    );
}

#[no_mangle]
pub extern "C" fn trace2pass_report_sign_conversion(
    pc: *const c_void,
    original_value: i64,
    cast_value: u64,
    src_bits: u32,
    dst_bits: u32,
) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::SignConversion) {
        return;
    }
    deliver(
        CheckKind::SignConversion,
        pc,
        Payload::SignConversion {
            original: original_value,
            cast: cast_value,
            src_bits,
            dst_bits,
        },
    );
}

#[no_mangle]
pub extern "C" fn trace2pass_report_division_by_zero(
    pc: *const c_void,
    op_name: *const c_char,
    dividend: i64,
    divisor: i64,
) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::DivisionByZero) {
        return;
    }
    deliver(
        CheckKind::DivisionByZero,
        pc,
        Payload::DivisionByZero {
            operation: cstr(op_name),
            dividend,
            divisor,
        },
    );
}

#[no_mangle]
pub extern "C" fn trace2pass_check_pure_consistency(
    pc: *const c_void,
    func_name: *const c_char,
    arg0: i64,
    arg1: i64,
    result: i64,
) {
    config::initialize();
    let pc = pc_value(pc);
    let function = cstr(func_name);

    match pure_cache::observe(hash::hash_string(&function), arg0, arg1, result) {
        Observation::First | Observation::Consistent => {}
        Observation::Inconsistent { previous } => {
            if !accept(pc, CheckKind::PureInconsistency) {
                return;
            }
            deliver(
                CheckKind::PureInconsistency,
                pc,
                Payload::PureInconsistency {
                    function,
                    arg0,
                    arg1,
                    previous,
                    current: result,
                },
            );
        }
    }
}

#[no_mangle]
pub extern "C" fn trace2pass_report_bounds_violation(
    pc: *const c_void,
    ptr: *const c_void,
    offset: usize,
    size: usize,
) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::BoundsViolation) {
        return;
    }
    deliver(
        CheckKind::BoundsViolation,
        pc,
        Payload::BoundsViolation {
            pointer: ptr as usize as u64,
            // Negative indexes arrive wrapped in the unsigned parameter;
            // reinterpret so the record shows the signed offset.
            offset: offset as i64,
            size: size as u64,
        },
    );
}

#[no_mangle]
pub extern "C" fn trace2pass_report_unreachable(pc: *const c_void, message: *const c_char) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::UnreachableExecuted) {
        return;
    }
    deliver(
        CheckKind::UnreachableExecuted,
        pc,
        Payload::Unreachable {
            message: cstr(message),
        },
    );
}

#[no_mangle]
pub extern "C" fn trace2pass_report_loop_bound_exceeded(
    pc: *const c_void,
    loop_name: *const c_char,
    iteration_count: u64,
    threshold: u64,
) {
    config::initialize();
    let pc = pc_value(pc);
    if !accept(pc, CheckKind::LoopBoundExceeded) {
        return;
    }
    deliver(
        CheckKind::LoopBoundExceeded,
        pc,
        Payload::LoopBound {
            loop_name: cstr(loop_name),
            count: iteration_count,
            threshold,
        },
    );
}
