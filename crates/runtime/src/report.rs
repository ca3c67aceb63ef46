// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Report records
//!
//! One record per accepted event: identifiers, a second-resolution UTC
//! timestamp, and a kind-specific payload. The record renders two ways —
//! the human-readable stream form (banner, `key: value` lines, end banner)
//! and the collector JSON object. Fields unknown at this implementation
//! depth carry `"unknown"` / `0` sentinels the collector schema tolerates.

use chrono::Utc;
use serde_json::{json, Value as Json};

use crate::hash::{call_site_id, report_id};

/// The closed set of check kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    ArithmeticOverflow,
    SignConversion,
    DivisionByZero,
    PureInconsistency,
    BoundsViolation,
    UnreachableExecuted,
    LoopBoundExceeded,
}

impl CheckKind {
    /// Short tag mixed into dedup hashes and call-site ids.
    pub fn dedup_tag(self) -> &'static str {
        match self {
            CheckKind::ArithmeticOverflow => "overflow",
            CheckKind::SignConversion => "sign_conversion",
            CheckKind::DivisionByZero => "division_by_zero",
            CheckKind::PureInconsistency => "pure_inconsistency",
            CheckKind::BoundsViolation => "bounds_violation",
            CheckKind::UnreachableExecuted => "unreachable",
            CheckKind::LoopBoundExceeded => "loop_bound_exceeded",
        }
    }

    /// Wire name under the collector's `check_type` key.
    pub fn wire_name(self) -> &'static str {
        match self {
            CheckKind::ArithmeticOverflow => "arithmetic_overflow",
            CheckKind::SignConversion => "sign_conversion",
            CheckKind::DivisionByZero => "division_by_zero",
            CheckKind::PureInconsistency => "pure_function_inconsistency",
            CheckKind::BoundsViolation => "bounds_violation",
            CheckKind::UnreachableExecuted => "unreachable_code_executed",
            CheckKind::LoopBoundExceeded => "loop_bound_exceeded",
        }
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Overflow {
        expression: String,
        a: i64,
        b: i64,
    },
    SignConversion {
        original: i64,
        cast: u64,
        src_bits: u32,
        dst_bits: u32,
    },
    DivisionByZero {
        operation: String,
        dividend: i64,
        divisor: i64,
    },
    PureInconsistency {
        function: String,
        arg0: i64,
        arg1: i64,
        previous: i64,
        current: i64,
    },
    BoundsViolation {
        pointer: u64,
        offset: i64,
        size: u64,
    },
    Unreachable {
        message: String,
    },
    LoopBound {
        loop_name: String,
        count: u64,
        threshold: u64,
    },
}

/// One accepted event, ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub kind: CheckKind,
    pub pc: u64,
    pub call_site_id: String,
    pub report_id: String,
    /// ISO-8601 UTC, second resolution.
    pub timestamp: String,
    pub payload: Payload,
}

impl Report {
    pub fn new(kind: CheckKind, pc: u64, payload: Payload) -> Self {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let call_site = call_site_id(pc, kind.dedup_tag());
        let id = report_id(&call_site, &timestamp);
        Self {
            kind,
            pc,
            call_site_id: call_site,
            report_id: id,
            timestamp,
            payload,
        }
    }

    /// Human-readable stream form.
    pub fn to_stream_text(&self) -> String {
        let mut out = String::new();
        out.push_str("\n=== Trace2Pass Report ===\n");
        out.push_str(&format!("Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("Type: {}\n", self.kind.wire_name()));
        out.push_str(&format!("Report-ID: {}\n", self.report_id));
        out.push_str(&format!("Call-Site: {}\n", self.call_site_id));
        out.push_str(&format!("PC: 0x{:x}\n", self.pc));

        match &self.payload {
            Payload::Overflow { expression, a, b } => {
                out.push_str(&format!("Expression: {expression}\n"));
                out.push_str(&format!("Operands: {a}, {b}\n"));
            }
            Payload::SignConversion {
                original,
                cast,
                src_bits,
                dst_bits,
            } => {
                out.push_str(&format!("Original Value (signed i{src_bits}): {original}\n"));
                out.push_str(&format!(
                    "Cast Value (unsigned i{dst_bits}): {cast} (0x{cast:x})\n"
                ));
                out.push_str("Note: Negative signed value converted to unsigned\n");
            }
            Payload::DivisionByZero {
                operation,
                dividend,
                divisor,
            } => {
                out.push_str(&format!("Operation: {operation}\n"));
                out.push_str(&format!("Dividend: {dividend}\n"));
                out.push_str(&format!("Divisor: {divisor}\n"));
                out.push_str("Note: Division or modulo by zero detected\n");
            }
            Payload::PureInconsistency {
                function,
                arg0,
                arg1,
                previous,
                current,
            } => {
                out.push_str(&format!("Function: {function}\n"));
                out.push_str(&format!("Arg0: {arg0}\n"));
                out.push_str(&format!("Arg1: {arg1}\n"));
                out.push_str(&format!("Previous Result: {previous}\n"));
                out.push_str(&format!("Current Result: {current}\n"));
                out.push_str("Note: Pure function returned different results for same inputs\n");
            }
            Payload::BoundsViolation {
                pointer,
                offset,
                size,
            } => {
                out.push_str(&format!("Pointer: 0x{pointer:x}\n"));
                out.push_str(&format!("Offset: {offset}\n"));
                out.push_str(&format!("Size: {size}\n"));
            }
            Payload::Unreachable { message } => {
                out.push_str(&format!("Message: {message}\n"));
            }
            Payload::LoopBound {
                loop_name,
                count,
                threshold,
            } => {
                out.push_str(&format!("Loop: {loop_name}\n"));
                out.push_str(&format!("Iteration Count: {count}\n"));
                out.push_str(&format!("Threshold: {threshold}\n"));
                out.push_str("Note: Loop iterated more than expected maximum\n");
            }
        }

        out.push_str("========================\n\n");
        out
    }

    /// Collector JSON object.
    pub fn to_json(&self) -> Json {
        json!({
            "report_id": self.report_id,
            "timestamp": self.timestamp,
            "check_type": self.kind.wire_name(),
            "location": {
                "file": "unknown",
                "line": 0,
                "function": "unknown",
            },
            "pc": format!("0x{:x}", self.pc),
            "compiler": {
                "name": "unknown",
                "version": "unknown",
            },
            "build_info": {
                "optimization_level": "unknown",
            },
            "check_details": self.payload_json(),
        })
    }

    fn payload_json(&self) -> Json {
        match &self.payload {
            Payload::Overflow { expression, a, b } => json!({
                "expression": expression,
                "operand_a": a,
                "operand_b": b,
            }),
            Payload::SignConversion {
                original,
                cast,
                src_bits,
                dst_bits,
            } => json!({
                "original_value": original,
                "cast_value": cast,
                "src_bits": src_bits,
                "dst_bits": dst_bits,
            }),
            Payload::DivisionByZero {
                operation,
                dividend,
                divisor,
            } => json!({
                "operation": operation,
                "dividend": dividend,
                "divisor": divisor,
            }),
            Payload::PureInconsistency {
                function,
                arg0,
                arg1,
                previous,
                current,
            } => json!({
                "function": function,
                "arg0": arg0,
                "arg1": arg1,
                "previous_result": previous,
                "current_result": current,
            }),
            Payload::BoundsViolation {
                pointer,
                offset,
                size,
            } => json!({
                "pointer": format!("0x{:x}", pointer),
                "offset": offset,
                "size": size,
            }),
            Payload::Unreachable { message } => json!({
                "message": message,
            }),
            Payload::LoopBound {
                loop_name,
                count,
                threshold,
            } => json!({
                "loop_name": loop_name,
                "iteration_count": count,
                "threshold": threshold,
            }),
        }
    }
}
