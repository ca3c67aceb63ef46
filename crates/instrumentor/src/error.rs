// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for instrumentation.
//!
//! Every variant here is a programmer error inside the instrumentor or a
//! malformed input module. There is no recovery path: the pipeline driver
//! aborts the compilation rather than emit unchecked code.

use ir::Width;
use thiserror::Error;

/// Result type alias for instrumentation operations.
pub type InstrumentResult<T> = Result<T, InstrumentError>;

/// Errors that can occur while inserting probes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstrumentError {
    #[error("split position {at} out of range in block '{block}' ({len} instructions)")]
    SplitOutOfRange {
        block: String,
        at: usize,
        len: usize,
    },

    #[error("guard condition must be i1, got i{width}")]
    GuardNotBool { width: Width },

    #[error("unknown runtime entry point '{entry}'")]
    UnknownEntry { entry: String },

    #[error("payload arity mismatch for {entry}: expected {expected}, got {actual}")]
    PayloadArity {
        entry: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("payload operand {index} for {entry} has width i{actual}, expected i{expected}")]
    PayloadWidth {
        entry: &'static str,
        index: usize,
        actual: Width,
        expected: Width,
    },

    #[error("cannot widen i{from} to i{to}")]
    WidenNarrows { from: Width, to: Width },

    #[error("candidate instruction %{inst} vanished before rewrite")]
    CandidateVanished { inst: u32 },

    #[error("overflow check has no checked opcode for '{op}'")]
    NoCheckedOpcode { op: &'static str },
}
