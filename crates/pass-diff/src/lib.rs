// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pass-diff harness
//!
//! Wraps a named optimization pass: snapshots the IR before and after the
//! pass runs, computes a structural hash, classifies the delta, and flags
//! suspicious transformations. Large instruction additions suggest code
//! bloat, large deletions over-aggressive dead-code elimination, and block
//! count swings point to CFG surgery.
//!
//! Snapshots and verdicts live within one pass invocation; the harness
//! keeps no state across functions.

pub mod harness;
pub mod snapshot;

pub use harness::{FunctionPass, Harness, Preserved};
pub use snapshot::{compare, DiffVerdict, Snapshot};
