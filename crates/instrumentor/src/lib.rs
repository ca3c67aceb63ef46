// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Compile-time instrumentation for latent optimizer-bug detection
//!
//! This crate rewrites a module's IR to insert predicated runtime checks at
//! the sites where optimizer-introduced miscompilations historically show
//! up: arithmetic overflow, out-of-range shifts, division by zero,
//! sign-losing casts, negative aggregate indexing, reached-unreachable
//! terminators, pure-call result drift, and runaway loops.
//!
//! # Overview
//!
//! - [`probe`]: the shared probe-building primitives (split, sampling
//!   guard, report call, string interning)
//! - [`checks`]: one instrumentor per check kind plus the master pass
//! - [`registry`]: the plug-in surface the host pipeline activates passes
//!   through, including diff-harness wrappers for named host passes
//!
//! Probes call into the runtime library's `trace2pass_` entry points; the
//! non-probing path keeps the original program's observable results, with
//! overflow checks returning the wrapped result to all downstream users.
//!
//! Malformed input (an out-of-range split, a non-boolean guard, a payload
//! that does not match an entry point's schema) is a programmer error and
//! aborts the compilation via [`InstrumentError`] rather than producing
//! unchecked code.

pub mod checks;
pub mod error;
pub mod probe;
pub mod registry;

pub use checks::{
    ArithOverflowPass, BoundsPass, CheckPass, DivByZeroPass, LoopBoundPass, PureConsistencyPass,
    SignConversionPass, Trace2PassInstrumentor, UnreachablePass, DEFAULT_LOOP_THRESHOLD,
};
pub use error::{InstrumentError, InstrumentResult};
pub use probe::{ProbeBuilder, ProbeSite};
pub use registry::{default_registry, PassRegistry};

use ir::Module;

/// Run the master instrumentor over every function of a module.
///
/// Convenience wrapper around [`Trace2PassInstrumentor`]; returns the total
/// probe count.
pub fn instrument_module(module: &mut Module) -> InstrumentResult<usize> {
    let master = Trace2PassInstrumentor::default();
    let mut total = 0;
    for func in module.func_ids().collect::<Vec<_>>() {
        total += master.instrument(module, func)?;
    }
    Ok(total)
}
