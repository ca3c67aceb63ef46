// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The wrapping harness
//!
//! Snapshots a function before and after a wrapped optimization pass,
//! classifies the delta, and logs one line per changed function. The
//! wrapped pass's preserved-analyses report passes through verbatim, and
//! the harness never touches the function itself, so its presence cannot
//! alter optimization outcomes.

use tracing::{debug, info};

use ir::Function;

use crate::snapshot::{compare, DiffVerdict, Snapshot};

/// A pass's preserved-analyses report, relayed untouched by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preserved {
    All,
    None,
}

/// An optimization pass operating on one function at a time.
///
/// The passes themselves are host-supplied; this trait is the seam at which
/// the harness wraps them.
pub trait FunctionPass {
    fn name(&self) -> &str;

    fn run(&mut self, function: &mut Function) -> Preserved;
}

/// Diff harness around one named optimization pass.
pub struct Harness {
    pass: Box<dyn FunctionPass + Send>,
}

impl Harness {
    pub fn new(pass: Box<dyn FunctionPass + Send>) -> Self {
        Self { pass }
    }

    pub fn pass_name(&self) -> &str {
        self.pass.name()
    }

    /// Run the wrapped pass on `function`, diff the surrounding snapshots,
    /// and return the pass's own report alongside the verdict.
    pub fn run(&mut self, function: &mut Function) -> (Preserved, DiffVerdict) {
        let before = Snapshot::capture(function);
        let preserved = self.pass.run(function);
        let after = Snapshot::capture(function);

        let verdict = compare(&before, &after);
        if verdict.changed {
            let marker = if verdict.suspicious { " SUSPICIOUS" } else { "" };
            info!(
                "[Trace2Pass] {}: {}{}",
                function.name(),
                verdict.reason,
                marker
            );
            debug!(
                "[Trace2Pass] {}: hash {} -> {}",
                function.name(),
                before.structural_hash,
                after.structural_hash
            );
        }

        (preserved, verdict)
    }
}
