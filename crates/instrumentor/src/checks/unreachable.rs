// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unreachable-executed instrumentation
//!
//! Candidates are terminators marked unreachable. The terminator is replaced
//! with a branch into a sampling-guarded report block, which then branches
//! to a final block still carrying the unreachable. The program's
//! undefined-behavior semantics at that point are preserved; only the
//! crossing is recorded.

use ir::{BlockId, FuncId, Module, Terminator};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::InstrumentResult;
use crate::probe::{ProbeBuilder, ENTRY_UNREACHABLE};

pub struct UnreachablePass;

impl CheckPass for UnreachablePass {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let candidates: Vec<BlockId> = function
            .block_ids()
            .filter(|&b| function.block(b).term == Terminator::Unreachable)
            .collect();

        for &block in &candidates {
            self.rewrite(module, func, block)?;
        }

        summarize(self.name(), module.function(func).name(), candidates.len());
        Ok(candidates.len())
    }
}

impl UnreachablePass {
    fn rewrite(&self, module: &mut Module, func: FuncId, block: BlockId) -> InstrumentResult<()> {
        let function = module.function_mut(func);

        // Split at the end: the tail inherits the unreachable terminator and
        // becomes the final block the report path rejoins. Gate and report
        // are created first so probe-internal edges stay forward in layout
        // order.
        let gate = function.add_block("probe.sample");
        let report = function.add_block("probe.report");
        let len = function.block(block).insts.len();
        let final_block = function.split_block(block, len, "probe.cont");
        function.set_terminator(block, Terminator::Br(gate));

        let mut builder = ProbeBuilder::new(module, func);
        builder.sampling_gate(gate, report, final_block)?;
        let message = builder.interned_string("unreachable code executed");
        builder.emit_report_call(report, ENTRY_UNREACHABLE, &[message])?;
        Ok(())
    }
}
