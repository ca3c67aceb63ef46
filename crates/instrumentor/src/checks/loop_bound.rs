// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Loop iteration cap instrumentation
//!
//! Candidates are loop headers: blocks targeted by a back-edge under the
//! positional heuristic (a predecessor at or after the block in layout
//! order). Each header gets a 64-bit counter global incremented on entry;
//! when the counter transitions from the threshold to threshold + 1 the
//! sampling-guarded report path runs exactly once, because the equality
//! test can only hold on that transition.
//!
//! A forward branch misread as a back-edge costs at most a suppressed
//! report, never incorrect behavior.

use ir::{BinOp, BlockGraph, BlockId, CmpPred, FuncId, Inst, Module, Op, Value, WrapFlags};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::InstrumentResult;
use crate::probe::{ProbeBuilder, ENTRY_LOOP_BOUND};

/// Default iteration cap.
pub const DEFAULT_LOOP_THRESHOLD: u64 = 10_000_000;

pub struct LoopBoundPass {
    threshold: u64,
}

impl Default for LoopBoundPass {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOOP_THRESHOLD,
        }
    }
}

impl LoopBoundPass {
    /// A pass with a non-default iteration cap.
    pub fn with_threshold(threshold: u64) -> Self {
        Self { threshold }
    }
}

impl CheckPass for LoopBoundPass {
    fn name(&self) -> &'static str {
        "loop-bound"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let headers: Vec<BlockId> = BlockGraph::build(function).loop_headers();

        for &header in &headers {
            self.rewrite(module, func, header)?;
        }

        summarize(self.name(), module.function(func).name(), headers.len());
        Ok(headers.len())
    }
}

impl LoopBoundPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, header: BlockId) -> InstrumentResult<()> {
        let function_name = module.function(func).name().to_string();
        let label = module.function(func).block(header).label.clone();
        let counter = module.add_counter(format!("t2p.loop.{function_name}.{label}"));

        let function = module.function_mut(func);
        let load = function.insert_inst(
            header,
            0,
            Inst::new(Op::GlobalLoad { global: counter }, 64),
        );
        let bumped = function.insert_inst(
            header,
            1,
            Inst::new(
                Op::Binary {
                    op: BinOp::Add,
                    flags: WrapFlags::NONE,
                    lhs: Value::Inst(load),
                    rhs: Value::Const(1, 64),
                },
                64,
            ),
        );
        function.insert_inst(
            header,
            2,
            Inst::void(Op::GlobalStore {
                global: counter,
                value: Value::Inst(bumped),
            }),
        );
        // Fires only on the threshold -> threshold+1 transition.
        let crossing = function.insert_inst(
            header,
            3,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Eq,
                    lhs: Value::Inst(bumped),
                    rhs: Value::Const(self.threshold as i64 + 1, 64),
                },
                1,
            ),
        );

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(header, 4, Value::Inst(crossing))?;
        let loop_name = builder.interned_string(&format!("{function_name}:{label}"));
        builder.emit_report_call(
            site.report_block,
            ENTRY_LOOP_BOUND,
            &[
                loop_name,
                Value::Inst(bumped),
                Value::Const(self.threshold as i64, 64),
            ],
        )?;
        Ok(())
    }
}
