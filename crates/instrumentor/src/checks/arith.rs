// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Arithmetic overflow instrumentation
//!
//! Candidates are integer `add`, `sub`, `mul`, and logical left shift. The
//! wrap flags on the operation select signed or unsigned overflow semantics;
//! with no flags present the check defaults to signed.
//!
//! Add/sub/mul are rewritten onto the target's checked-arithmetic primitive:
//! the probe guards the overflow bit and every user of the original
//! instruction is redirected to the wrapped result, so downstream values are
//! bit-identical to the unchecked operation. The original instruction goes
//! dead and is left for downstream cleanup.
//!
//! Shift has no checked primitive; its predicate is `shift_amount >=
//! bitwidth(value)`, and the violating path keeps whatever the target's
//! undefined shift produces.

use ir::{
    BinOp, CmpPred, FuncId, Inst, InstId, Module, Op, OverflowOp, PairField, Value, WrapFlags,
};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::{InstrumentError, InstrumentResult};
use crate::probe::{ProbeBuilder, ENTRY_OVERFLOW};

pub struct ArithOverflowPass;

impl CheckPass for ArithOverflowPass {
    fn name(&self) -> &'static str {
        "arith-overflow"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        // Collect first; rewriting splits blocks under the traversal.
        let mut candidates: Vec<InstId> = Vec::new();
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                if let Op::Binary { .. } = function.inst(inst).op {
                    if function.inst(inst).width > 0 {
                        candidates.push(inst);
                    }
                }
            }
        }

        for &inst in &candidates {
            self.rewrite(module, func, inst)?;
        }

        summarize(self.name(), module.function(func).name(), candidates.len());
        Ok(candidates.len())
    }
}

impl ArithOverflowPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, inst: InstId) -> InstrumentResult<()> {
        let function = module.function(func);
        let (op, flags, lhs, rhs) = match function.inst(inst).op {
            Op::Binary {
                op,
                flags,
                lhs,
                rhs,
            } => (op, flags, lhs, rhs),
            _ => return Err(InstrumentError::CandidateVanished { inst: inst.0 }),
        };
        match op {
            BinOp::Shl => self.rewrite_shift(module, func, inst, lhs, rhs),
            _ => self.rewrite_checked(module, func, inst, op, flags, lhs, rhs),
        }
    }

    /// Rewrite add/sub/mul onto the checked primitive and guard its
    /// overflow bit.
    #[allow(clippy::too_many_arguments)]
    fn rewrite_checked(
        &self,
        module: &mut Module,
        func: FuncId,
        inst: InstId,
        op: BinOp,
        flags: WrapFlags,
        lhs: Value,
        rhs: Value,
    ) -> InstrumentResult<()> {
        // nuw selects unsigned; nsw or no flags select signed.
        let signed = !flags.nuw;
        let checked_op = OverflowOp::for_bin_op(op, signed)
            .ok_or(InstrumentError::NoCheckedOpcode { op: op.name() })?;

        let function = module.function_mut(func);
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;
        let width = function.inst(inst).width;

        let pair = function.insert_inst(
            block,
            pos,
            Inst::new(
                Op::CheckedBinary {
                    op: checked_op,
                    lhs,
                    rhs,
                },
                width,
            ),
        );
        let result = function.insert_inst(
            block,
            pos + 1,
            Inst::new(
                Op::Extract {
                    pair,
                    field: PairField::Result,
                },
                width,
            ),
        );
        let overflowed = function.insert_inst(
            block,
            pos + 2,
            Inst::new(
                Op::Extract {
                    pair,
                    field: PairField::Overflowed,
                },
                1,
            ),
        );
        // All users see the wrapped result; the original goes dead in the
        // resume block.
        function.replace_uses(inst, Value::Inst(result));

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(block, pos + 3, Value::Inst(overflowed))?;
        let expr = builder.interned_string(expression_for(op));
        let a = builder.sext_to_64(site.report_block, lhs)?;
        let b = builder.sext_to_64(site.report_block, rhs)?;
        builder.emit_report_call(site.report_block, ENTRY_OVERFLOW, &[expr, a, b])?;
        Ok(())
    }

    /// Guard a shift whose amount reaches the value's bit width.
    fn rewrite_shift(
        &self,
        module: &mut Module,
        func: FuncId,
        inst: InstId,
        lhs: Value,
        rhs: Value,
    ) -> InstrumentResult<()> {
        let function = module.function_mut(func);
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;
        let width = function.inst(inst).width;
        let amount_width = function.value_width(rhs);

        let oob = function.insert_inst(
            block,
            pos,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Uge,
                    lhs: rhs,
                    rhs: Value::Const(i64::from(width), amount_width),
                },
                1,
            ),
        );

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(block, pos + 1, Value::Inst(oob))?;
        let expr = builder.interned_string("x << y");
        let a = builder.sext_to_64(site.report_block, lhs)?;
        let b = builder.sext_to_64(site.report_block, rhs)?;
        builder.emit_report_call(site.report_block, ENTRY_OVERFLOW, &[expr, a, b])?;
        Ok(())
    }
}

fn expression_for(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "x + y",
        BinOp::Sub => "x - y",
        BinOp::Mul => "x * y",
        BinOp::Shl => "x << y",
    }
}
