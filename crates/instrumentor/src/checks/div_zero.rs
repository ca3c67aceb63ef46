// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Division-by-zero instrumentation
//!
//! Candidates are `sdiv`, `udiv`, `srem`, `urem`. The probe fires before
//! the dividing instruction; the instruction itself stays in place, so a
//! true division by zero still traps per platform ABI. The payload widens
//! operands to 64 bits preserving the opcode's signedness.

use ir::{CmpPred, FuncId, Inst, InstId, Module, Op, Value};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::{InstrumentError, InstrumentResult};
use crate::probe::{ProbeBuilder, ENTRY_DIVISION_BY_ZERO};

pub struct DivByZeroPass;

impl CheckPass for DivByZeroPass {
    fn name(&self) -> &'static str {
        "division-by-zero"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let mut candidates: Vec<InstId> = Vec::new();
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                if matches!(function.inst(inst).op, Op::Div { .. }) {
                    candidates.push(inst);
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

impl DivByZeroPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, inst: InstId) -> InstrumentResult<()> {
        let function = module.function_mut(func);
        let (op, dividend, divisor) = match function.inst(inst).op {
            Op::Div {
                op,
                dividend,
                divisor,
            } => (op, dividend, divisor),
            _ => return Err(InstrumentError::CandidateVanished { inst: inst.0 }),
        };
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;
        let divisor_width = function.value_width(divisor);

        let is_zero = function.insert_inst(
            block,
            pos,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Eq,
                    lhs: divisor,
                    rhs: Value::Const(0, divisor_width),
                },
                1,
            ),
        );

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(block, pos + 1, Value::Inst(is_zero))?;
        let op_name = builder.interned_string(op.name());
        let (a, b) = if op.is_signed() {
            (
                builder.sext_to_64(site.report_block, dividend)?,
                builder.sext_to_64(site.report_block, divisor)?,
            )
        } else {
            (
                builder.zext_to_64(site.report_block, dividend)?,
                builder.zext_to_64(site.report_block, divisor)?,
            )
        };
        builder.emit_report_call(site.report_block, ENTRY_DIVISION_BY_ZERO, &[op_name, a, b])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{DivOp, Function, Terminator};

    fn div_function(op: DivOp) -> (Module, FuncId) {
        let mut module = Module::new("m");
        let mut f = Function::new("div", vec![32, 32]);
        let entry = f.entry();
        let d = f.push_inst(
            entry,
            Inst::new(
                Op::Div {
                    op,
                    dividend: Value::Param(0),
                    divisor: Value::Param(1),
                },
                32,
            ),
        );
        f.set_terminator(entry, Terminator::Ret(Some(Value::Inst(d))));
        let func = module.add_function(f);
        (module, func)
    }

    #[test]
    fn test_sdiv_probe_placed_before_division() {
        let (mut module, func) = div_function(DivOp::Sdiv);
        let count = DivByZeroPass.instrument(&mut module, func).unwrap();
        assert_eq!(count, 1);

        let text = module.function(func).to_text();
        assert!(text.contains("icmp eq %p1, i32 0"));
        assert!(text.contains("call @trace2pass_report_division_by_zero"));
        // The division itself survives untouched.
        assert!(text.contains("sdiv %p0, %p1"));
        // Signed payload widening.
        assert!(text.contains("sext"));
    }

    #[test]
    fn test_udiv_widens_unsigned() {
        let (mut module, func) = div_function(DivOp::Udiv);
        DivByZeroPass.instrument(&mut module, func).unwrap();

        let text = module.function(func).to_text();
        assert!(text.contains("zext"));
        assert!(!text.contains("sext"));
    }

    #[test]
    fn test_all_four_opcodes_are_candidates() {
        for op in [DivOp::Sdiv, DivOp::Udiv, DivOp::Srem, DivOp::Urem] {
            let (mut module, func) = div_function(op);
            assert_eq!(DivByZeroPass.instrument(&mut module, func).unwrap(), 1);
        }
    }

    #[test]
    fn test_no_candidates_no_probes() {
        let mut module = Module::new("m");
        let mut f = Function::new("noop", vec![32]);
        f.set_terminator(f.entry(), Terminator::Ret(Some(Value::Param(0))));
        let func = module.add_function(f);
        assert_eq!(DivByZeroPass.instrument(&mut module, func).unwrap(), 0);
    }
}
