// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounds-violation instrumentation
//!
//! Candidates are address computations with more than one index: those
//! indexing into an aggregate beyond the outermost pointer. Static array
//! bounds are not generally recoverable from the IR, so the claimed size in
//! the payload is zero ("unknown") and only under-the-bottom access (a
//! strictly negative last index) is detected. The probe fires before the
//! address computation so the reporting path still sees the originating
//! pointer.

use ir::{CmpPred, FuncId, Inst, InstId, Module, Op, Value};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::{InstrumentError, InstrumentResult};
use crate::probe::{ProbeBuilder, ENTRY_BOUNDS_VIOLATION};

pub struct BoundsPass;

impl CheckPass for BoundsPass {
    fn name(&self) -> &'static str {
        "bounds-violation"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let mut candidates: Vec<InstId> = Vec::new();
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                if let Op::Gep { indices, .. } = &function.inst(inst).op {
                    if indices.len() > 1 {
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

impl BoundsPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, inst: InstId) -> InstrumentResult<()> {
        let function = module.function_mut(func);
        let (base, last) = match &function.inst(inst).op {
            Op::Gep { base, indices } => (
                *base,
                *indices
                    .last()
                    .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?,
            ),
            _ => return Err(InstrumentError::CandidateVanished { inst: inst.0 }),
        };
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;
        let index_width = function.value_width(last);

        let negative = function.insert_inst(
            block,
            pos,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Slt,
                    lhs: last,
                    rhs: Value::Const(0, index_width),
                },
                1,
            ),
        );

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(block, pos + 1, Value::Inst(negative))?;
        let ptr = builder.zext_to_64(site.report_block, base)?;
        let offset = builder.sext_to_64(site.report_block, last)?;
        builder.emit_report_call(
            site.report_block,
            ENTRY_BOUNDS_VIOLATION,
            &[ptr, offset, Value::Const(0, 64)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Function, Terminator};

    fn gep_function(index_count: usize) -> (Module, FuncId) {
        let mut module = Module::new("m");
        let mut f = Function::new("index", vec![64, 32]);
        let entry = f.entry();
        let indices = match index_count {
            1 => vec![Value::Param(1)],
            _ => vec![Value::Const(0, 64), Value::Param(1)],
        };
        let g = f.push_inst(
            entry,
            Inst::new(
                Op::Gep {
                    base: Value::Param(0),
                    indices,
                },
                64,
            ),
        );
        f.set_terminator(entry, Terminator::Ret(Some(Value::Inst(g))));
        let func = module.add_function(f);
        (module, func)
    }

    #[test]
    fn test_multi_index_gep_instrumented() {
        let (mut module, func) = gep_function(2);
        let count = BoundsPass.instrument(&mut module, func).unwrap();
        assert_eq!(count, 1);

        let text = module.function(func).to_text();
        // Predicate on the last index being negative.
        assert!(text.contains("icmp slt %p1, i32 0"));
        assert!(text.contains("call @trace2pass_report_bounds_violation"));
        // Claimed size is the "unknown" sentinel.
        assert!(text.contains("i64 0)"));
        // The address computation itself is untouched.
        assert!(text.contains("gep %p0"));
    }

    #[test]
    fn test_single_index_gep_is_not_a_candidate() {
        let (mut module, func) = gep_function(1);
        assert_eq!(BoundsPass.instrument(&mut module, func).unwrap(), 0);
    }
}
