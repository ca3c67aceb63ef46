// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sign-conversion instrumentation
//!
//! Candidates are zero-extensions from a strictly narrower source and
//! same-width bit reinterpretations: the places where user code treats a
//! signed source as unsigned. The probe fires only when the original source
//! value is negative, and sits after the cast so downstream consumers see
//! the cast result unchanged.

use ir::{CastKind, CmpPred, FuncId, Inst, InstId, Module, Op, Value, Width};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::{InstrumentError, InstrumentResult};
use crate::probe::{ProbeBuilder, ENTRY_SIGN_CONVERSION};

pub struct SignConversionPass;

impl CheckPass for SignConversionPass {
    fn name(&self) -> &'static str {
        "sign-conversion"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let mut candidates: Vec<InstId> = Vec::new();
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                if let Op::Cast {
                    kind,
                    from_bits,
                    to_bits,
                    ..
                } = function.inst(inst).op
                {
                    if is_candidate(kind, from_bits, to_bits) {
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

fn is_candidate(kind: CastKind, from_bits: Width, to_bits: Width) -> bool {
    match kind {
        CastKind::Zext => from_bits < to_bits,
        CastKind::Bitcast => from_bits == to_bits,
        CastKind::Sext | CastKind::Trunc => false,
    }
}

impl SignConversionPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, inst: InstId) -> InstrumentResult<()> {
        let function = module.function_mut(func);
        let (source, from_bits, to_bits) = match function.inst(inst).op {
            Op::Cast {
                value,
                from_bits,
                to_bits,
                ..
            } => (value, from_bits, to_bits),
            _ => return Err(InstrumentError::CandidateVanished { inst: inst.0 }),
        };
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;

        // Guarded on the original source being negative; placed after the
        // cast so its result flows on unchanged.
        let negative = function.insert_inst(
            block,
            pos + 1,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Slt,
                    lhs: source,
                    rhs: Value::Const(0, from_bits),
                },
                1,
            ),
        );

        let mut builder = ProbeBuilder::new(module, func);
        let site = builder.guard_with_sampling(block, pos + 2, Value::Inst(negative))?;
        let orig = builder.sext_to_64(site.report_block, source)?;
        let cast = builder.zext_to_64(site.report_block, Value::Inst(inst))?;
        builder.emit_report_call(
            site.report_block,
            ENTRY_SIGN_CONVERSION,
            &[
                orig,
                cast,
                Value::Const(i64::from(from_bits), 32),
                Value::Const(i64::from(to_bits), 32),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{Function, Terminator};

    fn cast_function(kind: CastKind, from: Width, to: Width) -> (Module, FuncId) {
        let mut module = Module::new("m");
        let mut f = Function::new("cast", vec![from]);
        let entry = f.entry();
        let c = f.push_inst(
            entry,
            Inst::new(
                Op::Cast {
                    kind,
                    value: Value::Param(0),
                    from_bits: from,
                    to_bits: to,
                },
                to,
            ),
        );
        f.set_terminator(entry, Terminator::Ret(Some(Value::Inst(c))));
        let func = module.add_function(f);
        (module, func)
    }

    #[test]
    fn test_widening_zext_is_instrumented() {
        let (mut module, func) = cast_function(CastKind::Zext, 32, 64);
        let count = SignConversionPass.instrument(&mut module, func).unwrap();
        assert_eq!(count, 1);

        let text = module.function(func).to_text();
        assert!(text.contains("icmp slt %p0, i32 0"));
        assert!(text.contains("call @trace2pass_report_sign_conversion"));
        // Width payload constants.
        assert!(text.contains("i32 32, i32 64"));
    }

    #[test]
    fn test_same_width_bitcast_is_instrumented() {
        let (mut module, func) = cast_function(CastKind::Bitcast, 32, 32);
        assert_eq!(SignConversionPass.instrument(&mut module, func).unwrap(), 1);
    }

    #[test]
    fn test_sext_and_trunc_are_not_candidates() {
        let (mut module, func) = cast_function(CastKind::Sext, 32, 64);
        assert_eq!(SignConversionPass.instrument(&mut module, func).unwrap(), 0);

        let (mut module, func) = cast_function(CastKind::Trunc, 64, 32);
        assert_eq!(SignConversionPass.instrument(&mut module, func).unwrap(), 0);
    }

    #[test]
    fn test_same_width_zext_is_not_a_candidate() {
        // Width must strictly grow for the zext form.
        let (mut module, func) = cast_function(CastKind::Zext, 32, 32);
        assert_eq!(SignConversionPass.instrument(&mut module, func).unwrap(), 0);
    }
}
