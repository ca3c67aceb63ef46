// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pure-function consistency instrumentation
//!
//! Candidates are direct calls to callees declared as reading no memory (or
//! reading only), returning an integer, with at most two integer arguments.
//! The probe sits after the call and hands the runtime the callee name, the
//! widened arguments, and the observed result; the runtime decides whether
//! the observation is a new sample or a contradiction of a prior one.
//!
//! No sampling guard here: skipping first observations would starve the
//! runtime's memoization table, so every candidate call reports in.

use ir::{FuncId, InstId, Module, Op, Terminator, Value};

use crate::checks::{skip_function, summarize, CheckPass};
use crate::error::{InstrumentError, InstrumentResult};
use crate::probe::{ProbeBuilder, ENTRY_PURE_CONSISTENCY};

pub struct PureConsistencyPass;

impl CheckPass for PureConsistencyPass {
    fn name(&self) -> &'static str {
        "pure-consistency"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        let function = module.function(func);
        if skip_function(function.name()) {
            return Ok(0);
        }

        let mut candidates: Vec<InstId> = Vec::new();
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                if let Op::Call { callee, .. } = &function.inst(inst).op {
                    if is_candidate(module, callee) {
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

fn is_candidate(module: &Module, callee: &str) -> bool {
    if skip_function(callee) {
        return false;
    }
    let Some(decl) = module.extern_decl(callee) else {
        return false;
    };
    decl.effects.is_pure()
        && matches!(decl.ret, Some(w) if w > 0 && w <= 64)
        && decl.params.len() <= 2
        && decl.params.iter().all(|&w| w > 0 && w <= 64)
}

impl PureConsistencyPass {
    fn rewrite(&self, module: &mut Module, func: FuncId, inst: InstId) -> InstrumentResult<()> {
        let function = module.function_mut(func);
        let (callee, args) = match &function.inst(inst).op {
            Op::Call { callee, args } => (callee.clone(), args.clone()),
            _ => return Err(InstrumentError::CandidateVanished { inst: inst.0 }),
        };
        let (block, pos) = function
            .position_of(inst)
            .ok_or(InstrumentError::CandidateVanished { inst: inst.0 })?;

        // Split right after the call; the probe call and its widenings are
        // appended to the head, which falls through to the tail.
        let tail = function.split_block(block, pos + 1, "probe.cont");
        function.set_terminator(block, Terminator::Br(tail));

        let mut builder = ProbeBuilder::new(module, func);
        let name = builder.interned_string(&callee);
        let arg0 = match args.first() {
            Some(&v) => builder.sext_to_64(block, v)?,
            None => Value::Const(0, 64),
        };
        let arg1 = match args.get(1) {
            Some(&v) => builder.sext_to_64(block, v)?,
            None => Value::Const(0, 64),
        };
        let result = builder.sext_to_64(block, Value::Inst(inst))?;
        builder.emit_report_call(
            block,
            ENTRY_PURE_CONSISTENCY,
            &[name, arg0, arg1, result],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{ExternDecl, Function, Inst, MemoryEffects};

    fn call_function(effects: MemoryEffects, params: Vec<u32>, ret: Option<u32>) -> (Module, FuncId) {
        let mut module = Module::new("m");
        module.declare_extern(
            "lookup",
            ExternDecl {
                params: params.clone(),
                ret,
                effects,
            },
        );
        let mut f = Function::new("caller", vec![32, 32, 32]);
        let entry = f.entry();
        let args: Vec<Value> = (0..params.len() as u32).map(Value::Param).collect();
        let c = f.push_inst(
            entry,
            Inst::new(
                Op::Call {
                    callee: "lookup".to_string(),
                    args,
                },
                ret.unwrap_or(0),
            ),
        );
        f.set_terminator(entry, Terminator::Ret(Some(Value::Inst(c))));
        let func = module.add_function(f);
        (module, func)
    }

    #[test]
    fn test_pure_call_probed_after_call() {
        let (mut module, func) =
            call_function(MemoryEffects::None, vec![32, 32], Some(32));
        let count = PureConsistencyPass.instrument(&mut module, func).unwrap();
        assert_eq!(count, 1);

        let text = module.function(func).to_text();
        assert!(text.contains("call @lookup"));
        assert!(text.contains("call @trace2pass_check_pure_consistency"));
        // Call first, probe after: the probe consumes the call's result.
        let call_at = text.find("call @lookup").unwrap();
        let probe_at = text.find("call @trace2pass_check_pure_consistency").unwrap();
        assert!(call_at < probe_at);
    }

    #[test]
    fn test_readonly_callee_is_a_candidate() {
        let (mut module, func) =
            call_function(MemoryEffects::ReadOnly, vec![32], Some(32));
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 1);
    }

    #[test]
    fn test_impure_callee_skipped() {
        let (mut module, func) =
            call_function(MemoryEffects::Unknown, vec![32, 32], Some(32));
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 0);
    }

    #[test]
    fn test_void_callee_skipped() {
        let (mut module, func) = call_function(MemoryEffects::None, vec![32], None);
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 0);
    }

    #[test]
    fn test_three_argument_callee_skipped() {
        let (mut module, func) =
            call_function(MemoryEffects::None, vec![32, 32, 32], Some(32));
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 0);
    }

    #[test]
    fn test_undeclared_callee_skipped() {
        let mut module = Module::new("m");
        let mut f = Function::new("caller", vec![]);
        let entry = f.entry();
        f.push_inst(
            entry,
            Inst::new(
                Op::Call {
                    callee: "mystery".to_string(),
                    args: vec![],
                },
                32,
            ),
        );
        f.set_terminator(entry, Terminator::Ret(None));
        let func = module.add_function(f);
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 0);
    }

    #[test]
    fn test_zero_argument_callee_pads_with_zeros() {
        let (mut module, func) = call_function(MemoryEffects::None, vec![], Some(32));
        assert_eq!(PureConsistencyPass.instrument(&mut module, func).unwrap(), 1);
        let text = module.function(func).to_text();
        // Missing args become i64 0 sentinels in the payload.
        assert!(text.contains("i64 0, i64 0"));
    }
}
