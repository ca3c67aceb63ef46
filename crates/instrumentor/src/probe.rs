// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probe building primitives
//!
//! Shared by every check instrumentor. Each primitive takes an insertion
//! point in an existing block and produces the control-flow shape of a
//! probe: a guard branch, an optional sampling gate, a report block, and a
//! resume block carrying the original tail of the split block.
//!
//! The builder never alters the non-probing path's observable results: the
//! resume block receives the original instructions and terminator verbatim,
//! and report blocks only append calls into the runtime.
//!
//! Probe shape produced by [`ProbeBuilder::guard_with_sampling`]:
//!
//! ```text
//! head:                 ; original block up to the insertion point
//!   br %cond, %sample, %resume
//! sample:
//!   %s = call @trace2pass_should_sample()
//!   %t = icmp ne %s, 0
//!   br %t, %report, %resume
//! report:               ; caller appends payload + report call
//!   br %resume
//! resume:               ; original tail, terminator unchanged
//! ```

use ir::{
    BlockId, CastKind, CmpPred, ExternDecl, FuncId, Inst, MemoryEffects, Module, Op, Terminator,
    Value, Width,
};

use crate::error::{InstrumentError, InstrumentResult};

/// Runtime entry point symbols.
pub const ENTRY_OVERFLOW: &str = "trace2pass_report_overflow";
pub const ENTRY_SIGN_CONVERSION: &str = "trace2pass_report_sign_conversion";
pub const ENTRY_DIVISION_BY_ZERO: &str = "trace2pass_report_division_by_zero";
pub const ENTRY_PURE_CONSISTENCY: &str = "trace2pass_check_pure_consistency";
pub const ENTRY_BOUNDS_VIOLATION: &str = "trace2pass_report_bounds_violation";
pub const ENTRY_UNREACHABLE: &str = "trace2pass_report_unreachable";
pub const ENTRY_LOOP_BOUND: &str = "trace2pass_report_loop_bound_exceeded";
pub const ENTRY_SHOULD_SAMPLE: &str = "trace2pass_should_sample";

/// Trailing payload schema per entry point: operand widths after the leading
/// program-counter argument, plus the return width.
const ENTRY_SCHEMAS: &[(&str, &[Width], Option<Width>)] = &[
    (ENTRY_OVERFLOW, &[64, 64, 64], None),
    (ENTRY_SIGN_CONVERSION, &[64, 64, 32, 32], None),
    (ENTRY_DIVISION_BY_ZERO, &[64, 64, 64], None),
    (ENTRY_PURE_CONSISTENCY, &[64, 64, 64, 64], None),
    (ENTRY_BOUNDS_VIOLATION, &[64, 64, 64], None),
    (ENTRY_UNREACHABLE, &[64], None),
    (ENTRY_LOOP_BOUND, &[64, 64, 64], None),
];

fn entry_schema(entry: &str) -> Option<(&'static str, &'static [Width])> {
    ENTRY_SCHEMAS
        .iter()
        .find(|(name, _, _)| *name == entry)
        .map(|(name, params, _)| (*name, *params))
}

/// Blocks produced by splitting a probe into a function.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSite {
    /// Block entered when the probe fires; pre-sealed with a branch to
    /// `resume_block`, so callers only append payload and report calls.
    pub report_block: BlockId,
    /// Block carrying the original tail; execution continues here on both
    /// the probing and non-probing paths.
    pub resume_block: BlockId,
}

/// Probe builder over one function of a module.
pub struct ProbeBuilder<'m> {
    module: &'m mut Module,
    func: FuncId,
}

impl<'m> ProbeBuilder<'m> {
    pub fn new(module: &'m mut Module, func: FuncId) -> Self {
        Self { module, func }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    fn function(&self) -> &ir::Function {
        self.module.function(self.func)
    }

    fn function_mut(&mut self) -> &mut ir::Function {
        self.module.function_mut(self.func)
    }

    /// Split `block` before position `at` and branch to a fresh probe block
    /// when `cond` holds; fall through to the tail otherwise. The probe
    /// block rejoins the tail.
    pub fn split_and_branch_if(
        &mut self,
        block: BlockId,
        at: usize,
        cond: Value,
    ) -> InstrumentResult<ProbeSite> {
        self.check_split(block, at)?;
        self.check_guard(cond)?;

        // Block creation order matters: every probe-internal edge must point
        // forward in layout order, or the positional back-edge heuristic
        // would read probe blocks as loop headers.
        let f = self.function_mut();
        let report = f.add_block("probe.report");
        let resume = f.split_block(block, at, "probe.cont");
        f.set_terminator(
            block,
            Terminator::CondBr {
                cond,
                then_dest: report,
                else_dest: resume,
            },
        );
        f.set_terminator(report, Terminator::Br(resume));
        Ok(ProbeSite {
            report_block: report,
            resume_block: resume,
        })
    }

    /// Two-level guard: `cond` first, then the sampling oracle. The cost of
    /// a suppressed event is one conditional plus one untaken call.
    pub fn guard_with_sampling(
        &mut self,
        block: BlockId,
        at: usize,
        cond: Value,
    ) -> InstrumentResult<ProbeSite> {
        self.check_split(block, at)?;
        self.check_guard(cond)?;

        // Creation order keeps all probe-internal edges forward in layout
        // order; see `split_and_branch_if`.
        let f = self.function_mut();
        let sample = f.add_block("probe.sample");
        let report = f.add_block("probe.report");
        let resume = f.split_block(block, at, "probe.cont");
        f.set_terminator(
            block,
            Terminator::CondBr {
                cond,
                then_dest: sample,
                else_dest: resume,
            },
        );
        self.sampling_gate(sample, report, resume)?;
        Ok(ProbeSite {
            report_block: report,
            resume_block: resume,
        })
    }

    /// Fill `gate` with a sampling-oracle call branching to `report` on a
    /// positive draw and to `resume` otherwise; `report` is sealed with a
    /// branch to `resume`. The caller is responsible for creating `report`
    /// before `resume` in layout order.
    pub fn sampling_gate(
        &mut self,
        gate: BlockId,
        report: BlockId,
        resume: BlockId,
    ) -> InstrumentResult<()> {
        self.module.declare_extern(
            ENTRY_SHOULD_SAMPLE,
            ExternDecl {
                params: vec![],
                ret: Some(32),
                effects: MemoryEffects::Unknown,
            },
        );
        let f = self.function_mut();
        let draw = f.push_inst(
            gate,
            Inst::new(
                Op::Call {
                    callee: ENTRY_SHOULD_SAMPLE.to_string(),
                    args: vec![],
                },
                32,
            ),
        );
        let taken = f.push_inst(
            gate,
            Inst::new(
                Op::Cmp {
                    pred: CmpPred::Ne,
                    lhs: Value::Inst(draw),
                    rhs: Value::Const(0, 32),
                },
                1,
            ),
        );
        f.set_terminator(
            gate,
            Terminator::CondBr {
                cond: Value::Inst(taken),
                then_dest: report,
                else_dest: resume,
            },
        );
        f.set_terminator(report, Terminator::Br(resume));
        Ok(())
    }

    /// Declare the runtime entry point for `entry` (once per module) and
    /// append a call to it in `block`, with the program counter from the
    /// return-address intrinsic at depth 0 prepended to `payload`.
    pub fn emit_report_call(
        &mut self,
        block: BlockId,
        entry: &str,
        payload: &[Value],
    ) -> InstrumentResult<()> {
        let (name, schema) = entry_schema(entry).ok_or_else(|| InstrumentError::UnknownEntry {
            entry: entry.to_string(),
        })?;
        if payload.len() != schema.len() {
            return Err(InstrumentError::PayloadArity {
                entry: name,
                expected: schema.len(),
                actual: payload.len(),
            });
        }
        for (index, (&value, &expected)) in payload.iter().zip(schema).enumerate() {
            let actual = self.function().value_width(value);
            if actual != expected {
                return Err(InstrumentError::PayloadWidth {
                    entry: name,
                    index,
                    actual,
                    expected,
                });
            }
        }

        let mut params = vec![64];
        params.extend_from_slice(schema);
        self.module.declare_extern(
            name,
            ExternDecl {
                params,
                ret: None,
                effects: MemoryEffects::Unknown,
            },
        );

        let f = self.function_mut();
        let pc = f.push_inst(block, Inst::new(Op::ReturnAddress { depth: 0 }, 64));
        let mut args = vec![Value::Inst(pc)];
        args.extend_from_slice(payload);
        f.push_inst(
            block,
            Inst::void(Op::Call {
                callee: name.to_string(),
                args,
            }),
        );
        Ok(())
    }

    /// Create-or-reuse a read-only constant for a short identifier string.
    pub fn interned_string(&mut self, s: &str) -> Value {
        Value::Global(self.module.intern_string(s))
    }

    /// Append a sign-extension of `v` to 64 bits in `block`; no-op for
    /// values already 64 bits wide.
    pub fn sext_to_64(&mut self, block: BlockId, v: Value) -> InstrumentResult<Value> {
        self.widen(block, v, CastKind::Sext)
    }

    /// Append a zero-extension of `v` to 64 bits in `block`.
    pub fn zext_to_64(&mut self, block: BlockId, v: Value) -> InstrumentResult<Value> {
        self.widen(block, v, CastKind::Zext)
    }

    fn widen(&mut self, block: BlockId, v: Value, kind: CastKind) -> InstrumentResult<Value> {
        let from = self.function().value_width(v);
        if from == 64 {
            return Ok(v);
        }
        if from > 64 {
            return Err(InstrumentError::WidenNarrows { from, to: 64 });
        }
        let f = self.function_mut();
        let cast = f.push_inst(
            block,
            Inst::new(
                Op::Cast {
                    kind,
                    value: v,
                    from_bits: from,
                    to_bits: 64,
                },
                64,
            ),
        );
        Ok(Value::Inst(cast))
    }

    fn check_split(&self, block: BlockId, at: usize) -> InstrumentResult<()> {
        let b = self.function().block(block);
        if at > b.insts.len() {
            return Err(InstrumentError::SplitOutOfRange {
                block: b.label.clone(),
                at,
                len: b.insts.len(),
            });
        }
        Ok(())
    }

    fn check_guard(&self, cond: Value) -> InstrumentResult<()> {
        let width = self.function().value_width(cond);
        if width != 1 {
            return Err(InstrumentError::GuardNotBool { width });
        }
        Ok(())
    }
}
