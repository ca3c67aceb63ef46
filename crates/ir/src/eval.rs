// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reference evaluator
//!
//! Interprets a function the way the instrumented target would execute it,
//! so tests can observe probe behavior end to end: value transparency,
//! zero-report safe runs, loop-counter transitions. Runtime entry points are
//! routed to a [`RuntimeHooks`] implementation instead of a linked library.
//!
//! Integer cells hold the value sign-extended into an `i64`; helpers
//! re-normalize after every operation. Shift amounts at or beyond the value
//! width are reduced modulo the width, which stands in for the target's
//! undefined shift consistently on both the probed and unprobed paths.

use std::collections::HashMap;

use thiserror::Error;

use crate::function::Function;
use crate::inst::{
    BinOp, CastKind, CmpPred, DivOp, GlobalId, InstId, Op, OverflowOp, PairField, Terminator,
    Value, Width,
};
use crate::module::{GlobalKind, Module};

/// Default bound on executed instructions per [`Evaluator::run`].
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Synthetic code base for return-address values; probes at distinct sites
/// observe distinct, stable program counters.
const PC_BASE: i64 = 0x4000_0000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("division by zero in function '{function}'")]
    DivideByZero { function: String },

    #[error("unreachable executed in function '{function}'")]
    UnreachableExecuted { function: String },

    #[error("step limit of {limit} instructions exceeded")]
    StepLimit { limit: u64 },

    #[error("call to undeclared function '{callee}'")]
    UndeclaredCallee { callee: String },

    #[error("argument count mismatch: function takes {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
}

pub type EvalResult<T> = Result<T, EvalError>;

/// A resolved argument handed to a runtime hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookArg {
    Int(i64),
    Str(String),
}

impl HookArg {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HookArg::Int(v) => Some(*v),
            HookArg::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HookArg::Int(_) => None,
            HookArg::Str(s) => Some(s),
        }
    }
}

/// Stand-in for the linked runtime library.
///
/// Calls to `trace2pass_should_sample` hit `should_sample`; calls to the
/// other `trace2pass_` entry points hit `report`; everything else (the
/// program's own external callees, e.g. pure functions) hits `call`.
pub trait RuntimeHooks {
    fn should_sample(&mut self) -> bool {
        true
    }

    fn report(&mut self, entry: &str, args: Vec<HookArg>);

    fn call(&mut self, callee: &str, args: &[i64]) -> i64 {
        let _ = (callee, args);
        0
    }
}

/// Hooks that record reports and sample everything; handy default for tests.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    pub reports: Vec<(String, Vec<HookArg>)>,
}

impl RuntimeHooks for RecordingHooks {
    fn report(&mut self, entry: &str, args: Vec<HookArg>) {
        self.reports.push((entry.to_string(), args));
    }
}

/// Evaluator over one module.
///
/// Counter globals persist across `run` calls on the same evaluator, giving
/// loop counters their process lifetime.
pub struct Evaluator<'m> {
    module: &'m Module,
    counters: HashMap<GlobalId, u64>,
    step_limit: u64,
}

impl<'m> Evaluator<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            counters: HashMap::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Execute a function with the given arguments.
    pub fn run(
        &mut self,
        function: &Function,
        args: &[i64],
        hooks: &mut dyn RuntimeHooks,
    ) -> EvalResult<Option<i64>> {
        if args.len() != function.params().len() {
            return Err(EvalError::ArgumentCount {
                expected: function.params().len(),
                actual: args.len(),
            });
        }

        let mut frame = Frame {
            values: HashMap::new(),
            flags: HashMap::new(),
            args: args.to_vec(),
        };
        let mut block = function.entry();
        let mut steps: u64 = 0;

        loop {
            let current = function.block(block);
            for &inst_id in &current.insts {
                steps += 1;
                if steps > self.step_limit {
                    return Err(EvalError::StepLimit {
                        limit: self.step_limit,
                    });
                }
                self.step(function, inst_id, &mut frame, hooks)?;
            }

            match &current.term {
                Terminator::Ret(v) => {
                    return Ok(v.map(|v| frame.read(function, v)));
                }
                Terminator::Br(dest) => block = *dest,
                Terminator::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                } => {
                    block = if frame.read(function, *cond) != 0 {
                        *then_dest
                    } else {
                        *else_dest
                    };
                }
                Terminator::Unreachable => {
                    return Err(EvalError::UnreachableExecuted {
                        function: function.name().to_string(),
                    });
                }
            }
        }
    }

    fn step(
        &mut self,
        function: &Function,
        inst_id: InstId,
        frame: &mut Frame,
        hooks: &mut dyn RuntimeHooks,
    ) -> EvalResult<()> {
        let inst = function.inst(inst_id);
        let width = inst.width;
        let result = match &inst.op {
            Op::Binary { op, lhs, rhs, .. } => {
                let a = frame.read(function, *lhs);
                let b = frame.read(function, *rhs);
                let raw = match op {
                    BinOp::Add => a.wrapping_add(b),
                    BinOp::Sub => a.wrapping_sub(b),
                    BinOp::Mul => a.wrapping_mul(b),
                    BinOp::Shl => {
                        let amt = (b as u64) % u64::from(width.max(1));
                        a.wrapping_shl(amt as u32)
                    }
                };
                sign_extend(raw, width)
            }
            Op::Div {
                op,
                dividend,
                divisor,
            } => {
                let a = frame.read(function, *dividend);
                let b = frame.read(function, *divisor);
                if b == 0 {
                    return Err(EvalError::DivideByZero {
                        function: function.name().to_string(),
                    });
                }
                let raw = match op {
                    DivOp::Sdiv => a.wrapping_div(b),
                    DivOp::Srem => a.wrapping_rem(b),
                    DivOp::Udiv => (unsigned(a, width) / unsigned(b, width)) as i64,
                    DivOp::Urem => (unsigned(a, width) % unsigned(b, width)) as i64,
                };
                sign_extend(raw, width)
            }
            Op::Cast {
                kind,
                value,
                from_bits,
                to_bits,
            } => {
                let v = frame.read(function, *value);
                let raw = match kind {
                    CastKind::Zext | CastKind::Bitcast => unsigned(v, *from_bits) as i64,
                    CastKind::Sext => sign_extend(v, *from_bits),
                    CastKind::Trunc => v,
                };
                sign_extend(raw, *to_bits)
            }
            Op::Gep { base, indices } => {
                // Abstract address arithmetic: base plus the index sum.
                let mut addr = frame.read(function, *base);
                for idx in indices {
                    addr = addr.wrapping_add(frame.read(function, *idx));
                }
                addr
            }
            Op::Call { callee, args } => self.dispatch_call(function, callee, args, frame, hooks)?,
            Op::CheckedBinary { op, lhs, rhs } => {
                let a = frame.read(function, *lhs);
                let b = frame.read(function, *rhs);
                let (value, overflowed) = checked(*op, a, b, function.value_width(*lhs));
                frame.pairs_insert(inst_id, value, overflowed);
                value
            }
            Op::Extract { pair, field } => {
                let (value, overflowed) = frame.pair(*pair);
                match field {
                    PairField::Result => value,
                    PairField::Overflowed => overflowed as i64,
                }
            }
            Op::Cmp { pred, lhs, rhs } => {
                let w = function.value_width(*lhs);
                let a = frame.read(function, *lhs);
                let b = frame.read(function, *rhs);
                let truth = match pred {
                    CmpPred::Eq => a == b,
                    CmpPred::Ne => a != b,
                    CmpPred::Slt => a < b,
                    CmpPred::Sge => a >= b,
                    CmpPred::Ult => unsigned(a, w) < unsigned(b, w),
                    CmpPred::Uge => unsigned(a, w) >= unsigned(b, w),
                };
                truth as i64
            }
            Op::ReturnAddress { .. } => PC_BASE + i64::from(inst_id.0) * 4,
            Op::GlobalLoad { global } => self.counter(*global) as i64,
            Op::GlobalStore { global, value } => {
                let v = frame.read(function, *value);
                self.counters.insert(*global, v as u64);
                0
            }
        };
        frame.values.insert(inst_id, result);
        Ok(())
    }

    fn dispatch_call(
        &mut self,
        function: &Function,
        callee: &str,
        args: &[Value],
        frame: &mut Frame,
        hooks: &mut dyn RuntimeHooks,
    ) -> EvalResult<i64> {
        if callee == "trace2pass_should_sample" {
            return Ok(hooks.should_sample() as i64);
        }
        if callee.starts_with("trace2pass_") {
            let resolved = args
                .iter()
                .map(|&a| self.resolve_hook_arg(function, a, frame))
                .collect();
            hooks.report(callee, resolved);
            return Ok(0);
        }
        if self.module.extern_decl(callee).is_none() {
            return Err(EvalError::UndeclaredCallee {
                callee: callee.to_string(),
            });
        }
        let ints: Vec<i64> = args.iter().map(|&a| frame.read(function, a)).collect();
        Ok(hooks.call(callee, &ints))
    }

    fn resolve_hook_arg(&self, function: &Function, arg: Value, frame: &Frame) -> HookArg {
        if let Value::Global(id) = arg {
            if let GlobalKind::Str(s) = &self.module.global(id).kind {
                return HookArg::Str(s.clone());
            }
        }
        HookArg::Int(frame.read(function, arg))
    }

    fn counter(&self, id: GlobalId) -> u64 {
        match self.counters.get(&id) {
            Some(&v) => v,
            None => match &self.module.global(id).kind {
                GlobalKind::Counter(init) => *init,
                GlobalKind::Str(_) => 0,
            },
        }
    }
}

struct Frame {
    values: HashMap<InstId, i64>,
    /// Overflow bits of checked-arithmetic pairs, keyed by the pair inst.
    flags: HashMap<InstId, bool>,
    args: Vec<i64>,
}

impl Frame {
    fn read(&self, function: &Function, v: Value) -> i64 {
        match v {
            Value::Const(c, w) => sign_extend(c, w),
            Value::Inst(id) => *self.values.get(&id).unwrap_or(&0),
            Value::Param(i) => sign_extend(
                self.args[i as usize],
                function.params()[i as usize],
            ),
            // Globals evaluate to a synthetic address tag.
            Value::Global(g) => 0x1000 + i64::from(g.0),
        }
    }

    fn pairs_insert(&mut self, id: InstId, value: i64, overflowed: bool) {
        // Pack the flag next to the value; Extract reads it back.
        self.values.insert(id, value);
        self.flags.insert(id, overflowed);
    }

    fn pair(&self, id: InstId) -> (i64, bool) {
        (
            *self.values.get(&id).unwrap_or(&0),
            *self.flags.get(&id).unwrap_or(&false),
        )
    }
}

/// Sign-extend the low `width` bits of `v` into an `i64`.
fn sign_extend(v: i64, width: Width) -> i64 {
    if width == 0 || width >= 64 {
        return v;
    }
    let shift = 64 - width;
    (v << shift) >> shift
}

/// The low `width` bits of `v` as an unsigned value.
fn unsigned(v: i64, width: Width) -> u64 {
    if width == 0 || width >= 64 {
        return v as u64;
    }
    (v as u64) & ((1u64 << width) - 1)
}

/// Checked arithmetic at an arbitrary width: wrapped result plus overflow bit.
fn checked(op: OverflowOp, a: i64, b: i64, width: Width) -> (i64, bool) {
    let wide = |v: i64| i128::from(v);
    let uwide = |v: i64| i128::from(unsigned(v, width));
    let (exact, signed) = match op {
        OverflowOp::Sadd => (wide(a) + wide(b), true),
        OverflowOp::Ssub => (wide(a) - wide(b), true),
        OverflowOp::Smul => (wide(a) * wide(b), true),
        OverflowOp::Uadd => (uwide(a) + uwide(b), false),
        OverflowOp::Usub => (uwide(a) - uwide(b), false),
        OverflowOp::Umul => (uwide(a) * uwide(b), false),
    };
    let w = width.min(64);
    let wrapped = sign_extend(exact as i64, w);
    let overflowed = if signed {
        let min = -(1i128 << (w - 1));
        let max = (1i128 << (w - 1)) - 1;
        exact < min || exact > max
    } else {
        exact < 0 || exact >= (1i128 << w)
    };
    (wrapped, overflowed)
}
