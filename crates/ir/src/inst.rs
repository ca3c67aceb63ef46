// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Instruction and value model
//!
//! Instructions live in a per-function arena and are referenced by [`InstId`].
//! Operands are [`Value`]s: constants, instruction results, function
//! parameters, or addresses of module globals. Every instruction records the
//! bit width of its result (0 for void).

/// Bit width of an integer value.
pub type Width = u32;

/// Index of an instruction in its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

/// Index of a basic block within its function, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Index of a global (interned string or loop counter) in its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

/// An operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Integer constant with its bit width. The payload is the
    /// two's-complement representation, sign-extended into an `i64`.
    Const(i64, Width),
    /// Result of an instruction.
    Inst(InstId),
    /// Function parameter by index.
    Param(u32),
    /// Address of a module global.
    Global(GlobalId),
}

impl Value {
    /// Shorthand for a boolean (`i1`) constant.
    pub fn bool(v: bool) -> Self {
        Value::Const(v as i64, 1)
    }
}

/// Plain two-operand integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Logical left shift.
    Shl,
}

impl BinOp {
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Shl => "shl",
        }
    }
}

/// Wrap flags carried by arithmetic instructions.
///
/// `nsw` asserts no signed wrap, `nuw` no unsigned wrap. Both absent means
/// the operation's signedness is unknown to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WrapFlags {
    pub nsw: bool,
    pub nuw: bool,
}

impl WrapFlags {
    pub const NSW: WrapFlags = WrapFlags {
        nsw: true,
        nuw: false,
    };
    pub const NUW: WrapFlags = WrapFlags {
        nsw: false,
        nuw: true,
    };
    pub const NONE: WrapFlags = WrapFlags {
        nsw: false,
        nuw: false,
    };
}

/// Division and remainder opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivOp {
    Sdiv,
    Udiv,
    Srem,
    Urem,
}

impl DivOp {
    pub fn name(self) -> &'static str {
        match self {
            DivOp::Sdiv => "sdiv",
            DivOp::Udiv => "udiv",
            DivOp::Srem => "srem",
            DivOp::Urem => "urem",
        }
    }

    /// Signed division/remainder treats its operands as signed.
    pub fn is_signed(self) -> bool {
        matches!(self, DivOp::Sdiv | DivOp::Srem)
    }
}

/// Integer cast opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Zext,
    Sext,
    Trunc,
    /// Same-width reinterpretation.
    Bitcast,
}

impl CastKind {
    pub fn name(self) -> &'static str {
        match self {
            CastKind::Zext => "zext",
            CastKind::Sext => "sext",
            CastKind::Trunc => "trunc",
            CastKind::Bitcast => "bitcast",
        }
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sge,
    Ult,
    Uge,
}

impl CmpPred {
    pub fn name(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Slt => "slt",
            CmpPred::Sge => "sge",
            CmpPred::Ult => "ult",
            CmpPred::Uge => "uge",
        }
    }
}

/// Checked-arithmetic opcodes yielding a `(result, overflowed)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowOp {
    Sadd,
    Uadd,
    Ssub,
    Usub,
    Smul,
    Umul,
}

impl OverflowOp {
    pub fn name(self) -> &'static str {
        match self {
            OverflowOp::Sadd => "sadd",
            OverflowOp::Uadd => "uadd",
            OverflowOp::Ssub => "ssub",
            OverflowOp::Usub => "usub",
            OverflowOp::Smul => "smul",
            OverflowOp::Umul => "umul",
        }
    }

    /// Pick the checked opcode for a plain arithmetic opcode.
    ///
    /// `signed` selects the signed variant; shifts have no checked form.
    pub fn for_bin_op(op: BinOp, signed: bool) -> Option<OverflowOp> {
        match (op, signed) {
            (BinOp::Add, true) => Some(OverflowOp::Sadd),
            (BinOp::Add, false) => Some(OverflowOp::Uadd),
            (BinOp::Sub, true) => Some(OverflowOp::Ssub),
            (BinOp::Sub, false) => Some(OverflowOp::Usub),
            (BinOp::Mul, true) => Some(OverflowOp::Smul),
            (BinOp::Mul, false) => Some(OverflowOp::Umul),
            (BinOp::Shl, _) => None,
        }
    }
}

/// Which half of a checked-arithmetic pair an extract reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairField {
    /// The wrapped arithmetic result.
    Result,
    /// The overflow bit (`i1`).
    Overflowed,
}

/// Instruction opcodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Binary {
        op: BinOp,
        flags: WrapFlags,
        lhs: Value,
        rhs: Value,
    },
    Div {
        op: DivOp,
        dividend: Value,
        divisor: Value,
    },
    Cast {
        kind: CastKind,
        value: Value,
        from_bits: Width,
        to_bits: Width,
    },
    /// Address computation: base pointer plus one index per aggregate level.
    Gep {
        base: Value,
        indices: Vec<Value>,
    },
    Call {
        callee: String,
        args: Vec<Value>,
    },
    /// Checked arithmetic; read the halves with [`Op::Extract`].
    CheckedBinary {
        op: OverflowOp,
        lhs: Value,
        rhs: Value,
    },
    Extract {
        pair: InstId,
        field: PairField,
    },
    Cmp {
        pred: CmpPred,
        lhs: Value,
        rhs: Value,
    },
    /// The platform's return-address intrinsic.
    ReturnAddress {
        depth: u32,
    },
    GlobalLoad {
        global: GlobalId,
    },
    GlobalStore {
        global: GlobalId,
        value: Value,
    },
}

impl Op {
    /// Short opcode tag used by structural hashing and printing.
    pub fn tag(&self) -> u64 {
        match self {
            Op::Binary { op, .. } => match op {
                BinOp::Add => 1,
                BinOp::Sub => 2,
                BinOp::Mul => 3,
                BinOp::Shl => 4,
            },
            Op::Div { op, .. } => match op {
                DivOp::Sdiv => 5,
                DivOp::Udiv => 6,
                DivOp::Srem => 7,
                DivOp::Urem => 8,
            },
            Op::Cast { kind, .. } => match kind {
                CastKind::Zext => 9,
                CastKind::Sext => 10,
                CastKind::Trunc => 11,
                CastKind::Bitcast => 12,
            },
            Op::Gep { .. } => 13,
            Op::Call { .. } => 14,
            Op::CheckedBinary { .. } => 15,
            Op::Extract { .. } => 16,
            Op::Cmp { .. } => 17,
            Op::ReturnAddress { .. } => 18,
            Op::GlobalLoad { .. } => 19,
            Op::GlobalStore { .. } => 20,
        }
    }
}

/// An instruction: opcode plus result width (0 for void).
#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub op: Op,
    pub width: Width,
}

impl Inst {
    pub fn new(op: Op, width: Width) -> Self {
        Self { op, width }
    }

    /// Void instruction (stores, void calls).
    pub fn void(op: Op) -> Self {
        Self { op, width: 0 }
    }
}

/// Block terminators.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret(Option<Value>),
    Br(BlockId),
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    /// Control never reaches past this point; executing it is undefined.
    Unreachable,
}

impl Terminator {
    /// Blocks this terminator can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Ret(_) | Terminator::Unreachable => Vec::new(),
            Terminator::Br(dest) => vec![*dest],
            Terminator::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
        }
    }
}
