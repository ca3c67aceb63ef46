// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Textual rendering of functions
//!
//! One line per instruction, assembly-printer style. The output is meant for
//! snapshots and diagnostics, not round-tripping.

use std::fmt::{self, Write as _};

use crate::function::Function;
use crate::inst::{Op, PairField, Terminator, Value};

impl Function {
    /// Render the function body as text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let params: Vec<String> = self
            .params()
            .iter()
            .enumerate()
            .map(|(i, w)| format!("i{w} %p{i}"))
            .collect();
        let _ = writeln!(out, "define @{}({}) {{", self.name(), params.join(", "));
        for id in self.block_ids() {
            let block = self.block(id);
            let _ = writeln!(out, "{}:", block.label);
            for &inst_id in &block.insts {
                let inst = self.inst(inst_id);
                let _ = writeln!(out, "  %{} = {}", inst_id.0, render_op(&inst.op));
            }
            let _ = writeln!(out, "  {}", render_term(self, &block.term));
        }
        out.push_str("}\n");
        out
    }
}

fn render_value(v: Value) -> String {
    match v {
        Value::Const(c, w) => format!("i{w} {c}"),
        Value::Inst(id) => format!("%{}", id.0),
        Value::Param(i) => format!("%p{i}"),
        Value::Global(g) => format!("@{}", g.0),
    }
}

fn render_op(op: &Op) -> String {
    match op {
        Op::Binary {
            op,
            flags,
            lhs,
            rhs,
        } => {
            let mut s = op.name().to_string();
            if flags.nsw {
                s.push_str(" nsw");
            }
            if flags.nuw {
                s.push_str(" nuw");
            }
            format!("{s} {}, {}", render_value(*lhs), render_value(*rhs))
        }
        Op::Div {
            op,
            dividend,
            divisor,
        } => format!(
            "{} {}, {}",
            op.name(),
            render_value(*dividend),
            render_value(*divisor)
        ),
        Op::Cast {
            kind,
            value,
            from_bits,
            to_bits,
        } => format!(
            "{} {} from i{from_bits} to i{to_bits}",
            kind.name(),
            render_value(*value)
        ),
        Op::Gep { base, indices } => {
            let idx: Vec<String> = indices.iter().map(|i| render_value(*i)).collect();
            format!("gep {}, [{}]", render_value(*base), idx.join(", "))
        }
        Op::Call { callee, args } => {
            let rendered: Vec<String> = args.iter().map(|a| render_value(*a)).collect();
            format!("call @{callee}({})", rendered.join(", "))
        }
        Op::CheckedBinary { op, lhs, rhs } => format!(
            "{}.with.overflow {}, {}",
            op.name(),
            render_value(*lhs),
            render_value(*rhs)
        ),
        Op::Extract { pair, field } => {
            let idx = match field {
                PairField::Result => 0,
                PairField::Overflowed => 1,
            };
            format!("extract %{}, {idx}", pair.0)
        }
        Op::Cmp { pred, lhs, rhs } => format!(
            "icmp {} {}, {}",
            pred.name(),
            render_value(*lhs),
            render_value(*rhs)
        ),
        Op::ReturnAddress { depth } => format!("returnaddress {depth}"),
        Op::GlobalLoad { global } => format!("load @{}", global.0),
        Op::GlobalStore { global, value } => {
            format!("store {}, @{}", render_value(*value), global.0)
        }
    }
}

fn render_term(f: &Function, term: &Terminator) -> String {
    match term {
        Terminator::Ret(None) => "ret void".to_string(),
        Terminator::Ret(Some(v)) => format!("ret {}", render_value(*v)),
        Terminator::Br(dest) => format!("br label %{}", f.block(*dest).label),
        Terminator::CondBr {
            cond,
            then_dest,
            else_dest,
        } => format!(
            "br {}, label %{}, label %{}",
            render_value(*cond),
            f.block(*then_dest).label,
            f.block(*else_dest).label
        ),
        Terminator::Unreachable => "unreachable".to_string(),
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
