// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Function bodies and the editing API used by instrumentation passes
//!
//! A function owns an instruction arena and a list of basic blocks in layout
//! order. Blocks reference instructions by [`InstId`]; splitting a block or
//! inserting probes never invalidates existing ids, so passes can collect
//! candidate ids during a scan and rewrite them afterwards.

use crate::inst::{BlockId, Inst, InstId, Op, Terminator, Value, Width};

/// A basic block: label, instruction ids in order, and a terminator.
#[derive(Debug, Clone)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
    pub term: Terminator,
}

/// A function under compilation.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Width>,
    insts: Vec<Inst>,
    blocks: Vec<Block>,
    next_label: u32,
}

impl Function {
    /// Create a function with an empty entry block.
    pub fn new(name: impl Into<String>, params: Vec<Width>) -> Self {
        let mut f = Self {
            name: name.into(),
            params,
            insts: Vec::new(),
            blocks: Vec::new(),
            next_label: 0,
        };
        f.add_block("entry");
        f
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Width] {
        &self.params
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    /// Blocks in layout order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0 as usize]
    }

    /// Number of instructions currently reachable from blocks.
    ///
    /// Arena entries detached from every block (e.g. an overflow candidate
    /// left dead after rewriting) are not counted.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    /// Append a new empty block with the given label stem.
    ///
    /// A stem already in use gains a running suffix, so probe insertion can
    /// mint fresh labels freely.
    pub fn add_block(&mut self, stem: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let mut label = stem.to_string();
        while self.blocks.iter().any(|b| b.label == label) {
            label = format!("{}{}", stem, self.next_label);
            self.next_label += 1;
        }
        self.blocks.push(Block {
            label,
            insts: Vec::new(),
            term: Terminator::Unreachable,
        });
        id
    }

    /// Append an instruction to the end of a block.
    pub fn push_inst(&mut self, block: BlockId, inst: Inst) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        self.blocks[block.0 as usize].insts.push(id);
        id
    }

    /// Insert an instruction at a position within a block.
    pub fn insert_inst(&mut self, block: BlockId, pos: usize, inst: Inst) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        self.blocks[block.0 as usize].insts.insert(pos, id);
        id
    }

    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        self.blocks[block.0 as usize].term = term;
    }

    /// Locate an instruction: which block holds it, and at what position.
    ///
    /// Passes collect candidate [`InstId`]s during their scan and re-locate
    /// them here at rewrite time, so earlier rewrites cannot stale them.
    pub fn position_of(&self, inst: InstId) -> Option<(BlockId, usize)> {
        for id in self.block_ids() {
            if let Some(pos) = self.block(id).insts.iter().position(|&i| i == inst) {
                return Some((id, pos));
            }
        }
        None
    }

    /// Split `block` before position `at`.
    ///
    /// Instructions from `at` onward and the terminator move to a fresh tail
    /// block; `block` is left with a placeholder terminator the caller must
    /// replace. Returns the tail block id.
    pub fn split_block(&mut self, block: BlockId, at: usize, stem: &str) -> BlockId {
        let tail = self.add_block(stem);
        let src = &mut self.blocks[block.0 as usize];
        let moved: Vec<InstId> = src.insts.split_off(at);
        let term = std::mem::replace(&mut src.term, Terminator::Unreachable);
        let tail_block = &mut self.blocks[tail.0 as usize];
        tail_block.insts = moved;
        tail_block.term = term;
        tail
    }

    /// Replace every use of `old`'s result with `new`, in operands and
    /// terminators alike. The defining instruction itself is untouched.
    pub fn replace_uses(&mut self, old: InstId, new: Value) {
        let target = Value::Inst(old);
        for inst in &mut self.insts {
            replace_in_op(&mut inst.op, target, new);
        }
        for block in &mut self.blocks {
            match &mut block.term {
                Terminator::Ret(Some(v)) if *v == target => *v = new,
                Terminator::CondBr { cond, .. } if *cond == target => *cond = new,
                _ => {}
            }
        }
    }

    /// Bit width of a value in this function (globals are pointer-width).
    pub fn value_width(&self, v: Value) -> Width {
        match v {
            Value::Const(_, w) => w,
            Value::Inst(id) => self.inst(id).width,
            Value::Param(i) => self.params[i as usize],
            Value::Global(_) => 64,
        }
    }
}

fn replace_in_op(op: &mut Op, target: Value, new: Value) {
    let sub = |v: &mut Value| {
        if *v == target {
            *v = new;
        }
    };
    match op {
        Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => {
            sub(lhs);
            sub(rhs);
        }
        Op::CheckedBinary { lhs, rhs, .. } => {
            sub(lhs);
            sub(rhs);
        }
        Op::Div {
            dividend, divisor, ..
        } => {
            sub(dividend);
            sub(divisor);
        }
        Op::Cast { value, .. } | Op::GlobalStore { value, .. } => sub(value),
        Op::Gep { base, indices } => {
            sub(base);
            indices.iter_mut().for_each(sub);
        }
        Op::Call { args, .. } => args.iter_mut().for_each(sub),
        Op::Extract { .. } | Op::ReturnAddress { .. } | Op::GlobalLoad { .. } => {}
    }
}
