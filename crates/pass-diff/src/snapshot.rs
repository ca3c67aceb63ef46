// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! IR snapshots and diff verdicts
//!
//! A snapshot is an immutable record of one function's shape. The structural
//! hash mixes block count, instruction count, and the ordered opcode
//! sequence: it is order-sensitive, and stable under value or label renaming
//! because names never enter the mix.

use ir::Function;

/// Instruction-count delta above which a diff is suspicious (code bloat).
const SUSPICIOUS_GROWTH: i64 = 10;
/// Instruction-count delta below which a diff is suspicious (over-aggressive
/// dead-code elimination).
const SUSPICIOUS_SHRINKAGE: i64 = -5;
/// Absolute block-count delta above which a diff is suspicious (CFG surgery).
const SUSPICIOUS_BLOCK_SWING: i64 = 3;

/// Immutable record of one function's IR shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub instruction_count: usize,
    pub basic_block_count: usize,
    pub structural_hash: u64,
    pub textual_form: String,
}

impl Snapshot {
    /// Capture a function.
    pub fn capture(function: &Function) -> Self {
        let basic_block_count = function.block_count();
        let instruction_count = function.instruction_count();

        let mut hash = (basic_block_count as u64)
            .wrapping_mul(31)
            .wrapping_add((instruction_count as u64).wrapping_mul(17));
        for block in function.block_ids() {
            for &inst in &function.block(block).insts {
                hash = hash.wrapping_mul(37).wrapping_add(function.inst(inst).op.tag());
            }
        }

        Self {
            instruction_count,
            basic_block_count,
            structural_hash: hash,
            textual_form: function.to_text(),
        }
    }
}

/// Classification of the delta between two snapshots of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffVerdict {
    pub changed: bool,
    pub suspicious: bool,
    pub instruction_delta: i64,
    pub block_delta: i64,
    /// Human-readable delta description; empty when unchanged.
    pub reason: String,
}

/// Compare two snapshots of the same function around one pass invocation.
pub fn compare(before: &Snapshot, after: &Snapshot) -> DiffVerdict {
    if before.structural_hash == after.structural_hash {
        return DiffVerdict {
            changed: false,
            suspicious: false,
            instruction_delta: 0,
            block_delta: 0,
            reason: String::new(),
        };
    }

    let instruction_delta = after.instruction_count as i64 - before.instruction_count as i64;
    let block_delta = after.basic_block_count as i64 - before.basic_block_count as i64;

    let suspicious = instruction_delta > SUSPICIOUS_GROWTH
        || instruction_delta < SUSPICIOUS_SHRINKAGE
        || block_delta.abs() > SUSPICIOUS_BLOCK_SWING;

    let reason = format!(
        "Instructions: {} -> {} (delta: {}); BasicBlocks: {} -> {} (delta: {})",
        before.instruction_count,
        after.instruction_count,
        instruction_delta,
        before.basic_block_count,
        after.basic_block_count,
        block_delta,
    );

    DiffVerdict {
        changed: true,
        suspicious,
        instruction_delta,
        block_delta,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BinOp, Inst, Op, Terminator, Value, WrapFlags};

    fn function_with_adds(n: usize) -> Function {
        let mut f = Function::new("f", vec![32, 32]);
        let entry = f.entry();
        for _ in 0..n {
            f.push_inst(
                entry,
                Inst::new(
                    Op::Binary {
                        op: BinOp::Add,
                        flags: WrapFlags::NONE,
                        lhs: Value::Param(0),
                        rhs: Value::Param(1),
                    },
                    32,
                ),
            );
        }
        f.set_terminator(entry, Terminator::Ret(None));
        f
    }

    fn verdict_for_growth(before_n: usize, after_n: usize) -> DiffVerdict {
        let before = Snapshot::capture(&function_with_adds(before_n));
        let after = Snapshot::capture(&function_with_adds(after_n));
        compare(&before, &after)
    }

    #[test]
    fn test_identical_functions_unchanged() {
        let v = verdict_for_growth(5, 5);
        assert!(!v.changed);
        assert!(!v.suspicious);
        assert!(v.reason.is_empty());
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let mut a = Function::new("f", vec![32, 32]);
        let entry = a.entry();
        let add = Op::Binary {
            op: BinOp::Add,
            flags: WrapFlags::NONE,
            lhs: Value::Param(0),
            rhs: Value::Param(1),
        };
        let mul = Op::Binary {
            op: BinOp::Mul,
            flags: WrapFlags::NONE,
            lhs: Value::Param(0),
            rhs: Value::Param(1),
        };
        a.push_inst(entry, Inst::new(add.clone(), 32));
        a.push_inst(entry, Inst::new(mul.clone(), 32));
        a.set_terminator(entry, Terminator::Ret(None));

        let mut b = Function::new("f", vec![32, 32]);
        let entry = b.entry();
        b.push_inst(entry, Inst::new(mul, 32));
        b.push_inst(entry, Inst::new(add, 32));
        b.set_terminator(entry, Terminator::Ret(None));

        assert_ne!(
            Snapshot::capture(&a).structural_hash,
            Snapshot::capture(&b).structural_hash
        );
    }

    #[test]
    fn test_hash_stable_under_renaming() {
        let a = function_with_adds(3);
        let mut b = Function::new("completely_different_name", vec![32, 32]);
        let entry = b.entry();
        for _ in 0..3 {
            b.push_inst(
                entry,
                Inst::new(
                    Op::Binary {
                        op: BinOp::Add,
                        flags: WrapFlags::NONE,
                        lhs: Value::Param(0),
                        rhs: Value::Param(1),
                    },
                    32,
                ),
            );
        }
        b.set_terminator(entry, Terminator::Ret(None));

        assert_eq!(
            Snapshot::capture(&a).structural_hash,
            Snapshot::capture(&b).structural_hash
        );
    }

    // The +10/+11, -5/-6, and ±3/±4 edges below pin the classification
    // boundaries exactly.

    #[test]
    fn test_eleven_added_instructions_is_suspicious() {
        let v = verdict_for_growth(5, 16);
        assert!(v.changed);
        assert!(v.suspicious);
        assert_eq!(v.instruction_delta, 11);
    }

    #[test]
    fn test_ten_added_instructions_is_changed_but_clean() {
        let v = verdict_for_growth(5, 15);
        assert!(v.changed);
        assert!(!v.suspicious);
        assert_eq!(v.instruction_delta, 10);
    }

    #[test]
    fn test_five_removed_instructions_is_clean() {
        let v = verdict_for_growth(10, 5);
        assert!(v.changed);
        assert!(!v.suspicious);
        assert_eq!(v.instruction_delta, -5);
    }

    #[test]
    fn test_six_removed_instructions_is_suspicious() {
        let v = verdict_for_growth(10, 4);
        assert!(v.changed);
        assert!(v.suspicious);
        assert_eq!(v.instruction_delta, -6);
    }

    fn function_with_blocks(n: usize) -> Function {
        let mut f = Function::new("f", vec![]);
        let mut prev = f.entry();
        for _ in 1..n {
            let next = f.add_block("bb");
            f.set_terminator(prev, Terminator::Br(next));
            prev = next;
        }
        f.set_terminator(prev, Terminator::Ret(None));
        f
    }

    #[test]
    fn test_three_block_swing_is_clean() {
        let before = Snapshot::capture(&function_with_blocks(2));
        let after = Snapshot::capture(&function_with_blocks(5));
        let v = compare(&before, &after);
        assert!(v.changed);
        assert_eq!(v.block_delta, 3);
        assert!(!v.suspicious);
    }

    #[test]
    fn test_four_block_swing_is_suspicious() {
        let before = Snapshot::capture(&function_with_blocks(6));
        let after = Snapshot::capture(&function_with_blocks(2));
        let v = compare(&before, &after);
        assert_eq!(v.block_delta, -4);
        assert!(v.suspicious);
    }

    #[test]
    fn test_reason_describes_both_deltas() {
        let v = verdict_for_growth(3, 16);
        assert!(v.reason.contains("Instructions: 3 -> 16 (delta: 13)"));
        assert!(v.reason.contains("BasicBlocks: 1 -> 1 (delta: 0)"));
    }
}
