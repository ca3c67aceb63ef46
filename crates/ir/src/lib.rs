//! Intermediate representation at the host-compiler boundary
//!
//! This crate is the interface through which the instrumentation passes see
//! the program under compilation:
//!
//! - **Data model**: [`Module`], [`Function`], basic blocks, an instruction
//!   arena addressed by [`InstId`], and [`Value`] operands
//! - **Editing**: block splitting, instruction insertion, use rewriting —
//!   the operations probe insertion is built from
//! - **CFG**: a block-level graph with positional back-edge detection
//! - **Rendering**: a stable textual form for snapshots and diagnostics
//! - **Evaluation**: a reference interpreter used by tests to check that
//!   probes preserve program results and stay silent on safe runs
//!
//! # Architecture
//!
//! Instruction ids are arena indices and never invalidated: splitting a
//! block or inserting probes moves ids between blocks but does not renumber
//! them. Passes exploit this by collecting candidate ids in a scan pass and
//! re-locating each id at rewrite time.

pub mod cfg;
pub mod display;
pub mod eval;
pub mod function;
pub mod inst;
pub mod module;

pub use cfg::BlockGraph;
pub use eval::{EvalError, EvalResult, Evaluator, HookArg, RecordingHooks, RuntimeHooks};
pub use function::{Block, Function};
pub use inst::{
    BinOp, BlockId, CastKind, CmpPred, DivOp, GlobalId, Inst, InstId, Op, OverflowOp, PairField,
    Terminator, Value, Width, WrapFlags,
};
pub use module::{ExternDecl, FuncId, Global, GlobalKind, MemoryEffects, Module};
