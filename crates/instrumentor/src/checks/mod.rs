// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Check instrumentors, one per check kind
//!
//! Every pass follows the same discipline: scan the whole function top to
//! bottom collecting candidate sites into a list, never rewriting during the
//! traversal, then rewrite each candidate through the probe builder. Each
//! pass emits a one-line per-function summary of counts.
//!
//! The master pass runs the checks in a fixed order so that probe code
//! inserted by one check is never a candidate for a later one: the
//! sign-conversion pass runs before anything that widens with `zext`, and
//! the loop-bound pass (which inserts counter `add`s) runs after the
//! arithmetic pass.

pub mod arith;
pub mod bounds;
pub mod div_zero;
pub mod loop_bound;
pub mod pure_call;
pub mod sign_conversion;
pub mod unreachable;

use tracing::info;

use ir::{FuncId, Module};

use crate::error::InstrumentResult;

pub use arith::ArithOverflowPass;
pub use bounds::BoundsPass;
pub use div_zero::DivByZeroPass;
pub use loop_bound::{LoopBoundPass, DEFAULT_LOOP_THRESHOLD};
pub use pure_call::PureConsistencyPass;
pub use sign_conversion::SignConversionPass;
pub use unreachable::UnreachablePass;

/// A check instrumentor: rewrites one function's candidate sites.
pub trait CheckPass {
    /// Short registration name, e.g. `arith-overflow`.
    fn name(&self) -> &'static str;

    /// Instrument one function; returns the number of probes inserted.
    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize>;
}

/// Functions the instrumentor must never touch: the runtime's own entry
/// points, which would otherwise be instrumented recursively.
pub(crate) fn skip_function(name: &str) -> bool {
    name.starts_with("trace2pass_")
}

/// Per-function summary line required of every instrumentor.
pub(crate) fn summarize(pass: &str, function: &str, probes: usize) {
    info!("Trace2Pass: {pass}: {probes} probe(s) in {function}");
}

/// The master instrumentor: all seven checks in contamination-safe order.
pub struct Trace2PassInstrumentor {
    passes: Vec<Box<dyn CheckPass + Send + Sync>>,
}

impl Default for Trace2PassInstrumentor {
    fn default() -> Self {
        Self {
            passes: vec![
                Box::new(SignConversionPass),
                Box::new(ArithOverflowPass),
                Box::new(DivByZeroPass),
                Box::new(BoundsPass),
                Box::new(UnreachablePass),
                Box::new(PureConsistencyPass),
                Box::new(LoopBoundPass::default()),
            ],
        }
    }
}

impl CheckPass for Trace2PassInstrumentor {
    fn name(&self) -> &'static str {
        "trace2pass-instrument"
    }

    fn instrument(&self, module: &mut Module, func: FuncId) -> InstrumentResult<usize> {
        if skip_function(module.function(func).name()) {
            return Ok(0);
        }
        let mut total = 0;
        for pass in &self.passes {
            total += pass.instrument(module, func)?;
        }
        info!(
            "Trace2Pass: Instrumented {} operation(s) in {}",
            total,
            module.function(func).name()
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_function_filter() {
        assert!(skip_function("trace2pass_report_overflow"));
        assert!(skip_function("trace2pass_should_sample"));
        assert!(!skip_function("main"));
        assert!(!skip_function("compute"));
    }

    #[test]
    fn test_master_skips_runtime_functions() {
        let mut module = Module::new("m");
        let mut f = ir::Function::new("trace2pass_report_overflow", vec![64, 64]);
        f.set_terminator(f.entry(), ir::Terminator::Ret(None));
        let func = module.add_function(f);

        let master = Trace2PassInstrumentor::default();
        assert_eq!(master.instrument(&mut module, func).unwrap(), 0);
    }
}
