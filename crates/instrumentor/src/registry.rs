// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The plug-in surface
//!
//! Passes register under short names; the host pipeline's extension
//! callback asks the registry to run a name over a module. A name match
//! activates the pass, anything else leaves the compilation unaffected.
//!
//! Two kinds of entries: check instrumentors, and diff-harness wrappers
//! around host-supplied optimization passes (`instrumented-dse`,
//! `instrumented-gvn`, and friends).

use std::collections::BTreeMap;

use pass_diff::{FunctionPass, Harness};

use ir::Module;

use crate::checks::{
    ArithOverflowPass, BoundsPass, CheckPass, DivByZeroPass, LoopBoundPass, PureConsistencyPass,
    SignConversionPass, Trace2PassInstrumentor, UnreachablePass,
};
use crate::error::InstrumentResult;

enum Entry {
    Check(Box<dyn CheckPass + Send>),
    Diffed(Harness),
}

/// Registry of pipeline passes keyed by registration name.
#[derive(Default)]
pub struct PassRegistry {
    entries: BTreeMap<String, Entry>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a check instrumentor under its own name.
    pub fn register_check(&mut self, pass: Box<dyn CheckPass + Send>) {
        self.entries
            .insert(pass.name().to_string(), Entry::Check(pass));
    }

    /// Register a diff-harness wrapper around a host pass.
    pub fn register_diffed(&mut self, name: &str, pass: Box<dyn FunctionPass + Send>) {
        self.entries
            .insert(name.to_string(), Entry::Diffed(Harness::new(pass)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Run the pass registered under `name` over every function of the
    /// module. Returns `false` (and does nothing) when the name matches no
    /// registered pass.
    pub fn run(&mut self, name: &str, module: &mut Module) -> InstrumentResult<bool> {
        let Some(entry) = self.entries.get_mut(name) else {
            return Ok(false);
        };
        match entry {
            Entry::Check(pass) => {
                for func in module.func_ids().collect::<Vec<_>>() {
                    pass.instrument(module, func)?;
                }
            }
            Entry::Diffed(harness) => {
                for func in module.func_ids().collect::<Vec<_>>() {
                    harness.run(module.function_mut(func));
                }
            }
        }
        Ok(true)
    }
}

/// The default pipeline registrations: the master instrumentor plus each
/// check under its own name.
pub fn default_registry() -> PassRegistry {
    let mut registry = PassRegistry::new();
    registry.register_check(Box::new(Trace2PassInstrumentor::default()));
    registry.register_check(Box::new(ArithOverflowPass));
    registry.register_check(Box::new(DivByZeroPass));
    registry.register_check(Box::new(SignConversionPass));
    registry.register_check(Box::new(BoundsPass));
    registry.register_check(Box::new(UnreachablePass));
    registry.register_check(Box::new(PureConsistencyPass));
    registry.register_check(Box::new(LoopBoundPass::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::{BinOp, Function, Inst, Op, Terminator, Value, WrapFlags};
    use pass_diff::Preserved;

    fn module_with_mul() -> Module {
        let mut module = Module::new("m");
        let mut f = Function::new("f", vec![32, 32]);
        let entry = f.entry();
        let m = f.push_inst(
            entry,
            Inst::new(
                Op::Binary {
                    op: BinOp::Mul,
                    flags: WrapFlags::NSW,
                    lhs: Value::Param(0),
                    rhs: Value::Param(1),
                },
                32,
            ),
        );
        f.set_terminator(entry, Terminator::Ret(Some(Value::Inst(m))));
        module.add_function(f);
        module
    }

    #[test]
    fn test_default_registry_names() {
        let registry = default_registry();
        assert!(registry.contains("trace2pass-instrument"));
        assert!(registry.contains("arith-overflow"));
        assert!(registry.contains("loop-bound"));
        assert!(!registry.contains("instrumented-dse"));
    }

    #[test]
    fn test_unknown_name_leaves_module_untouched() {
        let mut registry = default_registry();
        let mut module = module_with_mul();
        let before = module.function(ir::FuncId(0)).to_text();

        let matched = registry.run("no-such-pass", &mut module).unwrap();
        assert!(!matched);
        assert_eq!(module.function(ir::FuncId(0)).to_text(), before);
    }

    #[test]
    fn test_name_match_activates_pass() {
        let mut registry = default_registry();
        let mut module = module_with_mul();

        let matched = registry.run("trace2pass-instrument", &mut module).unwrap();
        assert!(matched);
        assert!(module
            .function(ir::FuncId(0))
            .to_text()
            .contains("smul.with.overflow"));
    }

    #[test]
    fn test_diffed_registration_runs_harness() {
        struct Nop;
        impl FunctionPass for Nop {
            fn name(&self) -> &str {
                "host-dse"
            }
            fn run(&mut self, _function: &mut Function) -> Preserved {
                Preserved::All
            }
        }

        let mut registry = PassRegistry::new();
        registry.register_diffed("instrumented-dse", Box::new(Nop));
        assert!(registry.contains("instrumented-dse"));

        let mut module = module_with_mul();
        let before = module.function(ir::FuncId(0)).to_text();
        let matched = registry.run("instrumented-dse", &mut module).unwrap();
        assert!(matched);
        // The harness itself never alters the function.
        assert_eq!(module.function(ir::FuncId(0)).to_text(), before);
    }
}
