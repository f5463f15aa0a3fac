//! Side-effect summaries.
//!
//! An instruction's summary is `None` iff its kind does not write memory,
//! is not a terminator, and does not invoke a function with side effects.
//! Function-level effects are a fixpoint over the call graph; declarations
//! and indirect callees are assumed effectful.

use rustc_hash::FxHashSet;
use tir_core::{Definition, FuncId, InstructionKind, Module, Use};

use crate::pass::ModuleAnalysis;

/// Effect summary of a single instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect {
    None,
    Some,
}

/// Module-wide side-effect information.
#[derive(Debug, Default)]
pub struct SideEffectInfo {
    effectful: FxHashSet<FuncId>,
}

impl SideEffectInfo {
    /// Whether calling the function can have observable effects.
    pub fn function_has_effects(&self, function: FuncId) -> bool {
        self.effectful.contains(&function)
    }

    /// Effect summary of an instruction kind.
    pub fn effect(&self, kind: &InstructionKind) -> SideEffect {
        if kind.must_write_to_memory() || kind.is_terminator() {
            return SideEffect::Some;
        }
        if let InstructionKind::Apply(callee, _) = kind {
            return match callee {
                Use::Definition(Definition::Function(f)) if !self.function_has_effects(*f) => {
                    SideEffect::None
                }
                _ => SideEffect::Some,
            };
        }
        SideEffect::None
    }
}

/// Computes `SideEffectInfo` as a fixpoint over the call graph.
pub struct SideEffectAnalysis;

impl SideEffectAnalysis {
    fn locally_effectful(module: &Module, function: FuncId) -> bool {
        let function = module.function(function);
        if function.block_ids().is_empty() {
            // Declarations have unknown bodies.
            return true;
        }
        function.instructions().any(|(_, inst)| {
            inst.kind.must_write_to_memory() || matches!(inst.kind, InstructionKind::Trap)
        })
    }
}

impl ModuleAnalysis for SideEffectAnalysis {
    type Result = SideEffectInfo;

    fn run(module: &Module) -> SideEffectInfo {
        let mut info = SideEffectInfo::default();
        for &function in module.function_ids() {
            if Self::locally_effectful(module, function) {
                info.effectful.insert(function);
            }
        }
        // Propagate through calls until stable.
        loop {
            let mut changed = false;
            for &caller in module.function_ids() {
                if info.effectful.contains(&caller) {
                    continue;
                }
                let calls_effectful =
                    module
                        .function(caller)
                        .instructions()
                        .any(|(_, inst)| match &inst.kind {
                            InstructionKind::Apply(callee, _) => match callee {
                                Use::Definition(Definition::Function(f)) => {
                                    info.effectful.contains(f)
                                }
                                // Indirect calls are assumed effectful.
                                _ => true,
                            },
                            _ => false,
                        });
                if calls_effectful {
                    info.effectful.insert(caller);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        tracing::debug!(
            effectful = info.effectful.len(),
            total = module.function_ids().len(),
            "computed side-effect summaries"
        );
        info
    }
}
