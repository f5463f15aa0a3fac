//! Dead-code elimination.
//!
//! Worklist-driven: an instruction is removed iff it has no users, its
//! side-effect summary is `none`, and it is not a terminator. Removing an
//! instruction re-enqueues its former operand producers. Analyses are
//! re-requested from the pass manager after every mutation; the
//! version-stamped cache keeps the re-request correct.

use std::collections::VecDeque;

use tir_analysis::{
    DataFlowGraphAnalysis, FunctionTransform, PassManager, SideEffect, SideEffectAnalysis,
};
use tir_core::{Definition, FuncId, InstId, Module};

pub struct DeadCodeElimination;

impl FunctionTransform for DeadCodeElimination {
    fn run(module: &mut Module, func: FuncId, passes: &mut PassManager) -> bool {
        let mut changed = false;
        let mut worklist: VecDeque<InstId> = module
            .function(func)
            .instructions()
            .map(|(id, _)| id)
            .collect();

        while let Some(inst) = worklist.pop_front() {
            if !module.function(func).contains_instruction(inst) {
                continue;
            }
            let users = passes.function_analysis::<DataFlowGraphAnalysis>(module, func);
            let effects = passes.module_analysis::<SideEffectAnalysis>(module);

            let (removable, producers) = {
                let function = module.function(func);
                let kind = &function.instruction(inst).kind;
                let removable = !kind.is_terminator()
                    && effects.effect(kind) == SideEffect::None
                    && !users.has_users(Definition::Instruction(inst));
                let producers: Vec<InstId> = if removable {
                    kind.operands()
                        .iter()
                        .filter_map(|operand| match operand.as_definition() {
                            Some(Definition::Instruction(producer)) => Some(producer),
                            _ => None,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                (removable, producers)
            };
            if !removable {
                continue;
            }

            module.function_mut(func).remove_instruction(inst);
            tracing::debug!(?inst, "removed dead instruction");
            changed = true;
            worklist.extend(producers);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tir_parser::parse_module;

    #[test]
    fn removes_unused_pure_instructions_and_is_idempotent() {
        let mut module = parse_module(
            "module \"m\"\nstage raw\nfunc @bar: () -> i32 {\n'entry():\n    %0.0 = literal 1: i32\n    %0.1 = literal 2: i32\n    return %0.0: i32\n}\n",
        )
        .unwrap();
        let func = module.function_ids()[0];
        let mut passes = PassManager::new();

        assert!(DeadCodeElimination::run(&mut module, func, &mut passes));
        let function = module.function(func);
        assert_eq!(function.instructions().count(), 2);

        assert!(!DeadCodeElimination::run(&mut module, func, &mut passes));
    }

    #[test]
    fn removal_cascades_to_operand_producers() {
        let mut module = parse_module(
            "module \"m\"\nstage raw\nfunc @f: () -> i32 {\n'entry():\n    %a = literal 1: i32\n    %b = add %a: i32, %a: i32\n    %c = literal 7: i32\n    return %c: i32\n}\n",
        )
        .unwrap();
        let func = module.function_ids()[0];
        let mut passes = PassManager::new();

        assert!(DeadCodeElimination::run(&mut module, func, &mut passes));
        // %b is dead, and removing it makes %a dead too.
        let function = module.function(func);
        let remaining: Vec<_> = function
            .instructions()
            .map(|(_, inst)| inst.name.clone())
            .collect();
        assert_eq!(remaining, vec![Some("c".to_string()), None]);
    }

    #[test]
    fn keeps_side_effectful_instructions() {
        let mut module = parse_module(
            "module \"m\"\nstage raw\nvar @g: i32\nfunc @f: () -> i32 {\n'entry():\n    store 1: i32 to @g: *i32\n    %c = literal 7: i32\n    return %c: i32\n}\n",
        )
        .unwrap();
        let func = module.function_ids()[0];
        let mut passes = PassManager::new();

        assert!(!DeadCodeElimination::run(&mut module, func, &mut passes));
        assert_eq!(module.function(func).instructions().count(), 3);
    }
}
