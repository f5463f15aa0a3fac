//! Function cloning.
//!
//! Because blocks, arguments and instructions live in per-function arenas
//! and operands refer to them by id, cloning the arenas preserves every
//! internal reference; only the function's own identity needs rewiring.
//! Recursive calls in the source are redirected to the clone.

use tir_core::{FuncId, InstId, Module, Use};

/// Clone `func` into the module under a fresh global name derived from
/// `base`, returning the clone's id.
pub fn clone_function(module: &mut Module, func: FuncId, base: &str) -> FuncId {
    let fresh = module.make_fresh_global_name(base);
    let mut cloned = module.function(func).clone();
    cloned.name = Some(fresh);
    let clone_id = module.add_function(cloned);

    // Self-referential recursion maps to the clone.
    let old_use = Use::function(func);
    let new_use = Use::function(clone_id);
    let inst_ids: Vec<InstId> = module
        .function(clone_id)
        .instructions()
        .map(|(id, _)| id)
        .collect();
    let function = module.function_mut(clone_id);
    for inst in inst_ids {
        function
            .instruction_mut(inst)
            .kind
            .substitute(&new_use, &old_use);
    }
    tracing::debug!(?func, ?clone_id, "cloned function");
    clone_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use tir_core::{Definition, InstructionKind};
    use tir_parser::parse_module;

    #[test]
    fn clone_preserves_structure_and_rewires_recursion() {
        let mut module = parse_module(
            "module \"m\"\nstage raw\nfunc @fact: (i32) -> i32 {\n'entry(%n: i32):\n    %r = apply @fact: (i32) -> i32(%n: i32)\n    return %r: i32\n}\n",
        )
        .unwrap();
        let func = module.function_ids()[0];
        let clone = clone_function(&mut module, func, "fact");
        assert_ne!(func, clone);
        assert_eq!(module.function(clone).name.as_deref(), Some("fact_0"));
        assert_eq!(
            module.function(clone).block_ids().len(),
            module.function(func).block_ids().len()
        );

        // The recursive call now targets the clone.
        let cloned_fn = module.function(clone);
        let (_, apply) = cloned_fn
            .instructions()
            .find(|(_, inst)| matches!(inst.kind, InstructionKind::Apply(_, _)))
            .unwrap();
        match &apply.kind {
            InstructionKind::Apply(callee, _) => {
                assert_eq!(
                    callee.as_definition(),
                    Some(Definition::Function(clone))
                );
            }
            _ => unreachable!(),
        }

        // The original is untouched.
        let original = module.function(func);
        let (_, apply) = original
            .instructions()
            .find(|(_, inst)| matches!(inst.kind, InstructionKind::Apply(_, _)))
            .unwrap();
        match &apply.kind {
            InstructionKind::Apply(callee, _) => {
                assert_eq!(callee.as_definition(), Some(Definition::Function(func)));
            }
            _ => unreachable!(),
        }
    }
}
