//! Predecessor hoisting.
//!
//! Given a target block T and a set of predecessors P, create a new block
//! N whose arguments mirror T's, ending in an unconditional
//! `branch T(N.args…)`, and rewrite every predecessor's terminator to
//! branch to N in place of T. Fresh names come from the function's name
//! allocator.

use tir_core::{BlockId, FuncId, InstructionKind, Module, Use};

/// Hoist `predecessors`' edges into a new block inserted at `at` in the
/// block order; returns the new block.
pub fn hoist_predecessors(
    module: &mut Module,
    func: FuncId,
    target: BlockId,
    predecessors: &[BlockId],
    at: usize,
) -> BlockId {
    // Mirror the target's argument list.
    let (block_base, args): (String, Vec<(Option<String>, tir_core::Type)>) = {
        let function = module.function(func);
        let block = function.block(target);
        let base = block.name.clone().unwrap_or_else(|| "bb".to_string());
        let args = block
            .args()
            .iter()
            .map(|&a| {
                let argument = function.argument(a);
                (argument.name.clone(), argument.ty.clone())
            })
            .collect();
        (base, args)
    };

    let block_name = module.function(func).make_fresh_name(&block_base);
    let new_block = module
        .function_mut(func)
        .insert_block_at(at, Some(block_name));

    let mut forwarded = Vec::with_capacity(args.len());
    for (name, ty) in args {
        let fresh = name.map(|base| module.function(func).make_fresh_name(&base));
        let arg = module
            .function_mut(func)
            .append_argument(new_block, fresh, ty);
        forwarded.push(Use::argument(arg));
    }
    module.function_mut(func).append_instruction(
        new_block,
        None,
        InstructionKind::Branch(target, forwarded),
    );

    // Rewire each predecessor's terminator edge from T to N.
    for &pred in predecessors {
        let Some(terminator) = module.function(func).terminator(pred) else {
            continue;
        };
        module
            .function_mut(func)
            .instruction_mut(terminator)
            .kind
            .substitute_branches(target, new_block);
    }
    tracing::debug!(?target, ?new_block, "hoisted predecessors");
    new_block
}

#[cfg(test)]
mod tests {
    use super::*;
    use tir_parser::parse_module;
    use tir_verify::verify_module;

    #[test]
    fn hoisting_redirects_predecessors_through_the_new_block() {
        let mut module = parse_module(concat!(
            "module \"m\"\nstage raw\n",
            "func @f: (bool, i32) -> i32 {\n",
            "'entry(%c: bool, %x: i32):\n",
            "    conditional %c: bool then 'left() else 'right()\n",
            "'left():\n",
            "    branch 'exit(%x: i32)\n",
            "'right():\n",
            "    branch 'exit(1: i32)\n",
            "'exit(%r: i32):\n",
            "    return %r: i32\n",
            "}\n",
        ))
        .unwrap();
        let func = module.function_ids()[0];
        let function = module.function(func);
        let blocks = function.block_ids().to_vec();
        let (left, right, exit) = (blocks[1], blocks[2], blocks[3]);

        let hoisted = hoist_predecessors(&mut module, func, exit, &[left, right], 3);

        let function = module.function(func);
        // New block sits before the target and forwards its arguments.
        assert_eq!(function.block_index(hoisted), Some(3));
        assert_eq!(function.block(hoisted).args().len(), 1);
        let branch = function.terminator(hoisted).unwrap();
        match &function.instruction(branch).kind {
            InstructionKind::Branch(dest, args) => {
                assert_eq!(*dest, exit);
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected terminator: {other:?}"),
        }
        // Both predecessors now branch to the new block.
        for pred in [left, right] {
            let terminator = function.terminator(pred).unwrap();
            let targets = function.instruction(terminator).kind.branch_targets();
            assert_eq!(targets.as_slice(), &[hoisted]);
        }
        // The rewritten function still verifies.
        verify_module(&module).unwrap();
    }
}
