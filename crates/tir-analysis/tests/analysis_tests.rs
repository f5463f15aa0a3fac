//! Analysis tests: dominance, dataflow users, side effects, and the
//! version-stamped pass cache.

use tir_analysis::{
    DataFlowGraphAnalysis, DominanceAnalysis, FunctionAnalysis, ModuleAnalysis, PassManager,
    SideEffect, SideEffectAnalysis,
};
use tir_core::{Definition, InstructionKind};
use tir_parser::parse_module;

fn diamond() -> tir_core::Module {
    parse_module(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (bool) -> i32 {\n",
        "'entry(%c: bool):\n",
        "    %x = literal 1: i32\n",
        "    conditional %c: bool then 'left() else 'right()\n",
        "'left():\n",
        "    branch 'join(%x: i32)\n",
        "'right():\n",
        "    branch 'join(%x: i32)\n",
        "'join(%r: i32):\n",
        "    return %r: i32\n",
        "}\n",
    ))
    .unwrap()
}

#[test]
fn dominator_tree_of_a_diamond() {
    let module = diamond();
    let func = module.function_ids()[0];
    let tree = DominanceAnalysis::run(&module, func);
    let function = module.function(func);
    let blocks = function.block_ids();
    let (entry, left, right, join) = (blocks[0], blocks[1], blocks[2], blocks[3]);

    for &block in blocks {
        assert!(tree.contains(block));
        assert!(tree.dominates(entry, block));
    }
    assert!(tree.properly_dominates_block(entry, join));
    assert!(!tree.properly_dominates_block(left, join));
    assert!(!tree.properly_dominates_block(left, right));
    assert!(!tree.properly_dominates_block(join, entry));
}

#[test]
fn same_block_dominance_is_positional() {
    let module = diamond();
    let func = module.function_ids()[0];
    let function = module.function(func);
    let tree = DominanceAnalysis::run(&module, func);

    let entry = function.entry().unwrap();
    let insts = function.block(entry).insts();
    let literal = insts[0];
    let conditional = insts[1];
    assert!(tree.properly_dominates(Definition::Instruction(literal), conditional, function));
    assert!(!tree.properly_dominates(Definition::Instruction(conditional), literal, function));
    assert!(!tree.properly_dominates(Definition::Instruction(literal), literal, function));
}

#[test]
fn unreachable_blocks_are_outside_the_tree() {
    let module = parse_module(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "'island():\n",
        "    %y = literal 2: i32\n",
        "    return %y: i32\n",
        "}\n",
    ))
    .unwrap();
    let func = module.function_ids()[0];
    let tree = DominanceAnalysis::run(&module, func);
    let blocks = module.function(func).block_ids();
    assert!(tree.contains(blocks[0]));
    assert!(!tree.contains(blocks[1]));
}

#[test]
fn dataflow_users_are_collected_once_per_instruction() {
    let module = parse_module(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    %y = add %x: i32, %x: i32\n",
        "    return %y: i32\n",
        "}\n",
    ))
    .unwrap();
    let func = module.function_ids()[0];
    let graph = DataFlowGraphAnalysis::run(&module, func);
    let function = module.function(func);
    let entry = function.entry().unwrap();
    let x = function.block(entry).insts()[0];
    let y = function.block(entry).insts()[1];

    assert_eq!(graph.users(Definition::Instruction(x)), &[y]);
    assert!(graph.has_users(Definition::Instruction(y)));
}

#[test]
fn side_effects_propagate_through_calls() {
    let module = parse_module(concat!(
        "module \"m\"\nstage raw\n",
        "var @g: i32\n",
        "func @writer: () -> void {\n",
        "'entry():\n",
        "    store 1: i32 to @g: *i32\n",
        "    return\n",
        "}\n",
        "func @caller: () -> void {\n",
        "'entry():\n",
        "    apply @writer: () -> void()\n",
        "    return\n",
        "}\n",
        "func @pure: (i32) -> i32 {\n",
        "'entry(%x: i32):\n",
        "    %y = add %x: i32, 1: i32\n",
        "    return %y: i32\n",
        "}\n",
    ))
    .unwrap();
    let info = SideEffectAnalysis::run(&module);
    let writer = module.function_named("writer").unwrap();
    let caller = module.function_named("caller").unwrap();
    let pure = module.function_named("pure").unwrap();

    assert!(info.function_has_effects(writer));
    assert!(info.function_has_effects(caller));
    assert!(!info.function_has_effects(pure));

    let function = module.function(pure);
    let entry = function.entry().unwrap();
    let add = function.block(entry).insts()[0];
    assert_eq!(info.effect(&function.instruction(add).kind), SideEffect::None);
    assert_eq!(
        info.effect(&InstructionKind::Trap),
        SideEffect::Some
    );
}

#[test]
fn pass_cache_expires_on_mutation() {
    let mut module = diamond();
    let func = module.function_ids()[0];
    let mut passes = PassManager::new();

    let first = passes.function_analysis::<DataFlowGraphAnalysis>(&module, func);
    let second = passes.function_analysis::<DataFlowGraphAnalysis>(&module, func);
    assert!(std::rc::Rc::ptr_eq(&first, &second), "expected a cache hit");

    // Any mutation bumps the version and expires the entry.
    let entry = module.function(func).entry().unwrap();
    module
        .function_mut(func)
        .block_mut(entry)
        .name
        .replace("renamed".to_string());
    let third = passes.function_analysis::<DataFlowGraphAnalysis>(&module, func);
    assert!(!std::rc::Rc::ptr_eq(&second, &third), "expected recomputation");
}
