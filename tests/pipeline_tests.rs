//! End-to-end pipeline through the facade crate: parse, verify,
//! transform, print, re-parse.

use tir::analysis::{FunctionTransform, PassManager};
use tir::parser::parse_module;
use tir::transforms::DeadCodeElimination;
use tir::verify::verify_module;

#[test]
fn parse_verify_optimize_print() {
    let source = concat!(
        "module \"pipeline\"\nstage raw\n",
        "func @f: (i32) -> i32 {\n",
        "'entry(%x: i32):\n",
        "    %dead = multiply %x: i32, 2: i32\n",
        "    %live = add %x: i32, 1: i32\n",
        "    return %live: i32\n",
        "}\n",
    );
    let mut module = parse_module(source).unwrap();
    verify_module(&module).unwrap();

    let func = module.function_ids()[0];
    let mut passes = PassManager::new();
    assert!(DeadCodeElimination::run(&mut module, func, &mut passes));
    verify_module(&module).unwrap();
    assert_eq!(module.function(func).instructions().count(), 2);

    let printed = module.display().to_string();
    let reparsed = parse_module(&printed).unwrap();
    verify_module(&reparsed).unwrap();
    assert_eq!(printed, reparsed.display().to_string());
}
