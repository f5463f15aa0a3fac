//! Parser coverage: declarations, instruction forms, symbol resolution,
//! and the anonymous-index rules.

use tir_core::{
    DeclarationKind, GlobalValue, InstructionKind, Stage, Type, TypeHandle,
};
use tir_parser::{Error, ParseError, parse_module};

fn parse_ok(source: &str) -> tir_core::Module {
    match parse_module(source) {
        Ok(module) => module,
        Err(error) => panic!("expected `{source}` to parse, got: {error}"),
    }
}

fn parse_err(source: &str) -> ParseError {
    match parse_module(source) {
        Ok(_) => panic!("expected `{source}` to fail"),
        Err(Error::Parse(error)) => error,
        Err(Error::Lexical(error)) => panic!("expected a parse error, got lexical: {error}"),
    }
}

#[test]
fn parses_module_header() {
    let module = parse_ok("module \"test\"\nstage optimizable\n");
    assert_eq!(module.name(), "test");
    assert_eq!(module.stage, Stage::Optimizable);
}

#[test]
fn parses_nominal_types_and_globals() {
    let module = parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "type $Vec = tensor<4 x f32>\n",
        "type $Opaque\n",
        "struct $Pair {\n    #first: i32\n    #second: $Vec\n}\n",
        "enum $Shape {\n    ?empty\n    ?leaf(i32, i32)\n}\n",
        "var @counter: i64\n",
    ));
    let Some(TypeHandle::Alias(vec_id)) = module.type_named("Vec") else {
        panic!("expected alias");
    };
    assert!(module.alias(vec_id).underlying.is_some());
    let Some(TypeHandle::Alias(opaque)) = module.type_named("Opaque") else {
        panic!("expected alias");
    };
    assert!(module.alias(opaque).underlying.is_none());

    let Some(TypeHandle::Struct(pair)) = module.type_named("Pair") else {
        panic!("expected struct");
    };
    let fields: Vec<_> = module.struct_type(pair).fields.keys().cloned().collect();
    assert_eq!(fields, vec!["first", "second"]);

    let Some(TypeHandle::Enum(shape)) = module.type_named("Shape") else {
        panic!("expected enum");
    };
    assert_eq!(module.enum_type(shape).cases["leaf"].len(), 2);

    let counter = module.variable_named("counter").unwrap();
    assert_eq!(module.variable(counter).ty, Type::scalar(tir_common::DataType::Int(64)));
}

#[test]
fn parses_function_with_blocks_and_branches() {
    let module = parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "func @max: (i32, i32) -> i32 {\n",
        "'entry(%a: i32, %b: i32):\n",
        "    %cmp = greaterThan %a: i32, %b: i32\n",
        "    conditional %cmp: bool then 'first(%a: i32) else 'first(%b: i32)\n",
        "'first(%winner: i32):\n",
        "    return %winner: i32\n",
        "}\n",
    ));
    let func = module.function_named("max").unwrap();
    let function = module.function(func);
    assert_eq!(function.block_ids().len(), 2);
    let (_, cond) = function
        .instructions()
        .find(|(_, i)| matches!(i.kind, InstructionKind::Conditional { .. }))
        .unwrap();
    assert_eq!(cond.kind.branch_targets().len(), 2);
}

#[test]
fn resolves_forward_function_references() {
    let module = parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "func @a: () -> i32 {\n",
        "'entry():\n",
        "    %r = apply @b: () -> i32()\n",
        "    return %r: i32\n",
        "}\n",
        "func @b: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "}\n",
    ));
    assert!(module.function_named("b").is_some());
}

#[test]
fn parses_declarations_and_adjoints() {
    let module = parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "[extern] func @sin_impl: (f32) -> f32\n",
        "[adjoint @sin_impl wrt 0 seedable] func @sin_grad: (f32, f32) -> f32\n",
    ));
    let sin = module.function_named("sin_impl").unwrap();
    assert_eq!(
        module.function(sin).declaration_kind,
        Some(DeclarationKind::External)
    );
    let grad = module.function_named("sin_grad").unwrap();
    match &module.function(grad).declaration_kind {
        Some(DeclarationKind::Adjoint(config)) => {
            assert_eq!(config.primal, sin);
            assert_eq!(config.argument_indices, Some(vec![0]));
            assert!(config.seedable);
        }
        other => panic!("unexpected declaration kind: {other:?}"),
    }
}

#[test]
fn parses_memory_and_stack_instructions() {
    parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %p = allocateStack i32 count 4\n",
        "    store 5: i32 to %p: *i32\n",
        "    %v = load %p: *i32\n",
        "    %b = allocateBox f32\n",
        "    retain %b: box{f32}\n",
        "    release %b: box{f32}\n",
        "    %s = createStack\n",
        "    push %v: i32 to %s: stack\n",
        "    %w = pop i32 from %s: stack\n",
        "    destroyStack %s: stack\n",
        "    deallocate %p: *i32\n",
        "    return %w: i32\n",
        "}\n",
    ));
}

#[test]
fn parses_tensor_instructions() {
    parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<2x3 x f32>, tensor<3x4 x f32>) -> f32 {\n",
        "'entry(%a: tensor<2x3 x f32>, %b: tensor<3x4 x f32>):\n",
        "    %m = dot %a: tensor<2x3 x f32>, %b: tensor<3x4 x f32>\n",
        "    %t = transpose %m: tensor<2x4 x f32>\n",
        "    %r = reduce %t: tensor<4x2 x f32> by add init 0.0: f32 along 0, 1\n",
        "    %c = concatenate %a: tensor<2x3 x f32>, %a: tensor<2x3 x f32> along 0\n",
        "    %s = slice %c: tensor<4x3 x f32> from 0 upto 1\n",
        "    %rv = reverse %s: tensor<2x3 x f32> along 1\n",
        "    %sc = shapeCast %rv: tensor<2x3 x f32> to 6\n",
        "    %dc = dataTypeCast %sc: tensor<6 x f32> to f64\n",
        "    %w = reduceWindow %dc: tensor<6 x f64> by max init 0.0: f64 dims 2 strides 2 padding none\n",
        "    return %r: f32\n",
        "}\n",
    ));
}

#[test]
fn parses_aggregate_literals_and_extract() {
    parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "struct $P {\n    #x: i32\n    #y: tensor<2 x i32>\n}\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %p = literal {#x = 1: i32, #y = <2: i32, 3: i32>: tensor<2 x i32>}: $P\n",
        "    %x = extract #x from %p: $P\n",
        "    %t = literal (1: i32, 2.0: f32): (i32, f32)\n",
        "    %a = literal [1: i32, 2: i32]: [2 x i32]\n",
        "    %e = extract 1 from %a: [2 x i32]\n",
        "    return %x: i32\n",
        "}\n",
    ));
}

#[test]
fn parses_builtin_and_intrinsic_combinators() {
    parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<4 x f32>) -> f32 {\n",
        "'entry(%v: tensor<4 x f32>):\n",
        "    %a = builtin \"relu\"(%v: tensor<4 x f32>)\n",
        "    %r = reduce %a: tensor<4 x f32> by builtin \"mean\" init 0.0: f32 along 0\n",
        "    return %r: f32\n",
        "}\n",
    ));
}

#[test]
fn anonymous_indices_are_validated() {
    // Anonymous instruction index must equal the instruction count.
    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %0.1 = literal 1: i32\n",
        "    return %0.1: i32\n",
        "}\n",
    ));
    assert!(matches!(error, ParseError::InvalidInstructionIndex { index: 1, .. }));

    // Anonymous block index must equal the block count.
    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'1():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "}\n",
    ));
    assert!(matches!(error, ParseError::InvalidBasicBlockIndex { index: 1, .. }));

    // Anonymous function index counts variables and functions.
    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "var @g: i32\n",
        "func @0: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "}\n",
    ));
    assert!(matches!(error, ParseError::InvalidFunctionIndex { index: 0, .. }));

    // Valid anonymous declarations parse.
    let module = parse_ok(concat!(
        "module \"m\"\nstage raw\n",
        "var @0: i32\n",
        "func @1: () -> i32 {\n",
        "'0():\n",
        "    %0.0 = literal 1: i32\n",
        "    return %0.0: i32\n",
        "}\n",
    ));
    assert!(matches!(module.global_by_index(1), Some(GlobalValue::Function(_))));
}

#[test]
fn rejects_bad_declaration_order() {
    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> void {\n'entry():\n    return\n}\n",
        "var @g: i32\n",
    ));
    assert!(matches!(error, ParseError::VariableAfterFunction { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "var @g: i32\n",
        "type $T = i32\n",
    ));
    assert!(matches!(error, ParseError::TypeDeclarationNotBeforeValues { .. }));
}

#[test]
fn rejects_symbol_errors() {
    let error = parse_err("module \"m\"\nstage raw\nfunc @f: i32\n");
    assert!(matches!(error, ParseError::NotFunctionType { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n'entry():\n    return %missing: i32\n}\n",
    ));
    assert!(matches!(error, ParseError::UndefinedIdentifier { .. }));

    let error = parse_err("module \"m\"\nstage raw\nvar @g: $Nope\n");
    assert!(matches!(error, ParseError::UndefinedNominalType { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n'entry():\n    %x = literal 1: i32\n    %x = literal 2: i32\n    return %x: i32\n}\n",
    ));
    assert!(matches!(error, ParseError::RedefinedIdentifier { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> void {\n'entry():\n    %x = trap\n}\n",
    ));
    assert!(matches!(error, ParseError::CannotNameVoidValue { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (i32) -> i32 {\n'entry(%x: i32):\n    return %x: f32\n}\n",
    ));
    assert!(matches!(error, ParseError::TypeMismatch { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "[extern] func @f: () -> i32 {\n'entry():\n    %x = literal 1: i32\n    return %x: i32\n}\n",
    ));
    assert!(matches!(error, ParseError::DeclarationCannotHaveBody { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> void {\n    return\n}\n",
    ));
    assert!(matches!(error, ParseError::NotInBasicBlock { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> f32 {\n'entry():\n    %x = builtin \"nope\"()\n    return %x: f32\n}\n",
    ));
    assert!(matches!(error, ParseError::UndefinedIntrinsic { .. }));

    let error = parse_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<2 x i32>) -> tensor<2 x i32> {\n'entry(%v: tensor<2 x i32>):\n",
        "    %r = reduce %v: tensor<2 x i32> by 7 init 0: i32 along 0\n",
        "    return %r: i32\n}\n",
    ));
    assert!(matches!(error, ParseError::InvalidReductionCombinator { .. }));
}

#[test]
fn single_line_form_with_semicolons_parses() {
    let module = parse_ok(
        "module \"m\" \n stage raw \n func @bar: () -> i32 { 'entry: %0.0 = literal 1: i32 ; %0.1 = literal 2: i32 ; return %0.0: i32 }",
    );
    let func = module.function_named("bar").unwrap();
    assert_eq!(module.function(func).instructions().count(), 3);
}
