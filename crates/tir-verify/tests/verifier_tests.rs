//! Verifier witnesses: each invariant has at least one input that
//! triggers exactly its error variant.

use tir_core::InstructionKind;
use tir_parser::parse_module;
use tir_verify::{VerificationError, verify_module};

fn parse(source: &str) -> tir_core::Module {
    parse_module(source).unwrap_or_else(|e| panic!("parse failed: {e}\n{source}"))
}

fn verify_err(source: &str) -> VerificationError {
    let module = parse(source);
    match verify_module(&module) {
        Ok(()) => panic!("expected verification to fail:\n{source}"),
        Err(error) => error,
    }
}

#[test]
fn accepts_well_formed_module() {
    let module = parse(concat!(
        "module \"ok\"\nstage raw\n",
        "struct $P {\n    #x: i32\n}\n",
        "var @g: i32\n",
        "func @f: (i32) -> i32 {\n",
        "'entry(%x: i32):\n",
        "    %s = literal {#x = %x: i32}: $P\n",
        "    %y = extract #x from %s: $P\n",
        "    store %y: i32 to @g: *i32\n",
        "    return %y: i32\n",
        "}\n",
    ));
    verify_module(&module).unwrap();
}

#[test]
fn rejects_use_before_definition() {
    let error = verify_err(
        "module \"m\" \n stage raw \n func @g: () -> i32 { 'entry: return %0.1: i32 ; %0.1 = literal 0: i32 }",
    );
    assert!(matches!(error, VerificationError::UseBeforeDef { .. }), "got {error:?}");
}

#[test]
fn rejects_return_type_mismatch() {
    // The annotation matches the definition, so parsing succeeds; the
    // function-level return check rejects it.
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (i32) -> bool {\n",
        "'entry(%x: i32):\n",
        "    return %x: i32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::ReturnTypeMismatch { .. }), "got {error:?}");
}

#[test]
fn checks_convolution_channel_grouping() {
    let good = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<1x4x8x8 x f32>, tensor<8x2x3x3 x f32>) -> tensor<1x8x8x8 x f32> {\n",
        "'entry(%img: tensor<1x4x8x8 x f32>, %k: tensor<8x2x3x3 x f32>):\n",
        "    %c = convolve %img: tensor<1x4x8x8 x f32> kernel %k: tensor<8x2x3x3 x f32> strides 1, 1 padding (1, 1), (1, 1) leftDilation 1, 1 rightDilation 1, 1 groups 2\n",
        "    return %c: tensor<1x8x8x8 x f32>\n",
        "}\n",
    ));
    verify_module(&good).unwrap();

    // groups=3 breaks the channel grouping: 4 / 3 != 2.
    let module = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<1x4x8x8 x f32>, tensor<8x2x3x3 x f32>) -> void {\n",
        "'entry(%img: tensor<1x4x8x8 x f32>, %k: tensor<8x2x3x3 x f32>):\n",
        "    convolve %img: tensor<1x4x8x8 x f32> kernel %k: tensor<8x2x3x3 x f32> strides 1, 1 padding (1, 1), (1, 1) leftDilation 1, 1 rightDilation 1, 1 groups 3\n",
        "    return\n",
        "}\n",
    ));
    let error = verify_module(&module).unwrap_err();
    assert!(matches!(error, VerificationError::ConvolutionInvalid { .. }), "got {error:?}");
}

#[test]
fn rejects_missing_terminator() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::MissingTerminator { .. }), "got {error:?}");
}

#[test]
fn rejects_terminator_before_last() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "    trap\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::TerminatorNotLast { .. }), "got {error:?}");
}

#[test]
fn rejects_empty_function_without_declaration_kind() {
    let error = verify_err("module \"m\"\nstage raw\nfunc @f: () -> void\n");
    assert!(matches!(error, VerificationError::EmptyBody { .. }), "got {error:?}");
}

#[test]
fn rejects_branch_argument_mismatch() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    branch 'exit(1.5: f32)\n",
        "'exit(%r: i32):\n",
        "    return %r: i32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::BranchArgumentMismatch { .. }), "got {error:?}");
}

#[test]
fn rejects_condition_that_is_not_bool() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (i32) -> void {\n",
        "'entry(%x: i32):\n",
        "    conditional %x: i32 then 'a() else 'a()\n",
        "'a():\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::ConditionNotBool { .. }), "got {error:?}");
}

#[test]
fn rejects_enum_case_mismatches() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "enum $E {\n    ?a\n    ?b(i32)\n}\n",
        "func @f: ($E) -> void {\n",
        "'entry(%e: $E):\n",
        "    branchEnum %e: $E case ?missing 'done\n",
        "'done():\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::UnknownEnumCase { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "enum $E {\n    ?a\n    ?b(i32)\n}\n",
        "func @f: ($E) -> void {\n",
        "'entry(%e: $E):\n",
        "    branchEnum %e: $E case ?b 'done\n",
        "'done():\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::EnumCaseArgumentMismatch { .. }), "got {error:?}");
}

#[test]
fn rejects_broadcast_incompatible_operands() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<2x3 x i32>, tensor<4x3 x i32>) -> void {\n",
        "'entry(%a: tensor<2x3 x i32>, %b: tensor<4x3 x i32>):\n",
        "    %c = add %a: tensor<2x3 x i32>, %b: tensor<4x3 x i32>\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::BroadcastIncompatible { .. }), "got {error:?}");
}

#[test]
fn rejects_data_type_and_cast_violations() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<2 x i32>, tensor<2 x f32>) -> void {\n",
        "'entry(%a: tensor<2 x i32>, %b: tensor<2 x f32>):\n",
        "    %c = add %a: tensor<2 x i32>, %b: tensor<2 x f32>\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::DataTypeMismatch { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<2 x f64>) -> void {\n",
        "'entry(%a: tensor<2 x f64>):\n",
        "    %c = dataTypeCast %a: tensor<2 x f64> to i32\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::CannotCastDataType { .. }), "got {error:?}");
}

#[test]
fn rejects_invalid_element_keys() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "struct $P {\n    #x: i32\n}\n",
        "func @f: ($P) -> i32 {\n",
        "'entry(%p: $P):\n",
        "    %0.0 = extract #missing from %p: $P\n",
        "    return 0: i32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::InvalidElementKeys { .. }), "got {error:?}");
}

#[test]
fn rejects_nested_aggregate_literal_operands() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> tensor<2 x i32> {\n",
        "'entry():\n",
        "    %n = negate <1: i32, 2: i32>: tensor<2 x i32>\n",
        "    return %n: tensor<2 x i32>\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::NestedAggregateLiteral { .. }), "got {error:?}");
}

#[test]
fn rejects_bad_literals() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> tensor<3 x i32> {\n",
        "'entry():\n",
        "    %t = literal <1: i32, 2: i32>: tensor<3 x i32>\n",
        "    return %t: tensor<3 x i32>\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::InvalidLiteral { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> f32 {\n",
        "'entry():\n",
        "    %x = literal 1.5: i32\n",
        "    return 0.0: f32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::InvalidLiteral { .. }), "got {error:?}");
}

#[test]
fn rejects_slice_and_shape_violations() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<4 x i32>) -> void {\n",
        "'entry(%v: tensor<4 x i32>):\n",
        "    %s = slice %v: tensor<4 x i32> from 2 upto 9\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::SliceOutOfRange { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<4 x i32>) -> void {\n",
        "'entry(%v: tensor<4 x i32>):\n",
        "    %s = shapeCast %v: tensor<4 x i32> to 3x2\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::ShapeSizeMismatch { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<4 x i32>) -> void {\n",
        "'entry(%v: tensor<4 x i32>):\n",
        "    %r = reverse %v: tensor<4 x i32> along 0, 0\n",
        "    return\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::DuplicateDimension { .. }), "got {error:?}");
}

#[test]
fn rejects_reduction_combinator_mismatch() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (tensor<4 x bool>) -> bool {\n",
        "'entry(%v: tensor<4 x bool>):\n",
        "    %r = reduce %v: tensor<4 x bool> by add init false: bool along 0\n",
        "    return false: bool\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::ReductionCombinatorMismatch { .. }), "got {error:?}");
}

#[test]
fn rejects_apply_argument_mismatches() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @callee: (i32) -> i32 {\n",
        "'entry(%x: i32):\n",
        "    return %x: i32\n",
        "}\n",
        "func @caller: (f32) -> i32 {\n",
        "'entry(%y: f32):\n",
        "    %r = apply @callee: (i32) -> i32(%y: f32)\n",
        "    return 0: i32\n",
        "}\n",
    ));
    assert!(matches!(error, VerificationError::ArgumentTypeMismatch { index: 0, .. }), "got {error:?}");
}

#[test]
fn rejects_adjoint_signature_mismatch() {
    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @primal: (f32) -> f32 {\n",
        "'entry(%x: f32):\n",
        "    return %x: f32\n",
        "}\n",
        "[adjoint @primal wrt 0] func @grad: (f32) -> i32\n",
    ));
    assert!(matches!(error, VerificationError::AdjointSignatureMismatch { .. }), "got {error:?}");

    let error = verify_err(concat!(
        "module \"m\"\nstage raw\n",
        "func @primal: (f32) -> f32 {\n",
        "'entry(%x: f32):\n",
        "    return %x: f32\n",
        "}\n",
        "[adjoint @primal wrt 3] func @grad: (f32) -> f32\n",
    ));
    assert!(matches!(error, VerificationError::AdjointConfigurationInvalid { .. }), "got {error:?}");
}

#[test]
fn accepts_adjoint_with_matching_signature() {
    let module = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @primal: (f32, f32) -> f32 {\n",
        "'entry(%x: f32, %y: f32):\n",
        "    %s = add %x: f32, %y: f32\n",
        "    return %s: f32\n",
        "}\n",
        "[adjoint @primal wrt 0, 1 seedable] func @grad: (f32, f32, f32) -> (f32, f32)\n",
    ));
    verify_module(&module).unwrap();
}

#[test]
fn dominance_holds_across_blocks() {
    // A value defined in a dominating block is usable in its successors.
    let module = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (bool) -> i32 {\n",
        "'entry(%c: bool):\n",
        "    %x = literal 7: i32\n",
        "    conditional %c: bool then 'a() else 'b()\n",
        "'a():\n",
        "    return %x: i32\n",
        "'b():\n",
        "    return %x: i32\n",
        "}\n",
    ));
    verify_module(&module).unwrap();

    // A value defined in one arm is not visible in the other.
    let module = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: (bool) -> i32 {\n",
        "'entry(%c: bool):\n",
        "    conditional %c: bool then 'a() else 'b()\n",
        "'a():\n",
        "    %x = literal 7: i32\n",
        "    branch 'b()\n",
        "'b():\n",
        "    return %x: i32\n",
        "}\n",
    ));
    let error = verify_module(&module).unwrap_err();
    assert!(matches!(error, VerificationError::UseBeforeDef { .. }), "got {error:?}");
}

#[test]
fn removing_a_used_instruction_leaves_a_dangling_use() {
    let mut module = parse(concat!(
        "module \"m\"\nstage raw\n",
        "func @f: () -> i32 {\n",
        "'entry():\n",
        "    %x = literal 1: i32\n",
        "    return %x: i32\n",
        "}\n",
    ));
    let func = module.function_ids()[0];
    let literal = module
        .function(func)
        .instructions()
        .find(|(_, inst)| matches!(inst.kind, InstructionKind::Literal(_, _)))
        .map(|(id, _)| id)
        .unwrap();
    module.function_mut(func).remove_instruction(literal);
    let error = verify_module(&module).unwrap_err();
    assert!(matches!(error, VerificationError::DanglingUse { .. }), "got {error:?}");
}
