//! Core data-model tests driven through the builder API: inference,
//! operand enumeration, substitution locality, and printing.

use tir_common::{DataType, TensorShape};
use tir_core::infer::{convolution_shape, reduce_window_shape};
use tir_core::{
    Definition, Function, InstructionKind, Literal, Module, Number, NumericBinaryOp, Padding,
    Stage, StructType, Type, Use, default_registry,
};

fn i32_scalar() -> Type {
    Type::scalar(DataType::Int(32))
}

fn int_lit(value: i64) -> Use {
    Use::Literal(i32_scalar(), Literal::Scalar(Number::Int(value)))
}

fn empty_module() -> Module {
    Module::new("m", Stage::Raw, default_registry())
}

#[test]
fn builder_and_inference_agree() {
    let mut module = empty_module();
    let mut function = Function::new(Some("f".into()), vec![i32_scalar()], i32_scalar());
    let entry = function.append_block(Some("entry".into()));
    let x = function.append_argument(entry, Some("x".into()), i32_scalar());
    let sum = function.append_instruction(
        entry,
        Some("sum".into()),
        InstructionKind::NumericBinary(NumericBinaryOp::Add, Use::argument(x), int_lit(1)),
    );
    function.append_instruction(
        entry,
        None,
        InstructionKind::Return(Some(Use::instruction(sum))),
    );
    let func = module.add_function(function);

    let function = module.function(func);
    assert_eq!(function.instruction(sum).ty(&module, function), i32_scalar());
    assert_eq!(
        Use::instruction(sum).ty(&module, function),
        i32_scalar()
    );
    assert_eq!(function.terminator(entry), Some(function.block(entry).insts()[1]));
}

#[test]
fn broadcasting_inference_widens_shapes() {
    let mut module = empty_module();
    let tensor_ty = Type::Tensor(TensorShape::new([2, 3]), DataType::Int(32));
    let mut function = Function::new(Some("f".into()), vec![tensor_ty.clone()], tensor_ty.clone());
    let entry = function.append_block(None);
    let v = function.append_argument(entry, None, tensor_ty.clone());
    let add = function.append_instruction(
        entry,
        None,
        InstructionKind::NumericBinary(NumericBinaryOp::Add, Use::argument(v), int_lit(5)),
    );
    function.append_instruction(
        entry,
        None,
        InstructionKind::Return(Some(Use::instruction(add))),
    );
    let func = module.add_function(function);
    let function = module.function(func);
    assert_eq!(function.instruction(add).ty(&module, function), tensor_ty);
}

#[test]
fn inference_rejects_mismatched_data_types() {
    let mut module = empty_module();
    let mut function = Function::new(None, vec![], Type::Void);
    let entry = function.append_block(None);
    let bad = function.append_instruction(
        entry,
        None,
        InstructionKind::NumericBinary(
            NumericBinaryOp::Add,
            int_lit(1),
            Use::Literal(
                Type::scalar(DataType::Float(tir_common::FloatPrecision::Single)),
                Literal::Scalar(Number::Float(1.0)),
            ),
        ),
    );
    function.append_instruction(entry, None, InstructionKind::Return(None));
    let func = module.add_function(function);
    let function = module.function(func);
    assert!(function.instruction(bad).ty(&module, function).is_invalid());
}

#[test]
fn substitution_is_local_to_matching_positions() {
    let old = int_lit(1);
    let other = int_lit(2);
    let new = int_lit(9);
    let mut kind =
        InstructionKind::NumericBinary(NumericBinaryOp::Add, old.clone(), other.clone());
    kind.substitute(&new, &old);
    match &kind {
        InstructionKind::NumericBinary(_, a, b) => {
            assert_eq!(a, &new);
            assert_eq!(b, &other);
        }
        _ => unreachable!(),
    }
}

#[test]
fn operand_enumeration_includes_nested_literal_uses() {
    let nested = int_lit(3);
    let kind = InstructionKind::Literal(
        Literal::Tuple(vec![nested.clone(), int_lit(4)]),
        Type::Tuple(vec![i32_scalar(), i32_scalar()]),
    );
    let operands = kind.operands();
    assert_eq!(operands.len(), 2);
    assert!(operands.contains(&nested));
}

#[test]
fn substitute_branches_rewires_only_matching_targets() {
    let mut module = empty_module();
    let mut function = Function::new(None, vec![Type::Bool], Type::Void);
    let entry = function.append_block(None);
    let c = function.append_argument(entry, None, Type::Bool);
    let a = function.append_block(Some("a".into()));
    let b = function.append_block(Some("b".into()));
    let cond = function.append_instruction(
        entry,
        None,
        InstructionKind::Conditional {
            condition: Use::argument(c),
            then_block: a,
            then_args: vec![],
            else_block: b,
            else_args: vec![],
        },
    );
    function.append_instruction(a, None, InstructionKind::Return(None));
    function.append_instruction(b, None, InstructionKind::Return(None));
    let replacement = function.append_block(Some("n".into()));
    function.append_instruction(replacement, None, InstructionKind::Return(None));

    function
        .instruction_mut(cond)
        .kind
        .substitute_branches(a, replacement);
    let targets = function.instruction(cond).kind.branch_targets();
    assert_eq!(targets.as_slice(), &[replacement, b]);
    let _ = module.add_function(function);
}

#[test]
fn element_type_navigates_nominal_types() {
    let mut module = empty_module();
    let mut fields = indexmap::IndexMap::new();
    fields.insert("weights".to_string(), Type::Tensor(TensorShape::new([4, 2]), DataType::Float(tir_common::FloatPrecision::Single)));
    fields.insert("count".to_string(), Type::scalar(DataType::Int(64)));
    let pair = module.add_struct(StructType {
        name: "Layer".to_string(),
        fields,
    });

    let ty = Type::Struct(pair);
    let weights = ty
        .element_type(&module, &[tir_core::ElementKey::Name("weights".into())])
        .unwrap();
    assert_eq!(
        weights,
        Type::Tensor(TensorShape::new([4, 2]), DataType::Float(tir_common::FloatPrecision::Single))
    );
    let row = ty
        .element_type(
            &module,
            &[
                tir_core::ElementKey::Name("weights".into()),
                tir_core::ElementKey::Index(1),
            ],
        )
        .unwrap();
    assert_eq!(
        row,
        Type::Tensor(TensorShape::new([2]), DataType::Float(tir_common::FloatPrecision::Single))
    );
    assert_eq!(
        ty.element_type(&module, &[tir_core::ElementKey::Name("missing".into())]),
        None
    );
}

#[test]
fn convolution_shape_matches_the_worked_example() {
    let lhs = TensorShape::new([1, 4, 8, 8]);
    let kernel = TensorShape::new([8, 2, 3, 3]);
    let out = convolution_shape(
        &lhs,
        &kernel,
        Some(&[1, 1]),
        Some(&[(1, 1), (1, 1)]),
        Some(&[1, 1]),
        Some(&[1, 1]),
        2,
    );
    assert_eq!(out, Some(TensorShape::new([1, 8, 8, 8])));

    // groups=3 breaks lhs.dim[1] / groups == kernel.dim[1].
    let bad = convolution_shape(
        &lhs,
        &kernel,
        Some(&[1, 1]),
        Some(&[(1, 1), (1, 1)]),
        Some(&[1, 1]),
        Some(&[1, 1]),
        3,
    );
    assert_eq!(bad, None);
}

#[test]
fn reduce_window_shapes() {
    let input = TensorShape::new([6, 6]);
    let dims = TensorShape::new([2, 2]);
    assert_eq!(
        reduce_window_shape(&input, &dims, &[2, 2], Padding::None),
        Some(TensorShape::new([3, 3]))
    );
    assert_eq!(
        reduce_window_shape(&input, &dims, &[1, 1], Padding::Half),
        Some(TensorShape::new([6, 6]))
    );
    assert_eq!(reduce_window_shape(&input, &dims, &[0, 1], Padding::None), None);
    assert_eq!(
        reduce_window_shape(&input, &TensorShape::new([2]), &[1], Padding::None),
        None
    );
}

#[test]
fn printing_renders_builder_output() {
    let mut module = empty_module();
    let mut function = Function::new(Some("id".into()), vec![i32_scalar()], i32_scalar());
    let entry = function.append_block(Some("entry".into()));
    let x = function.append_argument(entry, Some("x".into()), i32_scalar());
    function.append_instruction(
        entry,
        None,
        InstructionKind::Return(Some(Use::argument(x))),
    );
    module.add_function(function);

    let printed = module.display().to_string();
    assert!(printed.contains("module \"m\""), "{printed}");
    assert!(printed.contains("stage raw"), "{printed}");
    assert!(printed.contains("func @id: (i32) -> i32 {"), "{printed}");
    assert!(printed.contains("'entry(%x: i32):"), "{printed}");
    assert!(printed.contains("    return %x: i32"), "{printed}");
}

#[test]
fn fresh_names_avoid_collisions() {
    let mut module = empty_module();
    let mut function = Function::new(Some("f".into()), vec![], Type::Void);
    let entry = function.append_block(Some("bb".into()));
    function.append_instruction(entry, None, InstructionKind::Return(None));
    assert_eq!(function.make_fresh_name("x"), "x");
    assert_eq!(function.make_fresh_name("bb"), "bb_0");
    module.add_function(function);
    assert_eq!(module.make_fresh_global_name("f"), "f_0");
    assert_eq!(module.make_fresh_global_name("g"), "g");
}

#[test]
fn variable_uses_are_pointers() {
    let mut module = empty_module();
    let var = module.add_variable(tir_core::Variable {
        name: Some("g".into()),
        ty: i32_scalar(),
    });
    let function = Function::new(None, vec![], Type::Void);
    let func = module.add_function(function);
    let function = module.function(func);
    assert_eq!(
        Use::Definition(Definition::Variable(var)).ty(&module, function),
        Type::pointer(i32_scalar())
    );
}
