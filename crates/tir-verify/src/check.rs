//! Per-instruction typing checks.
//!
//! These mirror the inference rules but produce the precise error for
//! the violated precondition instead of `Type::Invalid`.

use tir_common::DataType;
use tir_core::infer::{combinator_matches, convolution_shape, reduce_window_shape};
use tir_core::{
    BlockId, ElementKey, Function, InstId, InstructionKind, Literal, Module, Number,
    ReductionCombinator, Type, Use,
};

use crate::VerificationError;

type Check = Result<(), VerificationError>;

pub(crate) fn verify_instruction(
    module: &Module,
    function: &Function,
    inst: InstId,
) -> Check {
    let instruction = function.instruction(inst);
    let kind = &instruction.kind;

    if instruction.name.is_some() && instruction.ty(module, function).is_void() {
        return Err(VerificationError::NamedVoid { inst });
    }

    // Aggregate literals may only appear as the payload of `literal`.
    if !matches!(kind, InstructionKind::Literal(_, _)) {
        for operand in kind.operands() {
            if let Use::Literal(_, literal) = &operand {
                if literal.is_aggregate() {
                    return Err(VerificationError::NestedAggregateLiteral { inst });
                }
            }
        }
    }

    let checker = InstChecker {
        module,
        function,
        inst,
    };
    checker.check_kind(kind)
}

struct InstChecker<'a> {
    module: &'a Module,
    function: &'a Function,
    inst: InstId,
}

impl<'a> InstChecker<'a> {
    fn ty_of(&self, value: &Use) -> Type {
        value.ty(self.module, self.function)
    }

    fn tensor_of(&self, value: &Use) -> Result<(tir_common::TensorShape, DataType), VerificationError> {
        self.ty_of(value)
            .unaliased(self.module)
            .tensor_type()
            .ok_or(VerificationError::NotTensor { inst: self.inst })
    }

    fn check_dims(&self, dims: &[usize], rank: usize) -> Check {
        for (i, &dim) in dims.iter().enumerate() {
            if dim >= rank {
                return Err(VerificationError::AxisOutOfRange {
                    inst: self.inst,
                    axis: dim,
                });
            }
            if dims[..i].contains(&dim) {
                return Err(VerificationError::DuplicateDimension { inst: self.inst });
            }
        }
        Ok(())
    }

    fn check_combinator(&self, combinator: &ReductionCombinator, dtype: DataType) -> Check {
        if let ReductionCombinator::NumericBuiltin(name) = combinator {
            if self.module.intrinsics().intrinsic(name).is_none() {
                return Err(VerificationError::UndefinedIntrinsic { name: name.clone() });
            }
        }
        if combinator_matches(combinator, dtype, self.module, self.function) {
            Ok(())
        } else {
            Err(VerificationError::ReductionCombinatorMismatch { inst: self.inst })
        }
    }

    fn check_initial(&self, initial: &Use, dtype: DataType) -> Check {
        if self.ty_of(initial) == Type::scalar(dtype) {
            Ok(())
        } else {
            Err(VerificationError::DataTypeMismatch { inst: self.inst })
        }
    }

    fn check_value_keys(&self, keys: &[ElementKey]) -> Check {
        for key in keys {
            if let ElementKey::Value(index) = key {
                let is_int_scalar = matches!(
                    self.ty_of(index).unaliased(self.module).tensor_type(),
                    Some((shape, DataType::Int(_))) if shape.is_scalar()
                );
                if !is_int_scalar {
                    return Err(VerificationError::ElementKeyNotInteger { inst: self.inst });
                }
            }
        }
        Ok(())
    }

    fn check_destination(&self, block: BlockId, args: &[Use]) -> Check {
        if !self.function.contains_block(block) {
            return Err(VerificationError::BranchTargetInvalid {
                inst: self.inst,
                block,
            });
        }
        let expected = self.function.block_argument_types(block);
        if expected.len() != args.len() {
            return Err(VerificationError::BranchArgumentMismatch {
                inst: self.inst,
                block,
            });
        }
        for (arg, expected) in args.iter().zip(&expected) {
            if !self.ty_of(arg).conforms_to(expected, self.module) {
                return Err(VerificationError::BranchArgumentMismatch {
                    inst: self.inst,
                    block,
                });
            }
        }
        Ok(())
    }

    fn check_type_operand(&self, ty: &Type) -> Check {
        if ty.is_valid(self.module, false) {
            Ok(())
        } else {
            Err(VerificationError::InvalidType {
                ty: ty.display(self.module).to_string(),
                context: "instruction".to_string(),
            })
        }
    }

    fn check_kind(&self, kind: &InstructionKind) -> Check {
        let inst = self.inst;
        match kind {
            InstructionKind::Literal(literal, ty) => {
                self.check_type_operand(ty)?;
                self.check_literal(literal, ty)
            }

            InstructionKind::NumericUnary(_, v) => {
                let (_, dtype) = self.tensor_of(v)?;
                if !dtype.is_numeric() {
                    return Err(VerificationError::NotNumeric { inst });
                }
                Ok(())
            }

            InstructionKind::NumericBinary(_, a, b) | InstructionKind::Compare(_, a, b) => {
                let (sa, da) = self.tensor_of(a)?;
                let (sb, db) = self.tensor_of(b)?;
                if da != db {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if !da.is_numeric() {
                    return Err(VerificationError::NotNumeric { inst });
                }
                if sa.broadcast(&sb).is_none() {
                    return Err(VerificationError::BroadcastIncompatible { inst });
                }
                Ok(())
            }

            InstructionKind::BooleanBinary(_, a, b) => {
                let (sa, da) = self.tensor_of(a)?;
                let (sb, db) = self.tensor_of(b)?;
                if da != db {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if !da.is_bool() {
                    return Err(VerificationError::NotBool { inst });
                }
                if sa.broadcast(&sb).is_none() {
                    return Err(VerificationError::BroadcastIncompatible { inst });
                }
                Ok(())
            }

            InstructionKind::Not(v) => {
                let (_, dtype) = self.tensor_of(v)?;
                if !dtype.is_bool() {
                    return Err(VerificationError::NotBool { inst });
                }
                Ok(())
            }

            InstructionKind::Dot(a, b) => {
                let (sa, da) = self.tensor_of(a)?;
                let (sb, db) = self.tensor_of(b)?;
                if da != db {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if !da.is_numeric() {
                    return Err(VerificationError::NotNumeric { inst });
                }
                let defined = sa.matrix_multiplied(&sb).is_some()
                    || (sa.is_vector() && sa == sb);
                if !defined {
                    return Err(VerificationError::BroadcastIncompatible { inst });
                }
                Ok(())
            }

            InstructionKind::Concatenate(values, axis) => {
                let Some(first) = values.first() else {
                    return Err(VerificationError::NotTensor { inst });
                };
                let (mut shape, dtype) = self.tensor_of(first)?;
                if *axis >= shape.rank() {
                    return Err(VerificationError::AxisOutOfRange {
                        inst,
                        axis: *axis,
                    });
                }
                for value in &values[1..] {
                    let (next, next_dtype) = self.tensor_of(value)?;
                    if next_dtype != dtype {
                        return Err(VerificationError::DataTypeMismatch { inst });
                    }
                    shape = shape
                        .concatenating(&next, *axis)
                        .ok_or(VerificationError::BroadcastIncompatible { inst })?;
                }
                Ok(())
            }

            InstructionKind::Transpose(v)
            | InstructionKind::Rank(v)
            | InstructionKind::Shape(v)
            | InstructionKind::UnitCount(v) => {
                self.tensor_of(v)?;
                Ok(())
            }

            InstructionKind::Reverse(v, dims) => {
                let (shape, _) = self.tensor_of(v)?;
                self.check_dims(dims, shape.rank())
            }

            InstructionKind::Slice(v, lower, upper) => {
                let (shape, _) = self.tensor_of(v)?;
                if shape.is_scalar() {
                    return Err(VerificationError::NotTensor { inst });
                }
                if lower > upper || *upper >= shape[0] {
                    return Err(VerificationError::SliceOutOfRange { inst });
                }
                Ok(())
            }

            InstructionKind::Random(_, lo, hi) => {
                let (sl, dl) = self.tensor_of(lo)?;
                let (sh, dh) = self.tensor_of(hi)?;
                if !sl.is_scalar() || !sh.is_scalar() || dl != dh || !dl.is_numeric() {
                    return Err(VerificationError::RandomBoundsMismatch { inst });
                }
                Ok(())
            }

            InstructionKind::Select(left, right, flags) => {
                let (sl, dl) = self.tensor_of(left)?;
                let (sr, dr) = self.tensor_of(right)?;
                let (sf, df) = self.tensor_of(flags)?;
                if dl != dr {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if !df.is_bool() {
                    return Err(VerificationError::NotBool { inst });
                }
                if sl.broadcast(&sr).and_then(|s| s.broadcast(&sf)).is_none() {
                    return Err(VerificationError::BroadcastIncompatible { inst });
                }
                Ok(())
            }

            InstructionKind::Reduce(combinator, v, initial, dims) => {
                let (shape, dtype) = self.tensor_of(v)?;
                self.check_combinator(combinator, dtype)?;
                self.check_initial(initial, dtype)?;
                self.check_dims(dims, shape.rank())
            }

            InstructionKind::Scan(combinator, v, dims) => {
                let (shape, dtype) = self.tensor_of(v)?;
                self.check_combinator(combinator, dtype)?;
                self.check_dims(dims, shape.rank())
            }

            InstructionKind::ReduceWindow(combinator, v, initial, dims, strides, padding) => {
                let (shape, dtype) = self.tensor_of(v)?;
                self.check_combinator(combinator, dtype)?;
                self.check_initial(initial, dtype)?;
                if reduce_window_shape(&shape, dims, strides, *padding).is_none() {
                    return Err(VerificationError::WindowInvalid { inst });
                }
                Ok(())
            }

            InstructionKind::Convolve {
                lhs,
                kernel,
                strides,
                padding,
                left_dilation,
                right_dilation,
                groups,
            } => {
                let (sl, dl) = self.tensor_of(lhs)?;
                let (sk, dk) = self.tensor_of(kernel)?;
                if dl != dk {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if !dl.is_numeric() {
                    return Err(VerificationError::NotNumeric { inst });
                }
                let shape = convolution_shape(
                    &sl,
                    &sk,
                    strides.as_deref(),
                    padding.as_deref(),
                    left_dilation.as_deref(),
                    right_dilation.as_deref(),
                    groups.unwrap_or(1),
                );
                if shape.is_none() {
                    return Err(VerificationError::ConvolutionInvalid { inst });
                }
                Ok(())
            }

            InstructionKind::PadShape(v, at) => {
                let (shape, _) = self.tensor_of(v)?;
                if *at > shape.rank() {
                    return Err(VerificationError::AxisOutOfRange { inst, axis: *at });
                }
                Ok(())
            }

            InstructionKind::SqueezeShape(v, at) => {
                let (shape, _) = self.tensor_of(v)?;
                if *at >= shape.rank() || shape[*at] != 1 {
                    return Err(VerificationError::AxisOutOfRange { inst, axis: *at });
                }
                Ok(())
            }

            InstructionKind::ShapeCast(v, shape) => {
                let (current, _) = self.tensor_of(v)?;
                if current.contiguous_size() != shape.contiguous_size() {
                    return Err(VerificationError::ShapeSizeMismatch { inst });
                }
                Ok(())
            }

            InstructionKind::BitCast(_, ty) => self.check_type_operand(ty),

            InstructionKind::DataTypeCast(v, target) => {
                let (_, dtype) = self.tensor_of(v)?;
                if !dtype.can_cast(*target) {
                    return Err(VerificationError::CannotCastDataType { inst });
                }
                Ok(())
            }

            InstructionKind::Extract { from, keys } => {
                self.check_value_keys(keys)?;
                if self.ty_of(from).element_type(self.module, keys).is_none() {
                    return Err(VerificationError::InvalidElementKeys { inst });
                }
                Ok(())
            }

            InstructionKind::Insert { source, to, keys } => {
                self.check_value_keys(keys)?;
                let Some(element) = self.ty_of(to).element_type(self.module, keys) else {
                    return Err(VerificationError::InvalidElementKeys { inst });
                };
                if self.ty_of(source).unaliased(self.module) != element {
                    return Err(VerificationError::InsertTypeMismatch { inst });
                }
                Ok(())
            }

            InstructionKind::Apply(callee, arguments) => {
                let callee_ty = self.ty_of(callee).unaliased(self.module);
                let signature = match &callee_ty {
                    Type::Function(params, result) => Some((params.clone(), result.clone())),
                    Type::Pointer(element) => match element.as_ref() {
                        Type::Function(params, result) => Some((params.clone(), result.clone())),
                        _ => None,
                    },
                    _ => None,
                };
                let Some((params, _)) = signature else {
                    return Err(VerificationError::CalleeNotFunction { inst });
                };
                if params.len() != arguments.len() {
                    return Err(VerificationError::ArgumentCountMismatch { inst });
                }
                for (index, (param, argument)) in params.iter().zip(arguments).enumerate() {
                    if !self.ty_of(argument).conforms_to(param, self.module) {
                        return Err(VerificationError::ArgumentTypeMismatch { inst, index });
                    }
                }
                Ok(())
            }

            InstructionKind::AllocateStack(ty, count) => {
                self.check_type_operand(ty)?;
                if *count == 0 {
                    return Err(VerificationError::AllocationCountInvalid { inst });
                }
                Ok(())
            }

            InstructionKind::AllocateHeap(ty, count) => {
                self.check_type_operand(ty)?;
                if self.ty_of(count) != Type::scalar(DataType::Int(64)) {
                    return Err(VerificationError::AllocationCountInvalid { inst });
                }
                Ok(())
            }

            InstructionKind::AllocateBox(ty) => self.check_type_operand(ty),

            InstructionKind::ProjectBox(v) => match self.ty_of(v).unaliased(self.module) {
                Type::Box(_) => Ok(()),
                _ => Err(VerificationError::NotBox { inst }),
            },

            InstructionKind::Load(pointer) => {
                match self.ty_of(pointer).unaliased(self.module) {
                    Type::Pointer(_) => Ok(()),
                    _ => Err(VerificationError::NotPointer { inst }),
                }
            }

            InstructionKind::Store(value, pointer) => {
                match self.ty_of(pointer).unaliased(self.module) {
                    Type::Pointer(element) => {
                        if *element != self.ty_of(value).unaliased(self.module) {
                            return Err(VerificationError::StoreTypeMismatch { inst });
                        }
                        Ok(())
                    }
                    _ => Err(VerificationError::NotPointer { inst }),
                }
            }

            InstructionKind::ElementPointer(pointer, keys) => {
                self.check_value_keys(keys)?;
                match self.ty_of(pointer).unaliased(self.module) {
                    Type::Pointer(element) => {
                        if element.element_type(self.module, keys).is_none() {
                            return Err(VerificationError::InvalidElementKeys { inst });
                        }
                        Ok(())
                    }
                    _ => Err(VerificationError::NotPointer { inst }),
                }
            }

            InstructionKind::Copy { from, to, count } => {
                let from_ty = self.ty_of(from).unaliased(self.module);
                let to_ty = self.ty_of(to).unaliased(self.module);
                let from_element = from_ty.as_pointer().or_else(|| from_ty.as_box());
                let to_element = to_ty.as_pointer().or_else(|| to_ty.as_box());
                let (Some(a), Some(b)) = (from_element, to_element) else {
                    return Err(VerificationError::NotPointer { inst });
                };
                if a != b {
                    return Err(VerificationError::DataTypeMismatch { inst });
                }
                if self.ty_of(count) != Type::scalar(DataType::Int(64)) {
                    return Err(VerificationError::CopyCountInvalid { inst });
                }
                let involves_box = from_ty.as_box().is_some() || to_ty.as_box().is_some();
                let count_is_one =
                    matches!(count, Use::Literal(_, Literal::Scalar(Number::Int(1))));
                if involves_box && !count_is_one {
                    return Err(VerificationError::CopyCountInvalid { inst });
                }
                Ok(())
            }

            InstructionKind::CreateStack | InstructionKind::Trap => Ok(()),

            InstructionKind::DestroyStack(stack) | InstructionKind::Push(_, stack) => {
                match self.ty_of(stack).unaliased(self.module) {
                    Type::Stack => Ok(()),
                    _ => Err(VerificationError::NotStack { inst }),
                }
            }

            InstructionKind::Pop(ty, stack) => {
                self.check_type_operand(ty)?;
                match self.ty_of(stack).unaliased(self.module) {
                    Type::Stack => Ok(()),
                    _ => Err(VerificationError::NotStack { inst }),
                }
            }

            InstructionKind::Retain(v) | InstructionKind::Release(v) => {
                match self.ty_of(v).unaliased(self.module) {
                    Type::Box(_) => Ok(()),
                    _ => Err(VerificationError::NotBox { inst }),
                }
            }

            InstructionKind::Deallocate(v) => match self.ty_of(v).unaliased(self.module) {
                Type::Pointer(_) | Type::Box(_) => Ok(()),
                _ => Err(VerificationError::NotPointer { inst }),
            },

            InstructionKind::Branch(target, args) => self.check_destination(*target, args),

            InstructionKind::Conditional {
                condition,
                then_block,
                then_args,
                else_block,
                else_args,
            } => {
                if self.ty_of(condition).unaliased(self.module) != Type::Bool {
                    return Err(VerificationError::ConditionNotBool { inst });
                }
                self.check_destination(*then_block, then_args)?;
                self.check_destination(*else_block, else_args)
            }

            InstructionKind::BranchEnum(value, cases) => {
                let Type::Enum(enum_id) = self.ty_of(value).unaliased(self.module) else {
                    return Err(VerificationError::NotEnum { inst });
                };
                let enum_type = self.module.enum_type(enum_id);
                for (case, block) in cases {
                    if !self.function.contains_block(*block) {
                        return Err(VerificationError::BranchTargetInvalid {
                            inst,
                            block: *block,
                        });
                    }
                    let Some(payload) = enum_type.cases.get(case) else {
                        return Err(VerificationError::UnknownEnumCase {
                            inst,
                            case: case.clone(),
                        });
                    };
                    if self.function.block_argument_types(*block) != *payload {
                        return Err(VerificationError::EnumCaseArgumentMismatch {
                            inst,
                            case: case.clone(),
                        });
                    }
                }
                Ok(())
            }

            InstructionKind::Return(value) => {
                let expected = self.function.return_type();
                match value {
                    None if expected.is_void() => Ok(()),
                    Some(v)
                        if !expected.is_void()
                            && self.ty_of(v).conforms_to(expected, self.module) =>
                    {
                        Ok(())
                    }
                    _ => Err(VerificationError::ReturnTypeMismatch {
                        inst,
                        expected: expected.display(self.module).to_string(),
                    }),
                }
            }

            InstructionKind::Builtin(name, arguments) => {
                let Some(intrinsic) = self.module.intrinsics().intrinsic(name) else {
                    return Err(VerificationError::UndefinedIntrinsic { name: name.clone() });
                };
                let argument_types: Vec<Type> =
                    arguments.iter().map(|a| self.ty_of(a)).collect();
                if intrinsic.result_type(&argument_types).is_invalid() {
                    return Err(VerificationError::IntrinsicArgumentsInvalid { inst });
                }
                Ok(())
            }
        }
    }

    // =========================================================================
    // Literal conformance
    // =========================================================================

    fn check_literal(&self, literal: &Literal, ty: &Type) -> Check {
        let inst = self.inst;
        let invalid = || VerificationError::InvalidLiteral { inst };
        let resolved = ty.unaliased(self.module);
        match literal {
            Literal::Undefined => Ok(()),
            Literal::Zero => match resolved.tensor_type() {
                Some(_) => Ok(()),
                None => Err(invalid()),
            },
            Literal::Null => match resolved {
                Type::Pointer(_) | Type::Box(_) => Ok(()),
                _ => Err(invalid()),
            },
            Literal::Bool(_) => match resolved.tensor_type() {
                Some((_, dtype)) if dtype.is_bool() => Ok(()),
                _ => Err(invalid()),
            },
            Literal::Scalar(Number::Int(_)) => match resolved.tensor_type() {
                Some((_, dtype)) if dtype.is_numeric() => Ok(()),
                _ => Err(invalid()),
            },
            Literal::Scalar(Number::Float(_)) => match resolved.tensor_type() {
                Some((_, DataType::Float(_))) => Ok(()),
                _ => Err(invalid()),
            },
            Literal::Tensor(elements) => {
                let Some((shape, dtype)) = resolved.tensor_type() else {
                    return Err(invalid());
                };
                if shape.is_scalar() || elements.len() != shape[0] {
                    return Err(invalid());
                }
                let element_ty = Type::tensor(
                    shape.dropping_dimension(0).ok_or_else(invalid)?,
                    dtype,
                );
                for element in elements {
                    self.check_element(element, &element_ty)?;
                }
                Ok(())
            }
            Literal::Tuple(elements) => {
                let Type::Tuple(types) = &resolved else {
                    return Err(invalid());
                };
                if elements.len() != types.len() {
                    return Err(invalid());
                }
                for (element, expected) in elements.iter().zip(types) {
                    self.check_element(element, expected)?;
                }
                Ok(())
            }
            Literal::Array(elements) => {
                let Type::Array(count, element_ty) = &resolved else {
                    return Err(invalid());
                };
                if elements.len() != *count {
                    return Err(invalid());
                }
                for element in elements {
                    self.check_element(element, element_ty)?;
                }
                Ok(())
            }
            Literal::Struct(fields) => {
                let Type::Struct(struct_id) = &resolved else {
                    return Err(invalid());
                };
                let struct_type = self.module.struct_type(*struct_id);
                if fields.len() != struct_type.fields.len() {
                    return Err(invalid());
                }
                for ((name, value), (expected_name, expected_ty)) in
                    fields.iter().zip(&struct_type.fields)
                {
                    if name != expected_name {
                        return Err(invalid());
                    }
                    self.check_element(value, expected_ty)?;
                }
                Ok(())
            }
            Literal::Case(case, payload) => {
                let Type::Enum(enum_id) = &resolved else {
                    return Err(invalid());
                };
                let enum_type = self.module.enum_type(*enum_id);
                let Some(expected) = enum_type.cases.get(case) else {
                    return Err(VerificationError::UnknownEnumCase {
                        inst,
                        case: case.clone(),
                    });
                };
                if payload.len() != expected.len() {
                    return Err(invalid());
                }
                for (value, expected_ty) in payload.iter().zip(expected) {
                    self.check_element(value, expected_ty)?;
                }
                Ok(())
            }
        }
    }

    fn check_element(&self, value: &Use, expected: &Type) -> Check {
        if !self.ty_of(value).conforms_to(expected, self.module) {
            return Err(VerificationError::InvalidLiteral { inst: self.inst });
        }
        if let Use::Literal(nested_ty, nested) = value {
            self.check_literal(nested, nested_ty)?;
        }
        Ok(())
    }
}
