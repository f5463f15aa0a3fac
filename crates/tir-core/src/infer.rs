//! Type inference for every instruction kind.
//!
//! Inference yields the result type or `Type::Invalid`; it never panics on
//! malformed operands. The verifier re-walks the same rules to produce
//! precise diagnostics, so this module stays a pure type function.

use tir_common::{DataType, TensorShape};

use crate::function::Function;
use crate::instruction::{InstructionKind, Padding};
use crate::module::Module;
use crate::ops::ReductionCombinator;
use crate::types::Type;
use crate::value::{Literal, Number, Use};

/// Infer the result type of an instruction kind.
pub fn infer_type(kind: &InstructionKind, module: &Module, function: &Function) -> Type {
    let ty = |u: &Use| u.ty(module, function);
    let tensor = |u: &Use| ty(u).tensor_type();

    match kind {
        InstructionKind::Literal(_, result) => result.clone(),

        InstructionKind::NumericUnary(_, v) => match tensor(v) {
            Some((shape, dtype)) if dtype.is_numeric() => Type::tensor(shape, dtype),
            _ => Type::Invalid,
        },

        InstructionKind::NumericBinary(_, a, b) => {
            binary_elementwise(tensor(a), tensor(b), |dtype| dtype.is_numeric(), None)
        }

        InstructionKind::BooleanBinary(_, a, b) => {
            binary_elementwise(tensor(a), tensor(b), |dtype| dtype.is_bool(), None)
        }

        InstructionKind::Compare(_, a, b) => binary_elementwise(
            tensor(a),
            tensor(b),
            |dtype| dtype.is_numeric(),
            Some(DataType::Bool),
        ),

        InstructionKind::Not(v) => match tensor(v) {
            Some((shape, DataType::Bool)) => Type::tensor(shape, DataType::Bool),
            _ => Type::Invalid,
        },

        InstructionKind::Dot(a, b) => match (tensor(a), tensor(b)) {
            (Some((sa, da)), Some((sb, db))) if da == db && da.is_numeric() => {
                if let Some(result) = sa.matrix_multiplied(&sb) {
                    Type::tensor(result, da)
                } else if sa.is_vector() && sa == sb {
                    Type::scalar(da)
                } else {
                    Type::Invalid
                }
            }
            _ => Type::Invalid,
        },

        InstructionKind::Concatenate(values, axis) => {
            let mut iter = values.iter();
            let Some(first) = iter.next().and_then(tensor) else {
                return Type::Invalid;
            };
            let (mut shape, dtype) = first;
            if *axis >= shape.rank() {
                return Type::Invalid;
            }
            for v in iter {
                match tensor(v) {
                    Some((next, d)) if d == dtype => match shape.concatenating(&next, *axis) {
                        Some(merged) => shape = merged,
                        None => return Type::Invalid,
                    },
                    _ => return Type::Invalid,
                }
            }
            Type::tensor(shape, dtype)
        }

        InstructionKind::Transpose(v) => match tensor(v) {
            Some((shape, dtype)) => Type::tensor(shape.transposed(), dtype),
            None => Type::Invalid,
        },

        InstructionKind::Reverse(v, dims) => match tensor(v) {
            Some((shape, dtype)) if dims_in_range_and_distinct(dims, shape.rank()) => {
                Type::tensor(shape, dtype)
            }
            _ => Type::Invalid,
        },

        InstructionKind::Slice(v, lower, upper) => match tensor(v) {
            Some((shape, dtype)) if !shape.is_scalar() && lower <= upper && *upper < shape[0] => {
                match shape.with_dimension(0, upper - lower + 1) {
                    Some(sliced) => Type::tensor(sliced, dtype),
                    None => Type::Invalid,
                }
            }
            _ => Type::Invalid,
        },

        InstructionKind::Random(shape, lo, hi) => match (tensor(lo), tensor(hi)) {
            (Some((sl, dl)), Some((sh, dh)))
                if sl.is_scalar() && sh.is_scalar() && dl == dh && dl.is_numeric() =>
            {
                Type::tensor(shape.clone(), dl)
            }
            _ => Type::Invalid,
        },

        InstructionKind::Select(left, right, flags) => {
            match (tensor(left), tensor(right), tensor(flags)) {
                (Some((sl, dl)), Some((sr, dr)), Some((sf, DataType::Bool))) if dl == dr => {
                    match sl.broadcast(&sr).and_then(|s| s.broadcast(&sf)) {
                        Some(shape) => Type::tensor(shape, dl),
                        None => Type::Invalid,
                    }
                }
                _ => Type::Invalid,
            }
        }

        InstructionKind::Reduce(combinator, v, initial, dims) => match tensor(v) {
            Some((shape, dtype))
                if combinator_matches(combinator, dtype, module, function)
                    && ty(initial) == Type::scalar(dtype)
                    && dims_in_range_and_distinct(dims, shape.rank()) =>
            {
                Type::tensor(shape.dropping_dimensions(dims), dtype)
            }
            _ => Type::Invalid,
        },

        InstructionKind::Scan(combinator, v, dims) => match tensor(v) {
            Some((shape, dtype))
                if combinator_matches(combinator, dtype, module, function)
                    && dims_in_range_and_distinct(dims, shape.rank()) =>
            {
                Type::tensor(shape, dtype)
            }
            _ => Type::Invalid,
        },

        InstructionKind::ReduceWindow(combinator, v, initial, dims, strides, padding) => {
            match tensor(v) {
                Some((shape, dtype))
                    if combinator_matches(combinator, dtype, module, function)
                        && ty(initial) == Type::scalar(dtype) =>
                {
                    match reduce_window_shape(&shape, dims, strides, *padding) {
                        Some(out) => Type::tensor(out, dtype),
                        None => Type::Invalid,
                    }
                }
                _ => Type::Invalid,
            }
        }

        InstructionKind::Convolve {
            lhs,
            kernel,
            strides,
            padding,
            left_dilation,
            right_dilation,
            groups,
        } => match (tensor(lhs), tensor(kernel)) {
            (Some((sl, dl)), Some((sk, dk))) if dl == dk && dl.is_numeric() => {
                match convolution_shape(
                    &sl,
                    &sk,
                    strides.as_deref(),
                    padding.as_deref(),
                    left_dilation.as_deref(),
                    right_dilation.as_deref(),
                    groups.unwrap_or(1),
                ) {
                    Some(out) => Type::tensor(out, dl),
                    None => Type::Invalid,
                }
            }
            _ => Type::Invalid,
        },

        InstructionKind::Rank(v) | InstructionKind::UnitCount(v) => match tensor(v) {
            Some(_) => Type::scalar(DataType::Int(64)),
            None => Type::Invalid,
        },

        InstructionKind::Shape(v) => match tensor(v) {
            Some((shape, _)) => {
                Type::tensor(TensorShape::new([shape.rank()]), DataType::Int(64))
            }
            None => Type::Invalid,
        },

        InstructionKind::PadShape(v, at) => match tensor(v) {
            Some((shape, dtype)) => match shape.padding_dimension(*at) {
                Some(padded) => Type::tensor(padded, dtype),
                None => Type::Invalid,
            },
            None => Type::Invalid,
        },

        InstructionKind::SqueezeShape(v, at) => match tensor(v) {
            Some((shape, dtype)) if *at < shape.rank() && shape[*at] == 1 => {
                match shape.dropping_dimension(*at) {
                    Some(squeezed) => Type::tensor(squeezed, dtype),
                    None => Type::Invalid,
                }
            }
            _ => Type::Invalid,
        },

        InstructionKind::ShapeCast(v, shape) => match tensor(v) {
            Some((current, dtype)) if current.contiguous_size() == shape.contiguous_size() => {
                Type::tensor(shape.clone(), dtype)
            }
            _ => Type::Invalid,
        },

        InstructionKind::BitCast(_, result) => result.clone(),

        InstructionKind::DataTypeCast(v, target) => match tensor(v) {
            Some((shape, dtype)) if dtype.can_cast(*target) => Type::tensor(shape, *target),
            _ => Type::Invalid,
        },

        InstructionKind::Extract { from, keys } => ty(from)
            .element_type(module, keys)
            .unwrap_or(Type::Invalid),

        InstructionKind::Insert { source, to, keys } => {
            let target = ty(to);
            match target.element_type(module, keys) {
                Some(element) if element == ty(source).unaliased(module) => target,
                _ => Type::Invalid,
            }
        }

        InstructionKind::Apply(callee, arguments) => {
            let callee_ty = ty(callee).unaliased(module);
            let signature = match &callee_ty {
                Type::Function(params, result) => Some((params, result)),
                Type::Pointer(element) => match element.as_ref() {
                    Type::Function(params, result) => Some((params, result)),
                    _ => None,
                },
                _ => None,
            };
            match signature {
                Some((params, result)) if params.len() == arguments.len() => {
                    for (param, argument) in params.iter().zip(arguments) {
                        if !ty(argument).conforms_to(param, module) {
                            return Type::Invalid;
                        }
                    }
                    (**result).clone()
                }
                _ => Type::Invalid,
            }
        }

        InstructionKind::AllocateStack(element, count) => {
            if *count > 0 {
                Type::pointer(element.clone())
            } else {
                Type::Invalid
            }
        }

        InstructionKind::AllocateHeap(element, count) => {
            if ty(count) == Type::scalar(DataType::Int(64)) {
                Type::pointer(element.clone())
            } else {
                Type::Invalid
            }
        }

        InstructionKind::AllocateBox(element) => Type::boxed(element.clone()),

        InstructionKind::ProjectBox(v) => match ty(v).unaliased(module) {
            Type::Box(element) => Type::Pointer(element),
            _ => Type::Invalid,
        },

        InstructionKind::Load(pointer) => match ty(pointer).unaliased(module) {
            Type::Pointer(element) => *element,
            _ => Type::Invalid,
        },

        InstructionKind::Store(value, pointer) => match ty(pointer).unaliased(module) {
            Type::Pointer(element) if *element == ty(value).unaliased(module) => Type::Void,
            _ => Type::Invalid,
        },

        InstructionKind::ElementPointer(pointer, keys) => match ty(pointer).unaliased(module) {
            Type::Pointer(element) => match element.element_type(module, keys) {
                Some(result) => Type::pointer(result),
                None => Type::Invalid,
            },
            _ => Type::Invalid,
        },

        InstructionKind::Copy { from, to, count } => {
            let from_ty = ty(from).unaliased(module);
            let to_ty = ty(to).unaliased(module);
            let from_element = from_ty.as_pointer().or_else(|| from_ty.as_box());
            let to_element = to_ty.as_pointer().or_else(|| to_ty.as_box());
            let involves_box = from_ty.as_box().is_some() || to_ty.as_box().is_some();
            match (from_element, to_element) {
                (Some(a), Some(b)) if a == b => {
                    if ty(count) != Type::scalar(DataType::Int(64)) {
                        return Type::Invalid;
                    }
                    if involves_box && !is_literal_one(count) {
                        return Type::Invalid;
                    }
                    Type::Void
                }
                _ => Type::Invalid,
            }
        }

        InstructionKind::CreateStack => Type::Stack,

        InstructionKind::DestroyStack(stack) | InstructionKind::Push(_, stack) => {
            match ty(stack).unaliased(module) {
                Type::Stack => Type::Void,
                _ => Type::Invalid,
            }
        }

        InstructionKind::Pop(element, stack) => match ty(stack).unaliased(module) {
            Type::Stack => element.clone(),
            _ => Type::Invalid,
        },

        InstructionKind::Retain(v) | InstructionKind::Release(v) => {
            match ty(v).unaliased(module) {
                Type::Box(_) => Type::Void,
                _ => Type::Invalid,
            }
        }

        InstructionKind::Deallocate(v) => match ty(v).unaliased(module) {
            Type::Pointer(_) | Type::Box(_) => Type::Void,
            _ => Type::Invalid,
        },

        InstructionKind::Branch(_, _)
        | InstructionKind::Conditional { .. }
        | InstructionKind::BranchEnum(_, _)
        | InstructionKind::Return(_)
        | InstructionKind::Trap => Type::Void,

        InstructionKind::Builtin(opcode, arguments) => {
            match module.intrinsics().intrinsic(opcode) {
                Some(intrinsic) => {
                    let argument_types: Vec<Type> = arguments.iter().map(ty).collect();
                    intrinsic.result_type(&argument_types)
                }
                None => Type::Invalid,
            }
        }
    }
}

/// Whether a reduction combinator fits values of the given data type.
pub fn combinator_matches(
    combinator: &ReductionCombinator,
    dtype: DataType,
    module: &Module,
    function: &Function,
) -> bool {
    let scalar = Type::scalar(dtype);
    match combinator {
        ReductionCombinator::Boolean(_) => dtype.is_bool(),
        ReductionCombinator::Numeric(_) => dtype.is_numeric(),
        ReductionCombinator::NumericBuiltin(opcode) => {
            dtype.is_numeric()
                && module
                    .intrinsics()
                    .intrinsic(opcode)
                    .map(|i| i.result_type(&[scalar.clone(), scalar.clone()]) == scalar)
                    .unwrap_or(false)
        }
        ReductionCombinator::Function(f) => {
            f.ty(module, function).unaliased(module)
                == Type::function(vec![scalar.clone(), scalar.clone()], scalar)
        }
    }
}

/// Output shape of `reduceWindow`.
pub fn reduce_window_shape(
    input: &TensorShape,
    dims: &TensorShape,
    strides: &[usize],
    padding: Padding,
) -> Option<TensorShape> {
    let rank = input.rank();
    if dims.rank() != rank || strides.len() != rank || rank == 0 {
        return None;
    }
    if strides.iter().any(|&s| s < 1) {
        return None;
    }
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let window = dims[i];
        if window == 0 {
            return None;
        }
        let padded = input[i] + padding.total(window);
        if window > padded {
            return None;
        }
        out.push((padded - window) / strides[i] + 1);
    }
    Some(TensorShape::new(out))
}

/// Output shape of `convolve`.
pub fn convolution_shape(
    lhs: &TensorShape,
    kernel: &TensorShape,
    strides: Option<&[usize]>,
    padding: Option<&[(usize, usize)]>,
    left_dilation: Option<&[usize]>,
    right_dilation: Option<&[usize]>,
    groups: usize,
) -> Option<TensorShape> {
    let rank = lhs.rank();
    if rank < 3 || kernel.rank() != rank {
        return None;
    }
    let spatial = rank - 2;
    let strides = fill_or_check(strides, spatial, 1)?;
    let left_dilation = fill_or_check(left_dilation, spatial, 1)?;
    let right_dilation = fill_or_check(right_dilation, spatial, 1)?;
    let padding = match padding {
        Some(p) if p.len() == spatial => p.to_vec(),
        Some(_) => return None,
        None => vec![(0, 0); spatial],
    };
    if strides.iter().any(|&s| s < 1) {
        return None;
    }
    if left_dilation.iter().any(|&d| d < 1) || right_dilation.iter().any(|&d| d < 1) {
        return None;
    }
    if groups < 1 || groups > kernel[0] {
        return None;
    }
    if lhs[1] / groups != kernel[1] {
        return None;
    }
    let mut out = Vec::with_capacity(rank);
    out.push(lhs[0]);
    out.push((kernel[0] / groups) * groups);
    for i in 0..spatial {
        let dilated_base = (lhs[i + 2].checked_sub(1)?) * left_dilation[i] + 1;
        let padded = padding[i].0 + dilated_base + padding[i].1;
        let dilated_window = (kernel[i + 2].checked_sub(1)?) * right_dilation[i] + 1;
        let dim = if dilated_window > padded {
            0
        } else {
            (padded - dilated_window) / strides[i] + 1
        };
        out.push(dim);
    }
    Some(TensorShape::new(out))
}

fn fill_or_check(values: Option<&[usize]>, len: usize, default: usize) -> Option<Vec<usize>> {
    match values {
        Some(v) if v.len() == len => Some(v.to_vec()),
        Some(_) => None,
        None => Some(vec![default; len]),
    }
}

fn binary_elementwise(
    a: Option<(TensorShape, DataType)>,
    b: Option<(TensorShape, DataType)>,
    dtype_ok: impl Fn(DataType) -> bool,
    result_dtype: Option<DataType>,
) -> Type {
    match (a, b) {
        (Some((sa, da)), Some((sb, db))) if da == db && dtype_ok(da) => {
            match sa.broadcast(&sb) {
                Some(shape) => Type::tensor(shape, result_dtype.unwrap_or(da)),
                None => Type::Invalid,
            }
        }
        _ => Type::Invalid,
    }
}

fn dims_in_range_and_distinct(dims: &[usize], rank: usize) -> bool {
    dims.iter().all(|&d| d < rank)
        && dims
            .iter()
            .enumerate()
            .all(|(i, d)| !dims[..i].contains(d))
}

fn is_literal_one(count: &Use) -> bool {
    matches!(count, Use::Literal(_, Literal::Scalar(Number::Int(1))))
}
