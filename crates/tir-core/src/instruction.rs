//! The instruction set.
//!
//! `InstructionKind` is the IR's central tagged variant. Operand
//! enumeration, substitution and branch rewiring are all derived from the
//! variant shape here; type inference lives in `infer`.

use smallvec::SmallVec;
use tir_common::{DataType, TensorShape};

use crate::entity::BlockId;
use crate::function::Function;
use crate::module::Module;
use crate::ops::{
    BooleanBinaryOp, ComparisonOp, NumericBinaryOp, NumericUnaryOp, ReductionCombinator,
};
use crate::types::{ElementKey, Type};
use crate::value::{Literal, Use};

/// Operand lists are usually short.
pub type Operands = SmallVec<[Use; 4]>;

/// Window padding rule for `reduceWindow`.
///
/// Total padding per spatial dimension: `none` adds 0, `half` adds
/// `window - 1`, `full` adds `2 * (window - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Padding {
    None,
    Half,
    Full,
}

impl Padding {
    pub const fn keyword(self) -> &'static str {
        match self {
            Padding::None => "none",
            Padding::Half => "half",
            Padding::Full => "full",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "none" => Some(Padding::None),
            "half" => Some(Padding::Half),
            "full" => Some(Padding::Full),
            _ => None,
        }
    }

    /// Total padding added around a window of the given size.
    pub const fn total(self, window: usize) -> usize {
        match self {
            Padding::None => 0,
            Padding::Half => window.saturating_sub(1),
            Padding::Full => 2 * window.saturating_sub(1),
        }
    }
}

/// An instruction in a basic block.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub name: Option<String>,
    pub kind: InstructionKind,
    pub(crate) block: BlockId,
}

impl Instruction {
    pub(crate) fn new(name: Option<String>, kind: InstructionKind, block: BlockId) -> Self {
        Instruction { name, kind, block }
    }

    /// The block this instruction belongs to.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The instruction's result type, derived from its kind.
    pub fn ty(&self, module: &Module, function: &Function) -> Type {
        crate::infer::infer_type(&self.kind, module, function)
    }
}

/// Every instruction kind in the IR.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    /// Materialise a literal of the given type.
    Literal(Literal, Type),
    NumericUnary(NumericUnaryOp, Use),
    NumericBinary(NumericBinaryOp, Use, Use),
    BooleanBinary(BooleanBinaryOp, Use, Use),
    Compare(ComparisonOp, Use, Use),
    Not(Use),
    Dot(Use, Use),
    /// Concatenate tensors along a dimension.
    Concatenate(Vec<Use>, usize),
    Transpose(Use),
    /// Reverse along the given dimensions.
    Reverse(Use, Vec<usize>),
    /// Slice the leading dimension, inclusive bounds.
    Slice(Use, usize, usize),
    /// Uniform random tensor between two scalar bounds.
    Random(TensorShape, Use, Use),
    /// Element-wise select: `left`, `right`, bool `flags`.
    Select(Use, Use, Use),
    /// Reduce over dimensions: combinator, value, initial, dimensions.
    Reduce(ReductionCombinator, Use, Use, Vec<usize>),
    /// Prefix scan over dimensions.
    Scan(ReductionCombinator, Use, Vec<usize>),
    /// Window reduction: combinator, value, initial, window dims, strides,
    /// padding rule.
    ReduceWindow(ReductionCombinator, Use, Use, TensorShape, Vec<usize>, Padding),
    Convolve {
        lhs: Use,
        kernel: Use,
        strides: Option<Vec<usize>>,
        padding: Option<Vec<(usize, usize)>>,
        left_dilation: Option<Vec<usize>>,
        right_dilation: Option<Vec<usize>>,
        groups: Option<usize>,
    },
    Rank(Use),
    Shape(Use),
    UnitCount(Use),
    /// Insert a size-1 dimension at an index.
    PadShape(Use, usize),
    /// Remove a size-1 dimension at an index.
    SqueezeShape(Use, usize),
    ShapeCast(Use, TensorShape),
    BitCast(Use, Type),
    DataTypeCast(Use, DataType),
    Extract {
        from: Use,
        keys: Vec<ElementKey>,
    },
    Insert {
        source: Use,
        to: Use,
        keys: Vec<ElementKey>,
    },
    Apply(Use, Vec<Use>),
    /// Stack allocation of `count` elements; count is a static literal.
    AllocateStack(Type, usize),
    AllocateHeap(Type, Use),
    AllocateBox(Type),
    ProjectBox(Use),
    Load(Use),
    /// `Store(value, pointer)`.
    Store(Use, Use),
    ElementPointer(Use, Vec<ElementKey>),
    Copy {
        from: Use,
        to: Use,
        count: Use,
    },
    CreateStack,
    DestroyStack(Use),
    /// `Push(value, stack)`.
    Push(Use, Use),
    /// `Pop(type, stack)`.
    Pop(Type, Use),
    Retain(Use),
    Release(Use),
    Deallocate(Use),
    Branch(BlockId, Vec<Use>),
    Conditional {
        condition: Use,
        then_block: BlockId,
        then_args: Vec<Use>,
        else_block: BlockId,
        else_args: Vec<Use>,
    },
    /// Dispatch on an enum value; each case's destination receives the
    /// case payload as block arguments.
    BranchEnum(Use, Vec<(String, BlockId)>),
    Return(Option<Use>),
    Trap,
    Builtin(String, Vec<Use>),
}

impl InstructionKind {
    /// The textual opcode of this kind.
    pub fn opcode(&self) -> &str {
        match self {
            InstructionKind::Literal(_, _) => "literal",
            InstructionKind::NumericUnary(op, _) => op.opcode(),
            InstructionKind::NumericBinary(op, _, _) => op.opcode(),
            InstructionKind::BooleanBinary(op, _, _) => op.opcode(),
            InstructionKind::Compare(op, _, _) => op.opcode(),
            InstructionKind::Not(_) => "not",
            InstructionKind::Dot(_, _) => "dot",
            InstructionKind::Concatenate(_, _) => "concatenate",
            InstructionKind::Transpose(_) => "transpose",
            InstructionKind::Reverse(_, _) => "reverse",
            InstructionKind::Slice(_, _, _) => "slice",
            InstructionKind::Random(_, _, _) => "random",
            InstructionKind::Select(_, _, _) => "select",
            InstructionKind::Reduce(_, _, _, _) => "reduce",
            InstructionKind::Scan(_, _, _) => "scan",
            InstructionKind::ReduceWindow(_, _, _, _, _, _) => "reduceWindow",
            InstructionKind::Convolve { .. } => "convolve",
            InstructionKind::Rank(_) => "rank",
            InstructionKind::Shape(_) => "shape",
            InstructionKind::UnitCount(_) => "unitCount",
            InstructionKind::PadShape(_, _) => "padShape",
            InstructionKind::SqueezeShape(_, _) => "squeezeShape",
            InstructionKind::ShapeCast(_, _) => "shapeCast",
            InstructionKind::BitCast(_, _) => "bitCast",
            InstructionKind::DataTypeCast(_, _) => "dataTypeCast",
            InstructionKind::Extract { .. } => "extract",
            InstructionKind::Insert { .. } => "insert",
            InstructionKind::Apply(_, _) => "apply",
            InstructionKind::AllocateStack(_, _) => "allocateStack",
            InstructionKind::AllocateHeap(_, _) => "allocateHeap",
            InstructionKind::AllocateBox(_) => "allocateBox",
            InstructionKind::ProjectBox(_) => "projectBox",
            InstructionKind::Load(_) => "load",
            InstructionKind::Store(_, _) => "store",
            InstructionKind::ElementPointer(_, _) => "elementPointer",
            InstructionKind::Copy { .. } => "copy",
            InstructionKind::CreateStack => "createStack",
            InstructionKind::DestroyStack(_) => "destroyStack",
            InstructionKind::Push(_, _) => "push",
            InstructionKind::Pop(_, _) => "pop",
            InstructionKind::Retain(_) => "retain",
            InstructionKind::Release(_) => "release",
            InstructionKind::Deallocate(_) => "deallocate",
            InstructionKind::Branch(_, _) => "branch",
            InstructionKind::Conditional { .. } => "conditional",
            InstructionKind::BranchEnum(_, _) => "branchEnum",
            InstructionKind::Return(_) => "return",
            InstructionKind::Trap => "trap",
            InstructionKind::Builtin(opcode, _) => opcode,
        }
    }

    /// Terminators end a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionKind::Branch(_, _)
                | InstructionKind::Conditional { .. }
                | InstructionKind::BranchEnum(_, _)
                | InstructionKind::Return(_)
                | InstructionKind::Trap
        )
    }

    /// Kinds that mutate memory or runtime state.
    pub fn must_write_to_memory(&self) -> bool {
        matches!(
            self,
            InstructionKind::Store(_, _)
                | InstructionKind::Copy { .. }
                | InstructionKind::Push(_, _)
                | InstructionKind::Pop(_, _)
                | InstructionKind::Deallocate(_)
                | InstructionKind::Retain(_)
                | InstructionKind::Release(_)
                | InstructionKind::DestroyStack(_)
        )
    }

    /// Enumerate every operand use, including uses nested in aggregate
    /// literals, reduction-combinator functions and dynamic element keys.
    pub fn operands(&self) -> Operands {
        let mut out = Operands::new();
        self.visit_uses(|u| u.collect_into(&mut out));
        out
    }

    /// Pointwise replacement of `old` by `new` across operand positions,
    /// including inside nested aggregate literals. Purely local to this
    /// one instruction.
    pub fn substitute(&mut self, new: &Use, old: &Use) {
        self.visit_uses_mut(|u| u.substitute(new, old));
    }

    /// Replace destination-block references to `old` with `new` within
    /// branch and conditional terminators.
    pub fn substitute_branches(&mut self, old: BlockId, new: BlockId) {
        match self {
            InstructionKind::Branch(target, _) => {
                if *target == old {
                    *target = new;
                }
            }
            InstructionKind::Conditional {
                then_block,
                else_block,
                ..
            } => {
                if *then_block == old {
                    *then_block = new;
                }
                if *else_block == old {
                    *else_block = new;
                }
            }
            _ => {}
        }
    }

    /// Successor blocks of a terminator; empty for non-terminators.
    pub fn branch_targets(&self) -> SmallVec<[BlockId; 2]> {
        let mut out = SmallVec::new();
        match self {
            InstructionKind::Branch(target, _) => out.push(*target),
            InstructionKind::Conditional {
                then_block,
                else_block,
                ..
            } => {
                out.push(*then_block);
                out.push(*else_block);
            }
            InstructionKind::BranchEnum(_, cases) => {
                out.extend(cases.iter().map(|(_, block)| *block));
            }
            _ => {}
        }
        out
    }

    fn visit_uses(&self, mut visit: impl FnMut(&Use)) {
        match self {
            InstructionKind::Literal(literal, _) => {
                // The top-level literal is not itself a use; only its
                // elements are. The visitor recurses further on its own.
                visit_literal_uses(literal, &mut visit);
            }
            InstructionKind::NumericUnary(_, a)
            | InstructionKind::Not(a)
            | InstructionKind::Transpose(a)
            | InstructionKind::Reverse(a, _)
            | InstructionKind::Slice(a, _, _)
            | InstructionKind::Rank(a)
            | InstructionKind::Shape(a)
            | InstructionKind::UnitCount(a)
            | InstructionKind::PadShape(a, _)
            | InstructionKind::SqueezeShape(a, _)
            | InstructionKind::ShapeCast(a, _)
            | InstructionKind::BitCast(a, _)
            | InstructionKind::DataTypeCast(a, _)
            | InstructionKind::ProjectBox(a)
            | InstructionKind::Load(a)
            | InstructionKind::AllocateHeap(_, a)
            | InstructionKind::DestroyStack(a)
            | InstructionKind::Pop(_, a)
            | InstructionKind::Retain(a)
            | InstructionKind::Release(a)
            | InstructionKind::Deallocate(a) => visit(a),
            InstructionKind::NumericBinary(_, a, b)
            | InstructionKind::BooleanBinary(_, a, b)
            | InstructionKind::Compare(_, a, b)
            | InstructionKind::Dot(a, b)
            | InstructionKind::Random(_, a, b)
            | InstructionKind::Store(a, b)
            | InstructionKind::Push(a, b) => {
                visit(a);
                visit(b);
            }
            InstructionKind::Select(a, b, c) => {
                visit(a);
                visit(b);
                visit(c);
            }
            InstructionKind::Concatenate(values, _) => {
                for v in values {
                    visit(v);
                }
            }
            InstructionKind::Reduce(combinator, value, initial, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
                visit(initial);
            }
            InstructionKind::Scan(combinator, value, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
            }
            InstructionKind::ReduceWindow(combinator, value, initial, _, _, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
                visit(initial);
            }
            InstructionKind::Convolve { lhs, kernel, .. } => {
                visit(lhs);
                visit(kernel);
            }
            InstructionKind::Extract { from, keys } => {
                visit(from);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::Insert { source, to, keys } => {
                visit(source);
                visit(to);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::ElementPointer(pointer, keys) => {
                visit(pointer);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::Apply(callee, arguments) => {
                visit(callee);
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::Copy { from, to, count } => {
                visit(from);
                visit(to);
                visit(count);
            }
            InstructionKind::Branch(_, arguments) => {
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::Conditional {
                condition,
                then_args,
                else_args,
                ..
            } => {
                visit(condition);
                for a in then_args {
                    visit(a);
                }
                for a in else_args {
                    visit(a);
                }
            }
            InstructionKind::BranchEnum(value, _) => visit(value),
            InstructionKind::Return(value) => {
                if let Some(v) = value {
                    visit(v);
                }
            }
            InstructionKind::Builtin(_, arguments) => {
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::AllocateStack(_, _)
            | InstructionKind::AllocateBox(_)
            | InstructionKind::CreateStack
            | InstructionKind::Trap => {}
        }
    }

    fn visit_uses_mut(&mut self, mut visit: impl FnMut(&mut Use)) {
        match self {
            InstructionKind::Literal(literal, _) => {
                // Substitution inside the literal is handled by the use
                // walker on each nested element.
                visit_literal_uses_mut(literal, &mut visit);
            }
            InstructionKind::NumericUnary(_, a)
            | InstructionKind::Not(a)
            | InstructionKind::Transpose(a)
            | InstructionKind::Reverse(a, _)
            | InstructionKind::Slice(a, _, _)
            | InstructionKind::Rank(a)
            | InstructionKind::Shape(a)
            | InstructionKind::UnitCount(a)
            | InstructionKind::PadShape(a, _)
            | InstructionKind::SqueezeShape(a, _)
            | InstructionKind::ShapeCast(a, _)
            | InstructionKind::BitCast(a, _)
            | InstructionKind::DataTypeCast(a, _)
            | InstructionKind::ProjectBox(a)
            | InstructionKind::Load(a)
            | InstructionKind::AllocateHeap(_, a)
            | InstructionKind::DestroyStack(a)
            | InstructionKind::Pop(_, a)
            | InstructionKind::Retain(a)
            | InstructionKind::Release(a)
            | InstructionKind::Deallocate(a) => visit(a),
            InstructionKind::NumericBinary(_, a, b)
            | InstructionKind::BooleanBinary(_, a, b)
            | InstructionKind::Compare(_, a, b)
            | InstructionKind::Dot(a, b)
            | InstructionKind::Random(_, a, b)
            | InstructionKind::Store(a, b)
            | InstructionKind::Push(a, b) => {
                visit(a);
                visit(b);
            }
            InstructionKind::Select(a, b, c) => {
                visit(a);
                visit(b);
                visit(c);
            }
            InstructionKind::Concatenate(values, _) => {
                for v in values {
                    visit(v);
                }
            }
            InstructionKind::Reduce(combinator, value, initial, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
                visit(initial);
            }
            InstructionKind::Scan(combinator, value, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
            }
            InstructionKind::ReduceWindow(combinator, value, initial, _, _, _) => {
                if let ReductionCombinator::Function(f) = combinator {
                    visit(f);
                }
                visit(value);
                visit(initial);
            }
            InstructionKind::Convolve { lhs, kernel, .. } => {
                visit(lhs);
                visit(kernel);
            }
            InstructionKind::Extract { from, keys } => {
                visit(from);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::Insert { source, to, keys } => {
                visit(source);
                visit(to);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::ElementPointer(pointer, keys) => {
                visit(pointer);
                for key in keys {
                    if let ElementKey::Value(u) = key {
                        visit(u);
                    }
                }
            }
            InstructionKind::Apply(callee, arguments) => {
                visit(callee);
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::Copy { from, to, count } => {
                visit(from);
                visit(to);
                visit(count);
            }
            InstructionKind::Branch(_, arguments) => {
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::Conditional {
                condition,
                then_args,
                else_args,
                ..
            } => {
                visit(condition);
                for a in then_args {
                    visit(a);
                }
                for a in else_args {
                    visit(a);
                }
            }
            InstructionKind::BranchEnum(value, _) => visit(value),
            InstructionKind::Return(value) => {
                if let Some(v) = value {
                    visit(v);
                }
            }
            InstructionKind::Builtin(_, arguments) => {
                for a in arguments {
                    visit(a);
                }
            }
            InstructionKind::AllocateStack(_, _)
            | InstructionKind::AllocateBox(_)
            | InstructionKind::CreateStack
            | InstructionKind::Trap => {}
        }
    }
}

fn visit_literal_uses(literal: &Literal, visit: &mut impl FnMut(&Use)) {
    match literal {
        Literal::Undefined
        | Literal::Zero
        | Literal::Null
        | Literal::Bool(_)
        | Literal::Scalar(_) => {}
        Literal::Tensor(elements) | Literal::Tuple(elements) | Literal::Array(elements) => {
            for element in elements {
                visit(element);
            }
        }
        Literal::Struct(fields) => {
            for (_, value) in fields {
                visit(value);
            }
        }
        Literal::Case(_, payload) => {
            for value in payload {
                visit(value);
            }
        }
    }
}

fn visit_literal_uses_mut(literal: &mut Literal, visit: &mut impl FnMut(&mut Use)) {
    match literal {
        Literal::Undefined
        | Literal::Zero
        | Literal::Null
        | Literal::Bool(_)
        | Literal::Scalar(_) => {}
        Literal::Tensor(elements) | Literal::Tuple(elements) | Literal::Array(elements) => {
            for element in elements {
                visit(element);
            }
        }
        Literal::Struct(fields) => {
            for (_, value) in fields {
                visit(value);
            }
        }
        Literal::Case(_, payload) => {
            for value in payload {
                visit(value);
            }
        }
    }
}
