//! The verification error taxonomy.
//!
//! Each variant carries the offending IR node (by id) for diagnostics;
//! types are carried pre-rendered since displaying them needs the module.

use thiserror::Error;
use tir_core::{BlockId, Definition, FuncId, InstId};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum VerificationError {
    // Structure
    #[error("invalid identifier name `{name}`")]
    InvalidName { name: String },
    #[error("redefinition of `{name}`")]
    RedefinedName { name: String },
    #[error("{function:?} is a declaration but has basic blocks")]
    DeclarationWithBody { function: FuncId },
    #[error("{function:?} has neither a body nor a declaration kind")]
    EmptyBody { function: FuncId },
    #[error("{function:?}: entry block arguments do not match the signature")]
    EntryArgumentMismatch { function: FuncId },
    #[error("{block:?} has no terminator as its last instruction")]
    MissingTerminator { block: BlockId },
    #[error("{block:?} has a terminator before its last instruction")]
    TerminatorNotLast { block: BlockId },
    #[error("{inst:?} does not belong to {block:?}")]
    InstructionParentMismatch { inst: InstId, block: BlockId },
    #[error("{block:?} lists an argument that does not belong to it")]
    ArgumentParentMismatch { block: BlockId },
    #[error("{inst:?} uses a dangling or foreign definition")]
    DanglingUse { inst: InstId },
    #[error("{inst:?} uses {definition:?} before its definition")]
    UseBeforeDef { inst: InstId, definition: Definition },
    #[error("void-typed {inst:?} must be unnamed")]
    NamedVoid { inst: InstId },
    #[error("{inst:?} has an aggregate literal operand outside `literal`")]
    NestedAggregateLiteral { inst: InstId },
    #[error("invalid type {ty} in {context}")]
    InvalidType { ty: String, context: String },

    // Declarations
    #[error("{function:?}: adjoint signature mismatch, expected {expected}")]
    AdjointSignatureMismatch { function: FuncId, expected: String },
    #[error("{function:?}: adjoint differentiation configuration is invalid")]
    AdjointConfigurationInvalid { function: FuncId },

    // Instruction typing
    #[error("{inst:?}: operand is not a tensor")]
    NotTensor { inst: InstId },
    #[error("{inst:?}: operand data types do not match")]
    DataTypeMismatch { inst: InstId },
    #[error("{inst:?}: operand data type is not numeric")]
    NotNumeric { inst: InstId },
    #[error("{inst:?}: operand data type is not bool")]
    NotBool { inst: InstId },
    #[error("{inst:?}: operand shapes are not broadcast-compatible")]
    BroadcastIncompatible { inst: InstId },
    #[error("{inst:?}: dimension {axis} is out of range")]
    AxisOutOfRange { inst: InstId, axis: usize },
    #[error("{inst:?}: duplicate dimension in dimension list")]
    DuplicateDimension { inst: InstId },
    #[error("{inst:?}: slice bounds exceed the leading dimension")]
    SliceOutOfRange { inst: InstId },
    #[error("{inst:?}: shapes do not cover the same number of units")]
    ShapeSizeMismatch { inst: InstId },
    #[error("{inst:?}: data type cast is not allowed")]
    CannotCastDataType { inst: InstId },
    #[error("{inst:?}: element key path is not valid for the operand type")]
    InvalidElementKeys { inst: InstId },
    #[error("{inst:?}: dynamic element key is not an integer scalar")]
    ElementKeyNotInteger { inst: InstId },
    #[error("{inst:?}: argument count does not match the callee")]
    ArgumentCountMismatch { inst: InstId },
    #[error("{inst:?}: argument {index} does not match the callee parameter type")]
    ArgumentTypeMismatch { inst: InstId, index: usize },
    #[error("{inst:?}: callee is not a function")]
    CalleeNotFunction { inst: InstId },
    #[error("{inst:?}: operand is not a pointer")]
    NotPointer { inst: InstId },
    #[error("{inst:?}: operand is not a box")]
    NotBox { inst: InstId },
    #[error("{inst:?}: operand is not a stack")]
    NotStack { inst: InstId },
    #[error("{inst:?}: allocation count must be positive")]
    AllocationCountInvalid { inst: InstId },
    #[error("{inst:?}: copy count is invalid")]
    CopyCountInvalid { inst: InstId },
    #[error("{inst:?}: store value does not match the pointee type")]
    StoreTypeMismatch { inst: InstId },
    #[error("{inst:?}: insert source does not match the element at the key path")]
    InsertTypeMismatch { inst: InstId },
    #[error("{inst:?}: branch arguments do not match {block:?}'s arguments")]
    BranchArgumentMismatch { inst: InstId, block: BlockId },
    #[error("{inst:?}: branch destination {block:?} is not in this function")]
    BranchTargetInvalid { inst: InstId, block: BlockId },
    #[error("{inst:?}: condition is not a scalar bool")]
    ConditionNotBool { inst: InstId },
    #[error("{inst:?}: operand is not an enum")]
    NotEnum { inst: InstId },
    #[error("{inst:?}: enum has no case `{case}`")]
    UnknownEnumCase { inst: InstId, case: String },
    #[error("{inst:?}: destination arguments do not match case `{case}`")]
    EnumCaseArgumentMismatch { inst: InstId, case: String },
    #[error("{inst:?}: return value does not match the return type {expected}")]
    ReturnTypeMismatch { inst: InstId, expected: String },
    #[error("undefined intrinsic `{name}`")]
    UndefinedIntrinsic { name: String },
    #[error("{inst:?}: intrinsic arguments do not fit")]
    IntrinsicArgumentsInvalid { inst: InstId },
    #[error("{inst:?}: literal does not conform to its type")]
    InvalidLiteral { inst: InstId },
    #[error("{inst:?}: convolution operands are invalid")]
    ConvolutionInvalid { inst: InstId },
    #[error("{inst:?}: reduction combinator does not fit the value's data type")]
    ReductionCombinatorMismatch { inst: InstId },
    #[error("{inst:?}: window dimensions or strides are invalid")]
    WindowInvalid { inst: InstId },
    #[error("{inst:?}: random bounds must be matching scalar numerics")]
    RandomBoundsMismatch { inst: InstId },
}
