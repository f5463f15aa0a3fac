//! Core IR data model for tir.
//!
//! This crate owns the in-memory representation:
//! - Entity ids and arenas (`entity`)
//! - The type system (`types`)
//! - Values: literals, definitions, uses (`value`)
//! - Operator enums (`ops`) and the instruction set (`instruction`)
//! - Type inference (`infer`)
//! - Containers: module, function, basic block
//! - The intrinsic registry collaborator (`intrinsics`)
//! - Textual printing (`print`), the inverse of the parser

pub mod entity;
pub use entity::{AliasId, ArgId, Arena, BlockId, EntityId, EnumId, FuncId, InstId, StructId, VarId};

pub mod types;
pub use types::{ElementKey, Type};

pub mod value;
pub use value::{Definition, Literal, Number, Use};

pub mod ops;
pub use ops::{
    BooleanBinaryOp, ComparisonOp, NumericBinaryOp, NumericUnaryOp, ReductionCombinator,
};

pub mod instruction;
pub use instruction::{Instruction, InstructionKind, Operands, Padding};

pub mod infer;
pub use infer::infer_type;

pub mod block;
pub use block::{Argument, BasicBlock};

pub mod function;
pub use function::{AdjointConfig, DeclarationKind, Function, FunctionAttributes};

pub mod module;
pub use module::{EnumType, GlobalValue, Module, Stage, StructType, TypeAlias, TypeHandle, Variable};

pub mod intrinsics;
pub use intrinsics::{Intrinsic, IntrinsicRegistry, default_registry};

pub mod print;
