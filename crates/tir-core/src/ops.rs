//! Operator enums and their opcode spellings.

use crate::value::Use;

/// Element-wise unary numeric operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericUnaryOp {
    Negate,
    Sign,
    Square,
    Sqrt,
    Ceil,
    Floor,
    Round,
    Sin,
    Cos,
    Tan,
    Tanh,
    Exp,
    Log,
}

impl NumericUnaryOp {
    pub const ALL: &'static [NumericUnaryOp] = &[
        NumericUnaryOp::Negate,
        NumericUnaryOp::Sign,
        NumericUnaryOp::Square,
        NumericUnaryOp::Sqrt,
        NumericUnaryOp::Ceil,
        NumericUnaryOp::Floor,
        NumericUnaryOp::Round,
        NumericUnaryOp::Sin,
        NumericUnaryOp::Cos,
        NumericUnaryOp::Tan,
        NumericUnaryOp::Tanh,
        NumericUnaryOp::Exp,
        NumericUnaryOp::Log,
    ];

    pub const fn opcode(self) -> &'static str {
        match self {
            NumericUnaryOp::Negate => "negate",
            NumericUnaryOp::Sign => "sign",
            NumericUnaryOp::Square => "square",
            NumericUnaryOp::Sqrt => "sqrt",
            NumericUnaryOp::Ceil => "ceil",
            NumericUnaryOp::Floor => "floor",
            NumericUnaryOp::Round => "round",
            NumericUnaryOp::Sin => "sin",
            NumericUnaryOp::Cos => "cos",
            NumericUnaryOp::Tan => "tan",
            NumericUnaryOp::Tanh => "tanh",
            NumericUnaryOp::Exp => "exp",
            NumericUnaryOp::Log => "log",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.opcode() == opcode)
    }
}

/// Element-wise binary numeric operators (broadcasting).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericBinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Min,
    Max,
    TruncateDivide,
    FloorDivide,
    Modulo,
    Power,
}

impl NumericBinaryOp {
    pub const ALL: &'static [NumericBinaryOp] = &[
        NumericBinaryOp::Add,
        NumericBinaryOp::Subtract,
        NumericBinaryOp::Multiply,
        NumericBinaryOp::Divide,
        NumericBinaryOp::Min,
        NumericBinaryOp::Max,
        NumericBinaryOp::TruncateDivide,
        NumericBinaryOp::FloorDivide,
        NumericBinaryOp::Modulo,
        NumericBinaryOp::Power,
    ];

    pub const fn opcode(self) -> &'static str {
        match self {
            NumericBinaryOp::Add => "add",
            NumericBinaryOp::Subtract => "subtract",
            NumericBinaryOp::Multiply => "multiply",
            NumericBinaryOp::Divide => "divide",
            NumericBinaryOp::Min => "min",
            NumericBinaryOp::Max => "max",
            NumericBinaryOp::TruncateDivide => "truncateDivide",
            NumericBinaryOp::FloorDivide => "floorDivide",
            NumericBinaryOp::Modulo => "modulo",
            NumericBinaryOp::Power => "power",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.opcode() == opcode)
    }
}

/// Element-wise binary boolean operators (broadcasting).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BooleanBinaryOp {
    And,
    Or,
}

impl BooleanBinaryOp {
    pub const fn opcode(self) -> &'static str {
        match self {
            BooleanBinaryOp::And => "and",
            BooleanBinaryOp::Or => "or",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        match opcode {
            "and" => Some(BooleanBinaryOp::And),
            "or" => Some(BooleanBinaryOp::Or),
            _ => None,
        }
    }
}

/// Element-wise comparisons (broadcasting, yielding bool tensors).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub const ALL: &'static [ComparisonOp] = &[
        ComparisonOp::Equal,
        ComparisonOp::NotEqual,
        ComparisonOp::LessThan,
        ComparisonOp::LessThanOrEqual,
        ComparisonOp::GreaterThan,
        ComparisonOp::GreaterThanOrEqual,
    ];

    pub const fn opcode(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "equal",
            ComparisonOp::NotEqual => "notEqual",
            ComparisonOp::LessThan => "lessThan",
            ComparisonOp::LessThanOrEqual => "lessThanOrEqual",
            ComparisonOp::GreaterThan => "greaterThan",
            ComparisonOp::GreaterThanOrEqual => "greaterThanOrEqual",
        }
    }

    pub fn from_opcode(opcode: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.opcode() == opcode)
    }
}

/// The combining operator of `reduce`, `scan` and `reduceWindow`.
///
/// The `Function` form is a binary fold operator of type
/// `(scalar, scalar) -> scalar` over the reduced value's data type;
/// `NumericBuiltin` names an intrinsic with the same signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReductionCombinator {
    Function(Use),
    Boolean(BooleanBinaryOp),
    Numeric(NumericBinaryOp),
    NumericBuiltin(String),
}
