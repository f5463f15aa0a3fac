//! Error taxonomies of lexing and parsing.
//!
//! Both are all-or-nothing: the first error stops the operation and
//! surfaces to the caller.

use thiserror::Error;
use tir_common::Span;

/// Errors produced while tokenising source text.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum LexicalError {
    #[error("unexpected character at {0}")]
    UnexpectedToken(Span),
    #[error("illegal number at {0}")]
    IllegalNumber(Span),
    #[error("illegal identifier at {0}")]
    IllegalIdentifier(Span),
    #[error("invalid escape character at {0}")]
    InvalidEscapeCharacter(Span),
    #[error("unclosed string literal at {0}")]
    UnclosedStringLiteral(Span),
    #[error("expecting an identifier name at {0}")]
    ExpectingIdentifierName(Span),
    #[error("invalid anonymous local identifier at {0}")]
    InvalidAnonymousLocalIdentifier(Span),
    #[error("invalid basic block index at {0}")]
    InvalidBasicBlockIndex(Span),
    #[error("invalid anonymous identifier index at {0}")]
    InvalidAnonymousIdentifierIndex(Span),
    #[error("unknown attribute at {0}")]
    UnknownAttribute(Span),
}

/// Errors produced while parsing a token stream into a module.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected identifier kind at {span}, expected {expected}")]
    UnexpectedIdentifierKind { expected: &'static str, span: Span },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },
    #[error("unexpected token at {span}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("undefined identifier `{name}` at {span}")]
    UndefinedIdentifier { name: String, span: Span },
    #[error("undefined intrinsic `{name}` at {span}")]
    UndefinedIntrinsic { name: String, span: Span },
    #[error("type mismatch at {span}: expected {expected}")]
    TypeMismatch { expected: String, span: Span },
    #[error("undefined nominal type `{name}` at {span}")]
    UndefinedNominalType { name: String, span: Span },
    #[error("redefinition of `{name}` at {span}")]
    RedefinedIdentifier { name: String, span: Span },
    #[error("anonymous local identifier outside a local context at {span}")]
    AnonymousIdentifierNotInLocal { span: Span },
    #[error("invalid instruction index {index} at {span}")]
    InvalidInstructionIndex { index: usize, span: Span },
    #[error("invalid argument index {index} at {span}")]
    InvalidArgumentIndex { index: usize, span: Span },
    #[error("invalid basic block index {index} at {span}")]
    InvalidBasicBlockIndex { index: usize, span: Span },
    #[error("invalid variable index {index} at {span}")]
    InvalidVariableIndex { index: usize, span: Span },
    #[error("invalid function index {index} at {span}")]
    InvalidFunctionIndex { index: usize, span: Span },
    #[error("variables must precede functions, at {span}")]
    VariableAfterFunction { span: Span },
    #[error("type declarations must precede values, at {span}")]
    TypeDeclarationNotBeforeValues { span: Span },
    #[error("not a function type at {span}")]
    NotFunctionType { span: Span },
    #[error("instruction outside a basic block at {span}")]
    NotInBasicBlock { span: Span },
    #[error("invalid attribute arguments at {span}")]
    InvalidAttributeArguments { span: Span },
    #[error("a declaration cannot have a body, at {span}")]
    DeclarationCannotHaveBody { span: Span },
    #[error("cannot name void value `{name}` at {span}")]
    CannotNameVoidValue { name: String, span: Span },
    #[error("invalid operands to `{opcode}` at {span}")]
    InvalidOperands { opcode: String, span: Span },
    #[error("invalid reduction combinator at {span}")]
    InvalidReductionCombinator { span: Span },
}

/// Any front-end failure.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
