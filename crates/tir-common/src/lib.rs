//! Common types and utilities for the tir tensor IR.
//!
//! This crate provides foundational types used across all tir crates:
//! - Source spans (`Span`, `Spanned`)
//! - Position/line-map types for source locations
//! - Tensor shape algebra (`TensorShape`)
//! - Element data types (`DataType`, `FloatPrecision`)

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{Span, Spanned};

// Position/LineMap types for line/column source locations
pub mod position;
pub use position::{LineMap, SourceLocation};

// Tensor shape algebra
pub mod shape;
pub use shape::TensorShape;

// Element data types
pub mod datatype;
pub use datatype::{DataType, FloatPrecision};
