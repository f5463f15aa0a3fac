//! tir — a tensor-oriented, SSA-form compiler intermediate representation.
//!
//! This facade crate re-exports the sub-crates:
//! - [`common`]: spans, tensor shapes, data types
//! - [`core`]: the IR data model, type inference, printing
//! - [`analysis`]: the pass framework and analyses
//! - [`parser`]: the textual-IR lexer and parser
//! - [`verify`]: the semantic verifier
//! - [`transforms`]: DCE, literal broadcasting promotion, cloning,
//!   predecessor hoisting

pub use tir_analysis as analysis;
pub use tir_common as common;
pub use tir_core as core;
pub use tir_parser as parser;
pub use tir_transforms as transforms;
pub use tir_verify as verify;
