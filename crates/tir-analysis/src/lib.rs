//! Pass framework and analyses for the tir tensor IR.
//!
//! - `pass`: analysis/transform traits and the version-stamped cache
//! - `dataflow`: users per definition
//! - `effects`: side-effect summaries over the call graph
//! - `dominance`: dominator tree and properly-dominates queries

pub mod pass;
pub use pass::{BlockTransform, FunctionAnalysis, FunctionTransform, ModuleAnalysis, PassManager};

pub mod dataflow;
pub use dataflow::{DataFlowGraph, DataFlowGraphAnalysis};

pub mod effects;
pub use effects::{SideEffect, SideEffectAnalysis, SideEffectInfo};

pub mod dominance;
pub use dominance::{DominanceAnalysis, DominatorTree};
