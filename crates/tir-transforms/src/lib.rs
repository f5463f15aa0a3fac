//! Transformation passes for the tir tensor IR.
//!
//! - `dce`: dead-code elimination
//! - `broadcast`: literal broadcasting promotion
//! - `clone`: function cloning
//! - `hoist`: predecessor hoisting

pub mod dce;
pub use dce::DeadCodeElimination;

pub mod broadcast;
pub use broadcast::LiteralBroadcastingPromotion;

pub mod clone;
pub use clone::clone_function;

pub mod hoist;
pub use hoist::hoist_predecessors;
