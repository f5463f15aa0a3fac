//! Basic blocks and block arguments.
//!
//! Blocks own an ordered list of argument ids and instruction ids; the
//! nodes themselves live in the function's arenas. Block arguments play
//! the role of SSA phi nodes: incoming branches pass values for them.

use crate::entity::{ArgId, BlockId, InstId};
use crate::types::Type;

/// A basic block.
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub name: Option<String>,
    pub(crate) args: Vec<ArgId>,
    pub(crate) insts: Vec<InstId>,
}

impl BasicBlock {
    pub(crate) fn new(name: Option<String>) -> Self {
        BasicBlock {
            name,
            args: Vec::new(),
            insts: Vec::new(),
        }
    }

    /// Argument ids in declaration order.
    pub fn args(&self) -> &[ArgId] {
        &self.args
    }

    /// Instruction ids in program order.
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    /// Position of an instruction within this block.
    pub fn inst_index(&self, inst: InstId) -> Option<usize> {
        self.insts.iter().position(|&i| i == inst)
    }

    /// Position of an argument within this block.
    pub fn arg_index(&self, arg: ArgId) -> Option<usize> {
        self.args.iter().position(|&a| a == arg)
    }
}

/// A basic-block argument.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Option<String>,
    pub ty: Type,
    pub(crate) block: BlockId,
}

impl Argument {
    pub(crate) fn new(name: Option<String>, ty: Type, block: BlockId) -> Self {
        Argument { name, ty, block }
    }

    /// The block this argument belongs to.
    pub fn block(&self) -> BlockId {
        self.block
    }
}
