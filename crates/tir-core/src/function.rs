//! Functions: signatures, declaration kinds, and the per-function arenas
//! that own blocks, arguments and instructions.
//!
//! Every mutation bumps the function's version counter; analysis caches
//! are stamped with the version they were computed at and expire on
//! mismatch.

use bitflags::bitflags;

use crate::block::{Argument, BasicBlock};
use crate::entity::{ArgId, Arena, BlockId, FuncId, InstId};
use crate::instruction::{Instruction, InstructionKind};
use crate::types::Type;

bitflags! {
    /// Function attributes (`!` markers in the textual form).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FunctionAttributes: u32 {
        const INLINE = 1 << 0;
    }
}

/// Differentiation configuration of an adjoint declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdjointConfig {
    /// The primal function this adjoint differentiates.
    pub primal: FuncId,
    /// When the primal returns a tuple, the output being differentiated.
    pub source_index: Option<usize>,
    /// Arguments differentiated with respect to; `None` means all.
    pub argument_indices: Option<Vec<usize>>,
    /// Primal outputs carried through alongside the gradients.
    pub kept_indices: Vec<usize>,
    /// Whether the adjoint takes a seed argument of the output type.
    pub seedable: bool,
}

/// What kind of declaration a body-less function is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    External,
    Adjoint(AdjointConfig),
}

/// A function: a signature plus either a declaration kind or a body of
/// basic blocks.
///
/// Cloning a function clones its arenas wholesale, so block, argument
/// and instruction ids remain valid in the clone.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<String>,
    argument_types: Vec<Type>,
    return_type: Type,
    pub attributes: FunctionAttributes,
    pub declaration_kind: Option<DeclarationKind>,
    blocks: Arena<BlockId, BasicBlock>,
    block_order: Vec<BlockId>,
    instructions: Arena<InstId, Instruction>,
    arguments: Arena<ArgId, Argument>,
    version: u64,
}

impl Function {
    pub fn new(name: Option<String>, argument_types: Vec<Type>, return_type: Type) -> Self {
        Function {
            name,
            argument_types,
            return_type,
            attributes: FunctionAttributes::empty(),
            declaration_kind: None,
            blocks: Arena::new(),
            block_order: Vec::new(),
            instructions: Arena::new(),
            arguments: Arena::new(),
            version: 0,
        }
    }

    pub fn argument_types(&self) -> &[Type] {
        &self.argument_types
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// The function's type.
    pub fn ty(&self) -> Type {
        Type::function(self.argument_types.clone(), self.return_type.clone())
    }

    /// A function is a declaration iff it has no blocks and carries a
    /// declaration kind.
    pub fn is_declaration(&self) -> bool {
        self.block_order.is_empty() && self.declaration_kind.is_some()
    }

    /// Mutation counter for analysis-cache invalidation.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump(&mut self) {
        self.version += 1;
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// The entry block, if any.
    pub fn entry(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.bump();
        &mut self.blocks[id]
    }

    /// Block ids in program order.
    pub fn block_ids(&self) -> &[BlockId] {
        &self.block_order
    }

    /// Iterate blocks in program order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.block_order.iter().map(move |&id| (id, &self.blocks[id]))
    }

    /// Position of a block within the function.
    pub fn block_index(&self, id: BlockId) -> Option<usize> {
        self.block_order.iter().position(|&b| b == id)
    }

    /// Append a new empty block.
    pub fn append_block(&mut self, name: Option<String>) -> BlockId {
        self.bump();
        let id = self.blocks.insert(BasicBlock::new(name));
        self.block_order.push(id);
        id
    }

    /// Insert a new empty block at a position in the block order.
    pub fn insert_block_at(&mut self, index: usize, name: Option<String>) -> BlockId {
        self.bump();
        let id = self.blocks.insert(BasicBlock::new(name));
        self.block_order.insert(index.min(self.block_order.len()), id);
        id
    }

    /// Remove a block along with its arguments and instructions.
    pub fn remove_block(&mut self, id: BlockId) -> Option<BasicBlock> {
        self.bump();
        self.block_order.retain(|&b| b != id);
        let block = self.blocks.remove(id)?;
        for &arg in &block.args {
            self.arguments.remove(arg);
        }
        for &inst in &block.insts {
            self.instructions.remove(inst);
        }
        Some(block)
    }

    /// The block's terminator: its last instruction, when that is a
    /// terminator kind.
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let &last = self.blocks[block].insts.last()?;
        self.instructions[last].kind.is_terminator().then_some(last)
    }

    // =========================================================================
    // Arguments
    // =========================================================================

    pub fn argument(&self, id: ArgId) -> &Argument {
        &self.arguments[id]
    }

    /// Append an argument to a block.
    pub fn append_argument(&mut self, block: BlockId, name: Option<String>, ty: Type) -> ArgId {
        self.bump();
        let id = self.arguments.insert(Argument::new(name, ty, block));
        self.blocks[block].args.push(id);
        id
    }

    /// The types of a block's arguments, in order.
    pub fn block_argument_types(&self, block: BlockId) -> Vec<Type> {
        self.blocks[block]
            .args
            .iter()
            .map(|&a| self.arguments[a].ty.clone())
            .collect()
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    pub fn instruction(&self, id: InstId) -> &Instruction {
        &self.instructions[id]
    }

    pub fn instruction_mut(&mut self, id: InstId) -> &mut Instruction {
        self.bump();
        &mut self.instructions[id]
    }

    pub fn contains_instruction(&self, id: InstId) -> bool {
        self.instructions.contains(id)
    }

    pub fn contains_argument(&self, id: ArgId) -> bool {
        self.arguments.contains(id)
    }

    pub fn contains_block(&self, id: BlockId) -> bool {
        self.blocks.contains(id)
    }

    /// Append an instruction to a block.
    pub fn append_instruction(
        &mut self,
        block: BlockId,
        name: Option<String>,
        kind: InstructionKind,
    ) -> InstId {
        self.bump();
        let id = self.instructions.insert(Instruction::new(name, kind, block));
        self.blocks[block].insts.push(id);
        id
    }

    /// Insert an instruction at a position within a block.
    pub fn insert_instruction_at(
        &mut self,
        block: BlockId,
        index: usize,
        name: Option<String>,
        kind: InstructionKind,
    ) -> InstId {
        self.bump();
        let id = self.instructions.insert(Instruction::new(name, kind, block));
        let insts = &mut self.blocks[block].insts;
        insts.insert(index.min(insts.len()), id);
        id
    }

    /// Remove an instruction from its block. The id becomes dead; any
    /// remaining use of it is dangling and will be rejected by the
    /// verifier.
    pub fn remove_instruction(&mut self, id: InstId) -> Option<Instruction> {
        self.bump();
        let inst = self.instructions.remove(id)?;
        self.blocks[inst.block].insts.retain(|&i| i != id);
        Some(inst)
    }

    /// Iterate all instructions of all blocks in program order.
    pub fn instructions(&self) -> impl Iterator<Item = (InstId, &Instruction)> + '_ {
        self.block_order.iter().flat_map(move |&b| {
            self.blocks[b]
                .insts
                .iter()
                .map(move |&i| (i, &self.instructions[i]))
        })
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Whether a value or block name is already used in this function.
    pub fn is_name_used(&self, name: &str) -> bool {
        self.blocks().any(|(_, b)| b.name.as_deref() == Some(name))
            || self
                .arguments
                .iter()
                .any(|(_, a)| a.name.as_deref() == Some(name))
            || self
                .instructions
                .iter()
                .any(|(_, i)| i.name.as_deref() == Some(name))
    }

    /// Allocate a fresh name: the base itself, then `base_0`, `base_1`, …
    pub fn make_fresh_name(&self, base: &str) -> String {
        if !self.is_name_used(base) {
            return base.to_string();
        }
        let mut counter = 0usize;
        loop {
            let candidate = format!("{base}_{counter}");
            if !self.is_name_used(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}
