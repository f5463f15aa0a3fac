//! Dominance.
//!
//! Iterative dominator-tree construction over a reverse postorder
//! (Cooper–Harvey–Kennedy). Blocks unreachable from the entry are not in
//! the tree; dominance queries against them are answered leniently, since
//! no execution reaches them.

use rustc_hash::FxHashMap;
use tir_core::{BlockId, Definition, FuncId, Function, InstId, Module};

use crate::pass::FunctionAnalysis;

/// The dominator tree of one function.
#[derive(Debug, Default)]
pub struct DominatorTree {
    /// Reachable blocks in reverse postorder.
    rpo: Vec<BlockId>,
    rpo_index: FxHashMap<BlockId, usize>,
    /// Immediate dominators; the entry maps to itself.
    idom: FxHashMap<BlockId, BlockId>,
}

impl DominatorTree {
    /// Whether the block is reachable from the entry.
    pub fn contains(&self, block: BlockId) -> bool {
        self.rpo_index.contains_key(&block)
    }

    /// Reachable blocks in reverse postorder.
    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.rpo
    }

    /// Reflexive dominance between reachable blocks.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let (Some(&ia), Some(&ib)) = (self.rpo_index.get(&a), self.rpo_index.get(&b)) else {
            return false;
        };
        let mut current = b;
        let mut index = ib;
        while index > ia {
            current = self.idom[&current];
            index = self.rpo_index[&current];
        }
        current == a
    }

    /// Strict block dominance.
    pub fn properly_dominates_block(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Whether a definition properly dominates an instruction that uses
    /// it. Same-block instruction defs must come strictly earlier; block
    /// arguments dominate every instruction of their block; globals
    /// dominate everything. Users in unreachable blocks are accepted.
    pub fn properly_dominates(
        &self,
        definition: Definition,
        user: InstId,
        function: &Function,
    ) -> bool {
        let user_block = function.instruction(user).block();
        if !self.contains(user_block) {
            return true;
        }
        match definition {
            Definition::Variable(_) | Definition::Function(_) => true,
            Definition::Argument(arg) => {
                let def_block = function.argument(arg).block();
                def_block == user_block || self.properly_dominates_block(def_block, user_block)
            }
            Definition::Instruction(inst) => {
                if !function.contains_instruction(inst) {
                    return false;
                }
                let def_block = function.instruction(inst).block();
                if def_block == user_block {
                    let block = function.block(def_block);
                    match (block.inst_index(inst), block.inst_index(user)) {
                        (Some(def_index), Some(user_index)) => def_index < user_index,
                        _ => false,
                    }
                } else {
                    self.properly_dominates_block(def_block, user_block)
                }
            }
        }
    }
}

/// Builds the dominator tree of a function.
pub struct DominanceAnalysis;

impl FunctionAnalysis for DominanceAnalysis {
    type Result = DominatorTree;

    fn run(module: &Module, function: FuncId) -> DominatorTree {
        let function = module.function(function);
        let Some(entry) = function.entry() else {
            return DominatorTree::default();
        };

        let successors = |block: BlockId| -> Vec<BlockId> {
            function
                .terminator(block)
                .map(|t| function.instruction(t).kind.branch_targets().to_vec())
                .unwrap_or_default()
        };

        // Depth-first postorder, then reverse.
        let mut postorder = Vec::new();
        let mut visited = rustc_hash::FxHashSet::default();
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);
        while let Some(top) = stack.last_mut() {
            let (block, next) = *top;
            let succs = successors(block);
            if next < succs.len() {
                top.1 += 1;
                let succ = succs[next];
                if visited.insert(succ) {
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
                stack.pop();
            }
        }
        let rpo: Vec<BlockId> = postorder.into_iter().rev().collect();
        let rpo_index: FxHashMap<BlockId, usize> =
            rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        // Predecessor lists restricted to reachable blocks.
        let mut predecessors: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for &block in &rpo {
            for succ in successors(block) {
                if rpo_index.contains_key(&succ) {
                    predecessors.entry(succ).or_default().push(block);
                }
            }
        }

        let mut idom: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        idom.insert(entry, entry);
        let intersect = |idom: &FxHashMap<BlockId, BlockId>, mut a: BlockId, mut b: BlockId| {
            while a != b {
                while rpo_index[&a] > rpo_index[&b] {
                    a = idom[&a];
                }
                while rpo_index[&b] > rpo_index[&a] {
                    b = idom[&b];
                }
            }
            a
        };
        loop {
            let mut changed = false;
            for &block in rpo.iter().skip(1) {
                let preds = predecessors.get(&block).cloned().unwrap_or_default();
                let mut new_idom = None;
                for &pred in &preds {
                    if idom.contains_key(&pred) {
                        new_idom = Some(match new_idom {
                            None => pred,
                            Some(current) => intersect(&idom, pred, current),
                        });
                    }
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&block) != Some(&new_idom) {
                        idom.insert(block, new_idom);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        tracing::trace!(blocks = rpo.len(), "built dominator tree");
        DominatorTree {
            rpo,
            rpo_index,
            idom,
        }
    }
}
