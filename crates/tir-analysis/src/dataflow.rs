//! Dataflow users: for every definition, the instructions that use it.

use rustc_hash::FxHashMap;
use tir_core::{Definition, FuncId, InstId, Module};

use crate::pass::FunctionAnalysis;

/// Per-definition successor (user) sets for one function.
#[derive(Debug, Default)]
pub struct DataFlowGraph {
    users: FxHashMap<Definition, Vec<InstId>>,
}

impl DataFlowGraph {
    /// The instructions using a definition, in program order.
    pub fn users(&self, definition: Definition) -> &[InstId] {
        self.users
            .get(&definition)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_users(&self, definition: Definition) -> bool {
        !self.users(definition).is_empty()
    }
}

/// Builds the `DataFlowGraph` in a single sweep over the instructions.
pub struct DataFlowGraphAnalysis;

impl FunctionAnalysis for DataFlowGraphAnalysis {
    type Result = DataFlowGraph;

    fn run(module: &Module, function: FuncId) -> DataFlowGraph {
        let function = module.function(function);
        let mut graph = DataFlowGraph::default();
        for (inst_id, inst) in function.instructions() {
            for operand in inst.kind.operands() {
                if let Some(definition) = operand.as_definition() {
                    let users = graph.users.entry(definition).or_default();
                    // An instruction using a value several times is one user.
                    if users.last() != Some(&inst_id) {
                        users.push(inst_id);
                    }
                }
            }
        }
        graph
    }
}
