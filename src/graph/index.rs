//! In-memory reaction graph.
//!
//! Operations live in an arena addressed by index. `petgraph` holds the
//! substance nodes; every operation contributes one edge per source,
//! `source → target`, weighted with its arena index. Consumers of a
//! substance are its outgoing edges, producers its incoming edges.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::substance::{Operation, OperationId, SubstanceId};

/// Arena of operations with a substance-level adjacency index.
#[derive(Debug, Default, Clone)]
pub struct ReactionGraph {
    graph: DiGraph<SubstanceId, usize>,
    node_index: HashMap<SubstanceId, NodeIndex>,
    operations: Vec<Operation>,
    op_index: HashMap<OperationId, usize>,
}

impl ReactionGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from operations, inserted in ascending id order.
    pub fn from_operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        let mut ops: Vec<Operation> = operations.into_iter().collect();
        ops.sort_by_key(|op| op.id);
        let mut graph = Self::new();
        for op in ops {
            graph.insert_operation(op);
        }
        graph
    }

    fn ensure_node(&mut self, substance: SubstanceId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&substance) {
            return *idx;
        }
        let idx = self.graph.add_node(substance);
        self.node_index.insert(substance, idx);
        idx
    }

    /// Insert an operation, returning its arena index.
    ///
    /// Inserting an id that is already present is a no-op.
    pub fn insert_operation(&mut self, operation: Operation) -> usize {
        if let Some(&idx) = self.op_index.get(&operation.id) {
            return idx;
        }
        let idx = self.operations.len();
        let target = self.ensure_node(operation.target);
        let mut seen = Vec::with_capacity(operation.sources.len());
        for source in &operation.sources {
            if seen.contains(source) {
                continue;
            }
            seen.push(*source);
            let node = self.ensure_node(*source);
            self.graph.add_edge(node, target, idx);
        }
        self.op_index.insert(operation.id, idx);
        self.operations.push(operation);
        idx
    }

    pub fn contains_operation(&self, id: OperationId) -> bool {
        self.op_index.contains_key(&id)
    }

    pub fn operation(&self, idx: usize) -> &Operation {
        &self.operations[idx]
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    fn adjacent_ops(&self, substance: SubstanceId, direction: Direction) -> Vec<usize> {
        let Some(&node) = self.node_index.get(&substance) else {
            return vec![];
        };
        let mut ops: Vec<usize> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| *e.weight())
            .collect();
        ops.sort_by_key(|&idx| self.operations[idx].id);
        ops.dedup();
        ops
    }

    /// Arena indices of operations consuming `substance`, by ascending operation id.
    pub fn consumers_of(&self, substance: SubstanceId) -> Vec<usize> {
        self.adjacent_ops(substance, Direction::Outgoing)
    }

    /// Arena indices of operations producing `substance`, by ascending operation id.
    pub fn producers_of(&self, substance: SubstanceId) -> Vec<usize> {
        self.adjacent_ops(substance, Direction::Incoming)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}
