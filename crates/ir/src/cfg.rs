// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block-level control flow graph
//!
//! Built from a function's terminators. Back-edge detection is positional:
//! an edge is a back-edge when its target block does not come after its
//! source in layout order. A forward branch misclassified by this heuristic
//! costs at most a suppressed probe, never incorrect behavior.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::function::Function;
use crate::inst::BlockId;

/// Data stored per graph node.
#[derive(Debug)]
pub struct BlockNode {
    /// The function block this node represents.
    pub block: BlockId,
    /// Source blocks of back-edges targeting this block.
    pub back_edge_sources: Vec<BlockId>,
}

/// Block-level CFG backed by petgraph.
pub struct BlockGraph {
    graph: DiGraph<BlockNode, ()>,
    node_of: HashMap<BlockId, NodeIndex>,
}

impl BlockGraph {
    /// Build the CFG for a function.
    pub fn build(function: &Function) -> Self {
        let mut graph = DiGraph::new();
        let mut node_of = HashMap::new();

        for block in function.block_ids() {
            let node = graph.add_node(BlockNode {
                block,
                back_edge_sources: Vec::new(),
            });
            node_of.insert(block, node);
        }

        for source in function.block_ids() {
            for target in function.block(source).term.successors() {
                graph.add_edge(node_of[&source], node_of[&target], ());
                // Positional back-edge test: target at or before source.
                if target <= source {
                    graph[node_of[&target]].back_edge_sources.push(source);
                }
            }
        }

        Self { graph, node_of }
    }

    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate over CFG successors of a block.
    pub fn successors(&self, block: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.graph
            .neighbors(self.node_of[&block])
            .map(|n| self.graph[n].block)
    }

    /// Whether a block is the target of at least one back-edge.
    pub fn is_loop_header(&self, block: BlockId) -> bool {
        !self.graph[self.node_of[&block]].back_edge_sources.is_empty()
    }

    /// Blocks targeted by back-edges, in layout order.
    pub fn loop_headers(&self) -> Vec<BlockId> {
        let mut headers: Vec<BlockId> = self
            .graph
            .node_indices()
            .filter(|&n| !self.graph[n].back_edge_sources.is_empty())
            .map(|n| self.graph[n].block)
            .collect();
        headers.sort_unstable();
        headers
    }
}
