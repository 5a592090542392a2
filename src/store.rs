//! Topology store: last-fetched inventories plus the graph derived from them.
//!
//! Every setter is a total replacement of the previous snapshot. The
//! controller is the source of truth, so nothing here merges partial updates.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{self, Graph};
use crate::model::{Link, LinkId, Neighbor, Node};

/// How a node snapshot differs from the one it replaced, by identity only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSetChange {
    Unchanged,
    Changed { added: usize, removed: usize },
}

impl NodeSetChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, NodeSetChange::Changed { .. })
    }
}

#[derive(Debug, Default)]
pub struct TopologyStore {
    nodes: BTreeMap<u32, Node>,
    links: BTreeMap<LinkId, Link>,
    neighbors: Vec<Neighbor>,
    graph: Graph,
    has_node_snapshot: bool,
    revision: u64,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node inventory. The first snapshot always counts as a
    /// change.
    pub fn set_nodes(&mut self, nodes: Vec<Node>) -> NodeSetChange {
        let previous: BTreeSet<u32> = self.nodes.keys().copied().collect();
        self.nodes = nodes.into_iter().map(|n| (n.id, n)).collect();
        let current: BTreeSet<u32> = self.nodes.keys().copied().collect();

        let change = if !self.has_node_snapshot || previous != current {
            NodeSetChange::Changed {
                added: current.difference(&previous).count(),
                removed: previous.difference(&current).count(),
            }
        } else {
            NodeSetChange::Unchanged
        };
        self.has_node_snapshot = true;
        self.reproject();
        change
    }

    pub fn set_links(&mut self, links: Vec<Link>) {
        self.links = links.into_iter().map(|l| (l.id.clone(), l)).collect();
        self.reproject();
    }

    pub fn set_neighbors(&mut self, neighbors: Vec<Neighbor>) {
        self.neighbors = neighbors;
    }

    pub fn current_graph(&self) -> &Graph {
        &self.graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links left out of the graph because an endpoint is unknown.
    pub fn dangling_links(&self) -> usize {
        self.links.len() - self.graph.edges.len()
    }

    /// Bumped every time the graph is recomputed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn reproject(&mut self) {
        self.graph = graph::project(self.nodes.values(), self.links.values());
        self.revision += 1;
    }
}
