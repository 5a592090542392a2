//! # Graph Projection
//!
//! Turns node and link inventories into the string-keyed shape a graph
//! renderer consumes. Projection is a pure function of its inputs; the
//! [`crate::store::TopologyStore`] re-runs it whenever either inventory is
//! replaced.
//!
//! Links and nodes are fetched independently, so a link can name an endpoint
//! the current node snapshot does not know yet (or any more). Such edges are
//! left out of the graph instead of failing the projection.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::{Link, Node};

pub const LOCAL_NODE_FILL: &str = "yellow";
pub const REMOTE_NODE_FILL: &str = "blue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub weight: f64,
}

/// Renderable topology. Collections are sets; compare with
/// [`Graph::normalized`] when order should not matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Canonical ordering: nodes and edges sorted by id.
    pub fn normalized(&self) -> Graph {
        let mut out = self.clone();
        out.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        out.edges.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        out
    }
}

/// Project nodes and links into a [`Graph`].
///
/// Repeated node ids keep the last record. Edges whose source or target is
/// not among the projected nodes are excluded.
pub fn project<'a, N, L>(nodes: N, links: L) -> Graph
where
    N: IntoIterator<Item = &'a Node>,
    L: IntoIterator<Item = &'a Link>,
{
    let mut graph = Graph::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for node in nodes {
        let projected = project_node(node);
        match positions.get(&projected.id) {
            Some(&pos) => graph.nodes[pos] = projected,
            None => {
                positions.insert(projected.id.clone(), graph.nodes.len());
                graph.nodes.push(projected);
            }
        }
    }

    let mut edges: Vec<GraphEdge> = Vec::new();
    positions.clear();
    for link in links {
        let projected = project_link(link);
        match positions.get(&projected.id) {
            Some(&pos) => edges[pos] = projected,
            None => {
                positions.insert(projected.id.clone(), edges.len());
                edges.push(projected);
            }
        }
    }

    // the surviving record decides whether an id is dangling
    let known: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    edges.retain(|e| known.contains(e.source.as_str()) && known.contains(e.target.as_str()));
    graph.edges = edges;
    graph
}

fn project_node(node: &Node) -> GraphNode {
    GraphNode {
        id: node.id.to_string(),
        label: node.tag.clone(),
        fill: if node.is_local {
            LOCAL_NODE_FILL
        } else {
            REMOTE_NODE_FILL
        }
        .to_string(),
    }
}

fn project_link(link: &Link) -> GraphEdge {
    GraphEdge {
        id: link.id.to_string(),
        source: link.from.to_string(),
        target: link.to.to_string(),
        label: format_weight(link.weight),
        weight: link.weight,
    }
}

/// Render a weight the way a JavaScript `Number#toString` would, since the
/// label is shown verbatim by browser renderers.
pub fn format_weight(weight: f64) -> String {
    if weight.is_nan() {
        return "NaN".to_string();
    }
    if weight.is_infinite() {
        return if weight > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if weight == 0.0 {
        return "0".to_string();
    }
    let magnitude = weight.abs();
    if magnitude < 1e-6 || magnitude >= 1e21 {
        let exp = format!("{:e}", weight);
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{}e+{}", mantissa, power)
            }
            _ => exp,
        };
    }
    format!("{}", weight)
}
