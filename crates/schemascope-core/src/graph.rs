//! In-memory node/edge graph and its Mermaid-style text rendering.

use crate::node_id::NodeId;

/// Direction header, always the first rendered line.
pub const GRAPH_HEADER: &str = "graph TD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Directed graph with insertion-ordered nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, label: impl Into<String>) -> NodeId {
        self.nodes.push(Node {
            id: id.clone(),
            label: label.into(),
        });
        id
    }

    pub fn add_edge(&mut self, from: &NodeId, to: &NodeId) {
        self.edges.push(Edge {
            from: from.clone(),
            to: to.clone(),
        });
    }

    /// Add `child` and an edge `parent --> child` in one step.
    pub fn add_child(&mut self, parent: &NodeId, id: NodeId, label: impl Into<String>) -> NodeId {
        let id = self.add_node(id, label);
        self.add_edge(parent, &id);
        id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn has_edge(&self, from: &NodeId, to: &NodeId) -> bool {
        self.edges.iter().any(|e| &e.from == from && &e.to == to)
    }

    /// Render as text: header, then one line per node, then one per edge.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(32 * (self.nodes.len() + self.edges.len() + 1));
        out.push_str(GRAPH_HEADER);
        out.push('\n');
        for node in &self.nodes {
            out.push_str("  ");
            out.push_str(node.id.as_str());
            out.push_str("[\"");
            out.push_str(&escape_label(&node.label));
            out.push_str("\"]\n");
        }
        for edge in &self.edges {
            out.push_str("  ");
            out.push_str(edge.from.as_str());
            out.push_str(" --> ");
            out.push_str(edge.to.as_str());
            out.push('\n');
        }
        out
    }
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;").replace('\n', " ")
}
