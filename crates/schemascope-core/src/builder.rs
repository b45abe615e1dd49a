//! Turns a source's structural listing into named diagrams.
//!
//! One diagram per table or agent namespace. Node ids are derived from the
//! `(source, entity, sub-entity, ...)` path so that edge events built by
//! [`change_event`] reference nodes present in the last snapshot.

use crate::graph::Graph;
use crate::node_id::NodeId;
use crate::types::{
    ChangeEvent, ChangeTarget, Diagram, KeyEntry, Namespace, SizeClass, StructuralEntity, Table,
    ValueKind, diagram_name,
};

/// Rendered length above which a diagram is classified `Large`.
pub const DEFAULT_SIZE_THRESHOLD: usize = 300;

/// Segment used for the single generic descendant of non-mapping keys.
/// Never collides with a field node: only mapping keys get field children.
const KIND_LEAF_SEGMENT: &str = "";

#[derive(Debug, Clone, Copy)]
pub struct DiagramBuilder {
    size_threshold: usize,
}

impl Default for DiagramBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_THRESHOLD)
    }
}

impl DiagramBuilder {
    pub fn new(size_threshold: usize) -> Self {
        Self { size_threshold }
    }

    pub fn size_threshold(&self) -> usize {
        self.size_threshold
    }

    pub fn build(&self, source: &str, entities: &[StructuralEntity]) -> Vec<Diagram> {
        entities
            .iter()
            .map(|entity| {
                let graph = match entity {
                    StructuralEntity::Table(table) => table_graph(source, table),
                    StructuralEntity::Namespace(ns) => namespace_graph(source, ns),
                };
                self.finish(diagram_name(source, entity.name()), graph)
            })
            .collect()
    }

    fn finish(&self, name: String, graph: Graph) -> Diagram {
        let diagram = graph.render();
        let size = SizeClass::classify(diagram.chars().count(), self.size_threshold);
        Diagram {
            name,
            graph,
            diagram,
            size,
        }
    }
}

fn table_graph(source: &str, table: &Table) -> Graph {
    let mut graph = Graph::new();
    let root = graph.add_node(
        NodeId::entity(source, &table.name),
        format!("{} ({})", table.name, source),
    );
    for column in &table.columns {
        graph.add_child(
            &root,
            NodeId::member(source, &table.name, &column.name),
            format!("{}: {}", column.name, column.data_type),
        );
    }
    graph
}

fn namespace_graph(source: &str, ns: &Namespace) -> Graph {
    let mut graph = Graph::new();
    let core = graph.add_node(
        NodeId::entity(source, &ns.agent),
        format!("{} (core)", ns.agent),
    );
    for key in &ns.keys {
        let key_id = graph.add_child(
            &core,
            NodeId::member(source, &ns.agent, &key.subkey),
            format!("{} ({})", key.subkey, key.kind),
        );
        add_key_descendants(&mut graph, source, &ns.agent, key, &key_id);
    }
    graph
}

fn add_key_descendants(
    graph: &mut Graph,
    source: &str,
    agent: &str,
    key: &KeyEntry,
    key_id: &NodeId,
) {
    let leaf_label = match key.kind {
        ValueKind::Mapping => {
            for field in &key.fields {
                graph.add_child(
                    key_id,
                    NodeId::from_segments(&[source, agent, key.subkey.as_str(), field.as_str()]),
                    field.as_str(),
                );
            }
            return;
        }
        ValueKind::Scalar => "Value",
        ValueKind::List => "List Items...",
        ValueKind::Set => "Set Items...",
        ValueKind::OrderedSet => "Sorted Set Items...",
        ValueKind::Other => return,
    };
    graph.add_child(
        key_id,
        NodeId::from_segments(&[source, agent, key.subkey.as_str(), KIND_LEAF_SEGMENT]),
        leaf_label,
    );
}

/// Edge event for a change to `target` in `source`: entity root → member.
///
/// For tables this is table → column; for namespaces it is the agent's core
/// node → the key node.
pub fn change_event(source: &str, target: &ChangeTarget) -> ChangeEvent {
    ChangeEvent {
        name: diagram_name(source, &target.entity),
        from: NodeId::entity(source, &target.entity).into_string(),
        to: NodeId::member(source, &target.entity, &target.sub_entity).into_string(),
    }
}
