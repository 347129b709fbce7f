//! Restructuring engine: taxonomy rows in, graph nodes and edges out.
//!
//! [`build_graph`] is a pure function. Every distinct label across the
//! subtopic, topic and macrotopic columns becomes exactly one node, and
//! each row contributes a macrotopic-topic and a topic-subtopic edge.
//! Edges are undirected, so `(A, B)` and `(B, A)` are the same edge.
//!
//! Node ids and edge ids are two independent sequences starting at 1,
//! assigned in order of first appearance. Labels are collected per row in
//! the order subtopic, topic, macrotopic.
//!
//! # Example
//!
//! ```
//! use taxograph_core::graph::build_graph;
//! use taxograph_core::taxonomy::TaxonomyRow;
//!
//! let rows = vec![TaxonomyRow::new((10, "Pumps"), (20, "Hydraulics"), (30, "Engineering"))];
//! let graph = build_graph(&rows).unwrap();
//!
//! assert_eq!(graph.nodes.len(), 3);
//! assert_eq!(graph.edges[0].source_label, "Engineering");
//! assert_eq!(graph.edges[0].target_label, "Hydraulics");
//! ```

mod error;
pub mod processed;

pub use error::GraphError;
pub use processed::{compute_processed_ids, ProcessedIds};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::taxonomy::{Level, SourceId, TaxonomyRow, ValidationError};

/// Batch-local node identifier.
pub type NodeId = u64;

/// Batch-local edge identifier.
pub type EdgeId = u64;

/// Source ids that fed a node, per taxonomy level.
///
/// A label that occurs at several levels, or under several parents at the
/// same level, collapses into one node carrying all of its source ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSources {
    pub subtopic_ids: BTreeSet<SourceId>,
    pub topic_ids: BTreeSet<SourceId>,
    pub macrotopic_ids: BTreeSet<SourceId>,
}

impl NodeSources {
    pub fn ids(&self, level: Level) -> &BTreeSet<SourceId> {
        match level {
            Level::Subtopic => &self.subtopic_ids,
            Level::Topic => &self.topic_ids,
            Level::Macrotopic => &self.macrotopic_ids,
        }
    }

    pub fn insert(&mut self, level: Level, id: SourceId) {
        let ids = match level {
            Level::Subtopic => &mut self.subtopic_ids,
            Level::Topic => &mut self.topic_ids,
            Level::Macrotopic => &mut self.macrotopic_ids,
        };
        ids.insert(id);
    }

    /// Levels at which the label occurred.
    pub fn levels(&self) -> Vec<Level> {
        Level::ALL
            .into_iter()
            .filter(|level| !self.ids(*level).is_empty())
            .collect()
    }
}

/// A graph vertex: one distinct taxonomy label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub sources: NodeSources,
}

impl GraphNode {
    /// Lowest subtopic id behind this node, if the label was a subtopic.
    pub fn subtopic_id(&self) -> Option<SourceId> {
        self.sources.subtopic_ids.first().copied()
    }

    /// Lowest topic id behind this node, if the label was a topic.
    pub fn topic_id(&self) -> Option<SourceId> {
        self.sources.topic_ids.first().copied()
    }

    /// Lowest macrotopic id behind this node, if the label was a macrotopic.
    pub fn macrotopic_id(&self) -> Option<SourceId> {
        self.sources.macrotopic_ids.first().copied()
    }
}

/// Edge type as understood by Gephi.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    #[default]
    Undirected,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Undirected => "undirected",
        }
    }

    pub fn parse(s: &str) -> Option<EdgeType> {
        match s {
            "undirected" => Some(EdgeType::Undirected),
            _ => None,
        }
    }
}

/// An undirected connection between a parent-level and a child-level node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub source_label: String,
    pub target_id: NodeId,
    pub target_label: String,
    pub edge_type: EdgeType,
}

impl GraphEdge {
    /// The unordered node pair this edge connects.
    pub fn key(&self) -> (NodeId, NodeId) {
        undirected_key(self.source_id, self.target_id)
    }

    /// Whether this edge connects `a` and `b`, in either direction.
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        self.key() == undirected_key(a, b)
    }
}

fn undirected_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Deduplicated nodes and edges for one batch, in assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestructuredGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl RestructuredGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node_by_label(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.label == label)
    }
}

/// Restructures a batch of rows into a graph.
///
/// Every row is checked before any id is assigned. An empty batch yields
/// an empty graph.
pub fn build_graph(rows: &[TaxonomyRow]) -> Result<RestructuredGraph, GraphError> {
    check_rows(rows)?;

    let mut builder = GraphBuilder::new();
    for row in rows {
        for level in Level::ALL {
            builder.add_label(row.label(level), level, row.id(level))?;
        }
    }
    for row in rows {
        builder.add_edge(&row.macrotopic_name, &row.topic_name)?;
        builder.add_edge(&row.topic_name, &row.subtopic_name)?;
    }

    builder.finish()
}

fn check_rows(rows: &[TaxonomyRow]) -> Result<(), ValidationError> {
    let errors: Vec<ValidationError> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| row.check_labels(index).err())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Rejected(errors))
    }
}

/// Accumulates nodes and edges for a single batch.
struct GraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    label_ids: HashMap<String, NodeId>,
    seen_edges: HashSet<(NodeId, NodeId)>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            label_ids: HashMap::new(),
            seen_edges: HashSet::new(),
        }
    }

    /// Records an occurrence of `label`, creating its node on first sight.
    fn add_label(&mut self, label: &str, level: Level, source_id: SourceId) -> Result<(), GraphError> {
        let id = match self.label_ids.get(label) {
            Some(id) => *id,
            None => {
                let id = self.nodes.len() as NodeId + 1;
                self.label_ids.insert(label.to_string(), id);
                self.nodes.push(GraphNode {
                    id,
                    label: label.to_string(),
                    sources: NodeSources::default(),
                });
                id
            }
        };

        let node = self
            .nodes
            .get_mut((id - 1) as usize)
            .filter(|n| n.label == label)
            .ok_or_else(|| {
                GraphError::Inconsistent(format!("label '{}' maps to missing node {}", label, id))
            })?;
        node.sources.insert(level, source_id);
        Ok(())
    }

    /// Adds the edge `source - target` unless the pair is already connected.
    fn add_edge(&mut self, source: &str, target: &str) -> Result<(), GraphError> {
        let source_id = self.resolve(source)?;
        let target_id = self.resolve(target)?;

        if self.seen_edges.insert(undirected_key(source_id, target_id)) {
            self.edges.push(GraphEdge {
                id: self.edges.len() as EdgeId + 1,
                source_id,
                source_label: source.to_string(),
                target_id,
                target_label: target.to_string(),
                edge_type: EdgeType::Undirected,
            });
        }
        Ok(())
    }

    fn resolve(&self, label: &str) -> Result<NodeId, GraphError> {
        self.label_ids
            .get(label)
            .copied()
            .ok_or_else(|| GraphError::Inconsistent(format!("no node for label '{}'", label)))
    }

    /// Every distinct label must own exactly one node.
    fn finish(self) -> Result<RestructuredGraph, GraphError> {
        if self.label_ids.len() != self.nodes.len() {
            return Err(GraphError::Inconsistent(format!(
                "{} nodes for {} distinct labels",
                self.nodes.len(),
                self.label_ids.len()
            )));
        }
        Ok(RestructuredGraph {
            nodes: self.nodes,
            edges: self.edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ids: (SourceId, SourceId, SourceId), sub: &str, topic: &str, macro_: &str) -> TaxonomyRow {
        TaxonomyRow::new((ids.0, sub), (ids.1, topic), (ids.2, macro_))
    }

    #[test]
    fn test_single_row() {
        let graph = build_graph(&[row((1, 1, 1), "Pumps", "Hydraulics", "Engineering")]).unwrap();

        let labels: Vec<_> = graph.nodes.iter().map(|n| (n.id, n.label.as_str())).collect();
        assert_eq!(labels, vec![(1, "Pumps"), (2, "Hydraulics"), (3, "Engineering")]);

        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].id, 1);
        assert_eq!((graph.edges[0].source_id, graph.edges[0].target_id), (3, 2));
        assert_eq!(graph.edges[1].id, 2);
        assert_eq!((graph.edges[1].source_id, graph.edges[1].target_id), (2, 1));
        assert!(graph.edges.iter().all(|e| e.edge_type == EdgeType::Undirected));
    }

    #[test]
    fn test_empty_batch() {
        let graph = build_graph(&[]).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_shared_parents_are_not_duplicated() {
        let rows = vec![
            row((1, 10, 100), "Pumps", "Hydraulics", "Engineering"),
            row((2, 10, 100), "Valves", "Hydraulics", "Engineering"),
        ];
        let graph = build_graph(&rows).unwrap();

        assert_eq!(graph.nodes.len(), 4);
        // Engineering-Hydraulics once, then one edge per subtopic.
        assert_eq!(graph.edges.len(), 3);
        let ids: Vec<_> = graph.edges.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_reverse_direction_is_same_edge() {
        // "Hydraulics" is a topic under "Engineering" in the first row and
        // the macrotopic of "Engineering" in the second.
        let rows = vec![
            row((1, 10, 100), "Pumps", "Hydraulics", "Engineering"),
            row((2, 11, 101), "Valves", "Engineering", "Hydraulics"),
        ];
        let graph = build_graph(&rows).unwrap();

        let between: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.connects(2, 3))
            .collect();
        assert_eq!(between.len(), 1);
        assert_eq!(graph.nodes.len(), 4);
    }

    #[test]
    fn test_collapsed_label_carries_both_levels() {
        let graph = build_graph(&[row((7, 8, 9), "Safety", "Safety", "Operations")]).unwrap();

        assert_eq!(graph.nodes.len(), 2);
        let safety = graph.node_by_label("Safety").unwrap();
        assert_eq!(safety.subtopic_id(), Some(7));
        assert_eq!(safety.topic_id(), Some(8));
        assert_eq!(safety.macrotopic_id(), None);
        assert_eq!(safety.sources.levels(), vec![Level::Subtopic, Level::Topic]);
    }

    #[test]
    fn test_same_name_under_two_parents() {
        let rows = vec![
            row((1, 10, 100), "Overview", "Hydraulics", "Engineering"),
            row((2, 11, 100), "Overview", "Electrics", "Engineering"),
        ];
        let graph = build_graph(&rows).unwrap();

        let overview = graph.node_by_label("Overview").unwrap();
        assert_eq!(overview.sources.subtopic_ids, BTreeSet::from([1, 2]));
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 4);
    }

    #[test]
    fn test_blank_label_rejects_before_assigning_ids() {
        let rows = vec![
            row((1, 10, 100), "Pumps", "Hydraulics", "Engineering"),
            row((2, 10, 100), " ", "Hydraulics", "Engineering"),
        ];
        let err = build_graph(&rows).unwrap_err();
        match err {
            GraphError::Validation(v) => {
                assert_eq!(
                    v.row_errors(),
                    &[ValidationError::EmptyLabel { row: 1, level: Level::Subtopic }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_finish_rejects_node_without_label_entry() {
        let mut builder = GraphBuilder::new();
        builder.add_label("Pumps", Level::Subtopic, 1).unwrap();
        builder.nodes.push(GraphNode {
            id: 2,
            label: "Orphan".to_string(),
            sources: NodeSources::default(),
        });

        let err = builder.finish().unwrap_err();
        assert!(matches!(err, GraphError::Inconsistent(msg) if msg == "2 nodes for 1 distinct labels"));
    }

    #[test]
    fn test_edge_connects_either_direction() {
        let edge = GraphEdge {
            id: 1,
            source_id: 4,
            source_label: "a".into(),
            target_id: 2,
            target_label: "b".into(),
            edge_type: EdgeType::Undirected,
        };
        assert!(edge.connects(2, 4));
        assert!(edge.connects(4, 2));
        assert!(!edge.connects(4, 3));
        assert_eq!(edge.key(), (2, 4));
    }
}
