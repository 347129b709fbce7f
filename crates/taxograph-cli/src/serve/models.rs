//! API response models for the viewer API.

use serde::Serialize;

/// Full graph response in Graphology's serialized format.
#[derive(Debug, Serialize)]
pub struct GraphData {
    pub attributes: GraphAttributes,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Graph-level attributes identifying the run.
#[derive(Debug, Serialize)]
pub struct GraphAttributes {
    pub run_id: String,
    pub created_at: String,
}

/// A node in the graph visualization.
#[derive(Debug, Serialize)]
pub struct GraphNode {
    /// Node id within its run.
    pub key: String,
    pub attributes: NodeAttributes,
}

/// Node attributes for rendering and display.
#[derive(Debug, Serialize)]
pub struct NodeAttributes {
    pub label: String,
    /// Taxonomy levels the label came from, joined with `|`.
    /// Not Sigma's render type.
    pub category: String,
    /// Hex color for rendering.
    pub color: String,
    /// Node size in pixels.
    pub size: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtopic_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topic_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub macrotopic_ids: Vec<i64>,
}

/// An edge in the graph visualization.
#[derive(Debug, Serialize)]
pub struct GraphEdge {
    /// Edge id within its run.
    pub key: String,
    pub source: String,
    pub target: String,
    pub undirected: bool,
    pub attributes: EdgeAttributes,
}

/// Edge attributes for rendering.
#[derive(Debug, Serialize)]
pub struct EdgeAttributes {
    /// Named "relationship" to stay clear of Sigma's edge `type`.
    pub relationship: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
