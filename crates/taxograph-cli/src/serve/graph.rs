//! Conversion from a stored run to the Graphology format.

use taxograph_core::graph::{GraphNode as TaxonomyNode, RestructuredGraph};
use taxograph_core::store::GraphRun;
use taxograph_core::taxonomy::Level;

use super::models::{EdgeAttributes, GraphAttributes, GraphData, GraphEdge, GraphNode, NodeAttributes};

// =============================================================================
// Node Styling
// =============================================================================

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Macrotopic => "#cf222e", // Red
        Level::Topic => "#9a6700",      // Orange
        Level::Subtopic => "#0969da",   // Blue
    }
}

fn level_size(level: Level) -> u32 {
    match level {
        Level::Macrotopic => 14,
        Level::Topic => 10,
        Level::Subtopic => 6,
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Build the viewer payload for one run.
pub fn to_graph_data(run: &GraphRun, graph: &RestructuredGraph) -> GraphData {
    GraphData {
        attributes: GraphAttributes {
            run_id: run.id.clone(),
            created_at: run.created_at.to_rfc3339(),
        },
        nodes: graph.nodes.iter().map(to_node).collect(),
        edges: graph
            .edges
            .iter()
            .map(|edge| GraphEdge {
                key: edge.id.to_string(),
                source: edge.source_id.to_string(),
                target: edge.target_id.to_string(),
                undirected: true,
                attributes: EdgeAttributes {
                    relationship: edge.edge_type.as_str().to_string(),
                },
            })
            .collect(),
    }
}

fn to_node(node: &TaxonomyNode) -> GraphNode {
    let levels = node.sources.levels();
    // A label shared across levels is drawn as its highest level.
    let primary = levels.iter().copied().max().unwrap_or(Level::Subtopic);
    let ids = |level: Level| -> Vec<i64> { node.sources.ids(level).iter().copied().collect() };

    GraphNode {
        key: node.id.to_string(),
        attributes: NodeAttributes {
            label: node.label.clone(),
            category: levels.iter().map(|l| l.as_str()).collect::<Vec<_>>().join("|"),
            color: level_color(primary).to_string(),
            size: level_size(primary),
            subtopic_ids: ids(Level::Subtopic),
            topic_ids: ids(Level::Topic),
            macrotopic_ids: ids(Level::Macrotopic),
        },
    }
}
