//! Gephi spreadsheet export.
//!
//! Writes a node table (`Id,Label,Level`) and an edge table
//! (`Source,Target,Type,Id`) that Gephi's "Import spreadsheet" dialog
//! accepts as-is.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{DEFAULT_EDGES_FILE, DEFAULT_NODES_FILE};
use crate::graph::RestructuredGraph;

use super::error::StoreError;

/// Paths of the files written by [`export_gephi_csv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GephiExport {
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
}

#[derive(Serialize)]
struct NodeRecord<'a> {
    #[serde(rename = "Id")]
    id: u64,
    #[serde(rename = "Label")]
    label: &'a str,
    #[serde(rename = "Level")]
    level: String,
}

#[derive(Serialize)]
struct EdgeRecord {
    #[serde(rename = "Source")]
    source: u64,
    #[serde(rename = "Target")]
    target: u64,
    #[serde(rename = "Type")]
    edge_type: &'static str,
    #[serde(rename = "Id")]
    id: u64,
}

/// Write `nodes.csv` and `edges.csv` for `graph` into `dir`.
///
/// The directory is created if needed; existing files are overwritten.
pub fn export_gephi_csv(graph: &RestructuredGraph, dir: &Path) -> Result<GephiExport, StoreError> {
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let nodes_path = dir.join(DEFAULT_NODES_FILE);
    let mut writer = csv::Writer::from_path(&nodes_path)?;
    for node in &graph.nodes {
        let level = node
            .sources
            .levels()
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join("|");
        writer.serialize(NodeRecord {
            id: node.id,
            label: &node.label,
            level,
        })?;
    }
    writer.flush().map_err(|e| StoreError::io(&nodes_path, e))?;

    let edges_path = dir.join(DEFAULT_EDGES_FILE);
    let mut writer = csv::Writer::from_path(&edges_path)?;
    for edge in &graph.edges {
        writer.serialize(EdgeRecord {
            source: edge.source_id,
            target: edge.target_id,
            edge_type: edge.edge_type.as_str(),
            id: edge.id,
        })?;
    }
    writer.flush().map_err(|e| StoreError::io(&edges_path, e))?;

    Ok(GephiExport {
        nodes_path,
        edges_path,
    })
}
