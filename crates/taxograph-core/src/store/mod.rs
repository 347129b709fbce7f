//! Row sources and persistence sinks.
//!
//! The orchestrator only talks to the traits in this module. A batch is
//! written through a [`SinkTransaction`]: nodes, edges and the processed
//! marker either all become visible on [`SinkTransaction::commit`] or none
//! do.

mod error;
pub mod gephi;
mod sqlite;

pub use error::StoreError;
pub use gephi::{export_gephi_csv, GephiExport};
pub use sqlite::{SqliteStore, SqliteTransaction, TaxonomyRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::{GraphEdge, GraphNode, ProcessedIds, RestructuredGraph};
use crate::taxonomy::RawTaxonomyRow;

/// Trait for stores that hand out unprocessed taxonomy rows.
pub trait RowSource {
    /// Returns every joined row that is not yet processed at all three levels.
    fn fetch_unprocessed(&self) -> Result<Vec<RawTaxonomyRow>, StoreError>;
}

/// Trait for stores that accept a restructured batch.
pub trait GraphSink {
    type Transaction<'a>: SinkTransaction
    where
        Self: 'a;

    /// Opens a transaction scoped to `run`.
    fn begin(&mut self, run: &GraphRun) -> Result<Self::Transaction<'_>, StoreError>;
}

/// One all-or-nothing write of a batch.
///
/// Dropping a transaction without calling [`commit`](Self::commit) must
/// discard its writes.
pub trait SinkTransaction {
    /// Writes the batch's nodes, including their source-id tags.
    fn insert_nodes(&mut self, nodes: &[GraphNode]) -> Result<(), StoreError>;

    /// Writes the batch's edges.
    fn insert_edges(&mut self, edges: &[GraphEdge]) -> Result<(), StoreError>;

    /// Flags the given source rows as processed.
    fn mark_processed(&mut self, ids: &ProcessedIds) -> Result<(), StoreError>;

    /// Makes every write of this transaction visible.
    fn commit(self) -> Result<(), StoreError>;

    /// Discards every write of this transaction.
    fn rollback(self) -> Result<(), StoreError>;
}

/// A committed (or about to be committed) batch.
///
/// Node and edge ids restart at 1 for every batch, so stored rows are keyed
/// by the run id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRun {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl GraphRun {
    /// Creates a run record for the given graph.
    pub fn new(graph: &RestructuredGraph) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
        }
    }
}
