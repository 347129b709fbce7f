//! Pull, restructure, push and mark: one batch per run.
//!
//! [`GraphPipeline::run`] is the only place that decides between commit
//! and rollback. Nodes, edges and the processed marker are written in a
//! single [`SinkTransaction`]; if any of the three fails the transaction is
//! rolled back and the source rows stay unprocessed, so the next run picks
//! them up again.
//!
//! Two overlapping runs against the same store can pull the same rows.
//! Callers must ensure only one run is active at a time.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{ConfigError, DatabaseConfig};
use crate::graph::{build_graph, compute_processed_ids, GraphError, ProcessedIds, RestructuredGraph};
use crate::store::{GraphRun, GraphSink, RowSource, SinkTransaction, SqliteStore, StoreError};
use crate::taxonomy::{validate_rows, TaxonomyRow, ValidationError};

/// Orchestrates a batch over a store that is both row source and sink.
pub struct GraphPipeline<S> {
    store: S,
}

impl<S: RowSource + GraphSink> GraphPipeline<S> {
    /// Creates a new pipeline over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gives the store back, e.g. to close it.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Pulls and restructures the pending rows without writing anything.
    ///
    /// Returns `None` when there is nothing to process.
    pub fn prepare(&self) -> Result<Option<PendingBatch>, PipelineError> {
        let raw = self.store.fetch_unprocessed()?;
        if raw.is_empty() {
            return Ok(None);
        }

        let rows = validate_rows(&raw)?;
        let graph = build_graph(&rows)?;
        let processed = compute_processed_ids(&rows, &graph.nodes);

        Ok(Some(PendingBatch {
            rows,
            graph,
            processed,
        }))
    }

    /// Runs one pull-restructure-push-mark cycle.
    pub fn run(&mut self) -> Result<BatchOutcome, PipelineError> {
        let batch = match self.prepare() {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                info!("no unprocessed taxonomy rows, nothing to do");
                return Ok(BatchOutcome::NoData);
            }
            Err(e) => {
                error!(error = %e, "batch rejected before writing");
                return Err(e);
            }
        };

        let run = GraphRun::new(&batch.graph);
        info!(
            run_id = %run.id,
            rows = batch.rows.len(),
            nodes = run.node_count,
            edges = run.edge_count,
            "restructured taxonomy batch"
        );

        let mut tx = self.store.begin(&run)?;
        if let Err(cause) = write_batch(&mut tx, &batch) {
            warn!(run_id = %run.id, error = %cause, "write failed, rolling back");
            return match tx.rollback() {
                Ok(()) => Err(PipelineError::RolledBack(cause)),
                Err(rollback) => Err(PipelineError::RollbackFailed { cause, rollback }),
            };
        }
        // A failed commit drops the transaction, which rolls it back.
        tx.commit().map_err(PipelineError::RolledBack)?;

        info!(run_id = %run.id, marked = batch.processed.len(), "graph committed");
        Ok(BatchOutcome::Committed(BatchSummary::new(&run, &batch)))
    }
}

fn write_batch<T: SinkTransaction>(tx: &mut T, batch: &PendingBatch) -> Result<(), StoreError> {
    tx.insert_nodes(&batch.graph.nodes)?;
    tx.insert_edges(&batch.graph.edges)?;
    tx.mark_processed(&batch.processed)
}

/// A restructured batch that has not been written yet.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub rows: Vec<TaxonomyRow>,
    pub graph: RestructuredGraph,
    pub processed: ProcessedIds,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// A graph was written and its source rows marked.
    Committed(BatchSummary),
    /// The source had no unprocessed rows; nothing was written.
    NoData,
}

/// Counts describing a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub rows: usize,
    pub nodes: usize,
    pub edges: usize,
    pub marked_subtopics: usize,
    pub marked_topics: usize,
    pub marked_macrotopics: usize,
}

impl BatchSummary {
    fn new(run: &GraphRun, batch: &PendingBatch) -> Self {
        Self {
            run_id: run.id.clone(),
            rows: batch.rows.len(),
            nodes: batch.graph.nodes.len(),
            edges: batch.graph.edges.len(),
            marked_subtopics: batch.processed.subtopic_ids.len(),
            marked_topics: batch.processed.topic_ids.len(),
            marked_macrotopics: batch.processed.macrotopic_ids.len(),
        }
    }
}

/// Errors that can end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid taxonomy rows: {0}")]
    Validation(#[from] ValidationError),

    #[error("Restructuring defect: {0}")]
    Logic(String),

    /// Failed before any write was attempted.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Write failed and was rolled back: {0}")]
    RolledBack(StoreError),

    #[error("Write failed ({cause}) and rollback failed: {rollback}")]
    RollbackFailed { cause: StoreError, rollback: StoreError },
}

impl From<GraphError> for PipelineError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Validation(e) => PipelineError::Validation(e),
            GraphError::Inconsistent(message) => PipelineError::Logic(message),
        }
    }
}

/// Externally visible result of a run.
#[derive(Debug)]
pub enum BatchResult {
    Committed(BatchSummary),
    NoData,
    Failed(PipelineError),
}

impl BatchResult {
    /// HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            BatchResult::Committed(_) => 200,
            BatchResult::NoData => 204,
            BatchResult::Failed(_) => 500,
        }
    }

    /// Process exit code for command-line invocations.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchResult::Committed(_) | BatchResult::NoData => 0,
            BatchResult::Failed(_) => 1,
        }
    }

    pub fn message(&self) -> String {
        match self {
            BatchResult::Committed(_) => "successfully restructured the data".to_string(),
            BatchResult::NoData => "nothing to restructure".to_string(),
            BatchResult::Failed(e) => {
                let outcome = match e {
                    PipelineError::Validation(_) => "batch rejected, nothing written",
                    PipelineError::Store(StoreError::Connectivity { .. }) => {
                        "cannot reach the store, nothing written"
                    }
                    PipelineError::Config(_) | PipelineError::Logic(_) | PipelineError::Store(_) => {
                        "restructuring failed, nothing written"
                    }
                    PipelineError::RolledBack(_) => "restructuring failed, changes rolled back",
                    PipelineError::RollbackFailed { .. } => "restructuring failed and rollback failed",
                };
                format!("{}: {}", outcome, e)
            }
        }
    }

    /// `{"statusCode": .., "body": {"message": .., "run": ..}}`
    pub fn to_response(&self) -> serde_json::Value {
        let run = match self {
            BatchResult::Committed(summary) => json!(summary),
            _ => serde_json::Value::Null,
        };
        json!({
            "statusCode": self.status_code(),
            "body": {
                "message": self.message(),
                "run": run,
            }
        })
    }
}

impl From<Result<BatchOutcome, PipelineError>> for BatchResult {
    fn from(result: Result<BatchOutcome, PipelineError>) -> Self {
        match result {
            Ok(BatchOutcome::Committed(summary)) => BatchResult::Committed(summary),
            Ok(BatchOutcome::NoData) => BatchResult::NoData,
            Err(e) => BatchResult::Failed(e),
        }
    }
}

/// Opens the configured store, runs one batch and closes the store.
///
/// The store is closed whether the run committed, found nothing, or failed.
pub fn execute(config: &DatabaseConfig) -> BatchResult {
    let store = match SqliteStore::open(&config.path) {
        Ok(store) => store,
        Err(e) => {
            error!(path = %config.path, error = %e, "cannot reach store");
            return BatchResult::Failed(e.into());
        }
    };

    let mut pipeline = GraphPipeline::new(store);
    let result = BatchResult::from(pipeline.run());

    if let Err(e) = pipeline.into_inner().close() {
        warn!(error = %e, "failed to close store");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};
    use crate::taxonomy::RawTaxonomyRow;

    #[derive(Default)]
    struct MockStore {
        rows: Vec<RawTaxonomyRow>,
        fail_on: Option<&'static str>,
        log: Vec<&'static str>,
    }

    struct MockTx<'a> {
        store: &'a mut MockStore,
        pending: Vec<&'static str>,
    }

    impl MockTx<'_> {
        fn step(&mut self, name: &'static str) -> Result<(), StoreError> {
            if self.store.fail_on == Some(name) {
                return Err(StoreError::Persistence(rusqlite::Error::QueryReturnedNoRows));
            }
            self.pending.push(name);
            Ok(())
        }
    }

    impl RowSource for MockStore {
        fn fetch_unprocessed(&self) -> Result<Vec<RawTaxonomyRow>, StoreError> {
            Ok(self.rows.clone())
        }
    }

    impl GraphSink for MockStore {
        type Transaction<'a> = MockTx<'a>;

        fn begin(&mut self, _run: &GraphRun) -> Result<Self::Transaction<'_>, StoreError> {
            self.log.push("begin");
            Ok(MockTx {
                store: self,
                pending: Vec::new(),
            })
        }
    }

    impl SinkTransaction for MockTx<'_> {
        fn insert_nodes(&mut self, _nodes: &[GraphNode]) -> Result<(), StoreError> {
            self.step("nodes")
        }

        fn insert_edges(&mut self, _edges: &[GraphEdge]) -> Result<(), StoreError> {
            self.step("edges")
        }

        fn mark_processed(&mut self, _ids: &ProcessedIds) -> Result<(), StoreError> {
            self.step("mark")
        }

        fn commit(self) -> Result<(), StoreError> {
            self.store.log.extend(self.pending);
            self.store.log.push("commit");
            Ok(())
        }

        fn rollback(self) -> Result<(), StoreError> {
            self.store.log.push("rollback");
            Ok(())
        }
    }

    fn store_with_rows() -> MockStore {
        MockStore {
            rows: vec![TaxonomyRow::new((1, "Pumps"), (2, "Hydraulics"), (3, "Engineering")).into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_commit_after_all_writes() {
        let mut pipeline = GraphPipeline::new(store_with_rows());

        let outcome = pipeline.run().unwrap();
        let BatchOutcome::Committed(summary) = outcome else {
            panic!("expected a committed batch");
        };
        assert_eq!((summary.rows, summary.nodes, summary.edges), (1, 3, 2));
        assert_eq!(pipeline.store().log, vec!["begin", "nodes", "edges", "mark", "commit"]);
    }

    #[test]
    fn test_mark_failure_rolls_back() {
        let store = MockStore {
            fail_on: Some("mark"),
            ..store_with_rows()
        };
        let mut pipeline = GraphPipeline::new(store);

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, PipelineError::RolledBack(_)));
        assert_eq!(pipeline.store().log, vec!["begin", "rollback"]);
        assert!(BatchResult::Failed(err).message().starts_with("restructuring failed, changes rolled back"));
    }

    #[test]
    fn test_no_rows_no_writes() {
        let mut pipeline = GraphPipeline::new(MockStore::default());

        assert_eq!(pipeline.run().unwrap(), BatchOutcome::NoData);
        assert!(pipeline.store().log.is_empty());
    }

    #[test]
    fn test_invalid_rows_never_open_a_transaction() {
        let store = MockStore {
            rows: vec![RawTaxonomyRow::default()],
            ..Default::default()
        };
        let mut pipeline = GraphPipeline::new(store);

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(pipeline.store().log.is_empty());
    }

    #[test]
    fn test_batch_result_codes() {
        let failed = BatchResult::Failed(PipelineError::Logic("boom".to_string()));
        assert_eq!(failed.status_code(), 500);
        assert_eq!(failed.exit_code(), 1);
        assert!(failed.message().contains("boom"));
        assert!(failed.message().starts_with("restructuring failed, nothing written"));

        let rejected = BatchResult::Failed(PipelineError::Validation(ValidationError::Rejected(vec![])));
        assert!(rejected.message().starts_with("batch rejected, nothing written"));

        let unreachable = BatchResult::Failed(PipelineError::Store(StoreError::connectivity(
            "/nowhere/taxonomy.db",
            rusqlite::Error::InvalidQuery,
        )));
        assert!(unreachable.message().starts_with("cannot reach the store, nothing written"));

        assert_eq!(BatchResult::NoData.status_code(), 204);
        assert_eq!(BatchResult::NoData.exit_code(), 0);

        let response = BatchResult::NoData.to_response();
        assert_eq!(response["statusCode"], 204);
        assert_eq!(response["body"]["message"], "nothing to restructure");
        assert!(response["body"]["run"].is_null());
    }
}
