//! Taxograph: restructures a macrotopic/topic/subtopic taxonomy into a
//! deduplicated node/edge graph for graph viewers such as Gephi.

pub mod config;
pub mod graph;
pub mod pipeline;
pub mod store;
pub mod taxonomy;

pub use config::{Config, ConfigError, ConfigOverrides, DatabaseConfig};
pub use graph::{build_graph, compute_processed_ids, GraphEdge, GraphNode, ProcessedIds, RestructuredGraph};
pub use pipeline::{execute, BatchOutcome, BatchResult, BatchSummary, GraphPipeline, PipelineError};
pub use store::{GraphRun, GraphSink, RowSource, SinkTransaction, SqliteStore, StoreError};
pub use taxonomy::{validate_rows, RawTaxonomyRow, TaxonomyRow, ValidationError};
