//! SQLite store holding both the taxonomy and the derived graph.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{
    EdgeType, GraphEdge, GraphNode, NodeId, NodeSources, ProcessedIds, RestructuredGraph,
};
use crate::taxonomy::{Level, RawTaxonomyRow, SourceId};

use super::error::StoreError;
use super::{GraphRun, GraphSink, RowSource, SinkTransaction};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS macrotopic (
        id INTEGER PRIMARY KEY,
        name TEXT,
        status INTEGER
    );

    CREATE TABLE IF NOT EXISTS topic (
        id INTEGER PRIMARY KEY,
        name TEXT,
        macrotopic_id INTEGER REFERENCES macrotopic(id),
        status INTEGER
    );

    CREATE TABLE IF NOT EXISTS qna_subtopic (
        id INTEGER PRIMARY KEY,
        name TEXT,
        topic_id INTEGER REFERENCES topic(id),
        status INTEGER
    );

    CREATE TABLE IF NOT EXISTS graph_run (
        run_id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        node_count INTEGER NOT NULL,
        edge_count INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS gephi_node (
        run_id TEXT NOT NULL REFERENCES graph_run(run_id),
        node_id INTEGER NOT NULL,
        label TEXT NOT NULL,
        PRIMARY KEY (run_id, node_id),
        UNIQUE (run_id, label)
    );

    CREATE TABLE IF NOT EXISTS gephi_node_source (
        run_id TEXT NOT NULL,
        node_id INTEGER NOT NULL,
        level TEXT NOT NULL,
        source_id INTEGER NOT NULL,
        PRIMARY KEY (run_id, node_id, level, source_id),
        FOREIGN KEY (run_id, node_id) REFERENCES gephi_node(run_id, node_id)
    );

    CREATE TABLE IF NOT EXISTS gephi_edge (
        run_id TEXT NOT NULL REFERENCES graph_run(run_id),
        edge_id INTEGER NOT NULL,
        source_node INTEGER NOT NULL,
        source_label TEXT NOT NULL,
        target_node INTEGER NOT NULL,
        target_label TEXT NOT NULL,
        edge_type TEXT NOT NULL,
        PRIMARY KEY (run_id, edge_id)
    );

    CREATE INDEX IF NOT EXISTS idx_topic_macrotopic ON topic(macrotopic_id);
    CREATE INDEX IF NOT EXISTS idx_subtopic_topic ON qna_subtopic(topic_id);
"#;

// Rows are pulled unless all three levels are already processed.
const UNPROCESSED_ROWS: &str = r#"
    SELECT s.id, s.name, t.id, t.name, m.id, m.name
    FROM qna_subtopic s
    JOIN topic t ON s.topic_id = t.id
    JOIN macrotopic m ON t.macrotopic_id = m.id
    WHERE COALESCE(s.status, 0) = 0
       OR COALESCE(t.status, 0) = 0
       OR COALESCE(m.status, 0) = 0
    ORDER BY s.id
"#;

const PROCESSED: i64 = 1;

/// One line of a taxonomy import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub macrotopic: String,
    pub topic: String,
    pub subtopic: String,
}

impl TaxonomyRecord {
    /// Builds a record with trimmed names, or names the first blank level.
    pub fn new(macrotopic: &str, topic: &str, subtopic: &str) -> Result<Self, Level> {
        let name = |value: &str, level: Level| -> Result<String, Level> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(level)
            } else {
                Ok(trimmed.to_string())
            }
        };
        Ok(Self {
            macrotopic: name(macrotopic, Level::Macrotopic)?,
            topic: name(topic, Level::Topic)?,
            subtopic: name(subtopic, Level::Subtopic)?,
        })
    }
}

/// SQLite-backed row source and graph sink.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path and ensure its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::connectivity(path.display().to_string(), e))?;
        Self::with_connection(conn)
    }

    /// Create a throwaway in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::connectivity(":memory:", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist yet.
    pub fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Underlying connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::from(e))
    }

    /// Insert a macrotopic/topic/subtopic chain, reusing existing entries
    /// with the same name under the same parent.
    ///
    /// Names are trimmed; a blank name is rejected. Returns the
    /// `(subtopic, topic, macrotopic)` ids.
    pub fn insert_taxonomy(
        &mut self,
        macrotopic: &str,
        topic: &str,
        subtopic: &str,
    ) -> Result<(SourceId, SourceId, SourceId), StoreError> {
        let record = TaxonomyRecord::new(macrotopic, topic, subtopic)
            .map_err(|level| StoreError::BlankLabel { level })?;
        let tx = self.conn.transaction()?;
        let ids = insert_chain(&tx, &record)?;
        tx.commit()?;
        Ok(ids)
    }

    /// Import `macrotopic,topic,subtopic` records from a CSV file.
    ///
    /// The whole file is imported in one transaction: a record with a blank
    /// field fails the import and nothing is inserted. Returns the number of
    /// records read.
    pub fn import_csv(&mut self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.clone();
        let tx = self.conn.transaction()?;

        let mut count = 0;
        for result in reader.records() {
            let raw = result?;
            let line = raw.position().map_or(0, |p| p.line());
            let record: TaxonomyRecord = raw.deserialize(Some(&headers))?;
            let record = TaxonomyRecord::new(&record.macrotopic, &record.topic, &record.subtopic)
                .map_err(|level| StoreError::InvalidRecord { line, level })?;
            insert_chain(&tx, &record)?;
            count += 1;
        }

        tx.commit()?;
        debug!(records = count, path = %path.as_ref().display(), "taxonomy imported");
        Ok(count)
    }

    /// All committed runs, most recent first.
    pub fn list_runs(&self) -> Result<Vec<GraphRun>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, created_at, node_count, edge_count
             FROM graph_run ORDER BY created_at DESC, rowid DESC",
        )?;
        let runs = stmt
            .query_map([], run_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    /// The most recently committed run, if any.
    pub fn latest_run(&self) -> Result<Option<GraphRun>, StoreError> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id, created_at, node_count, edge_count
                 FROM graph_run ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// The committed run with the given id, if any.
    pub fn run(&self, run_id: &str) -> Result<Option<GraphRun>, StoreError> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id, created_at, node_count, edge_count
                 FROM graph_run WHERE run_id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Load the nodes and edges written by a run.
    pub fn load_graph(&self, run_id: &str) -> Result<RestructuredGraph, StoreError> {
        if self.run(run_id)?.is_none() {
            return Err(StoreError::RunNotFound(run_id.to_string()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT node_id, label FROM gephi_node WHERE run_id = ?1 ORDER BY node_id",
        )?;
        let mut nodes = stmt
            .query_map(params![run_id], |row| {
                Ok(GraphNode {
                    id: row.get::<_, i64>(0)? as NodeId,
                    label: row.get(1)?,
                    sources: NodeSources::default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let positions: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

        let mut stmt = self.conn.prepare(
            "SELECT node_id, level, source_id FROM gephi_node_source WHERE run_id = ?1",
        )?;
        let sources = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)? as NodeId,
                    row.get::<_, String>(1)?,
                    row.get::<_, SourceId>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (node_id, level, source_id) in sources {
            let level = Level::parse(&level).ok_or_else(|| StoreError::Corrupted {
                table: "gephi_node_source",
                message: format!("unknown level '{}'", level),
            })?;
            let index = positions.get(&node_id).ok_or_else(|| StoreError::Corrupted {
                table: "gephi_node_source",
                message: format!("source for missing node {}", node_id),
            })?;
            nodes[*index].sources.insert(level, source_id);
        }

        let mut stmt = self.conn.prepare(
            "SELECT edge_id, source_node, source_label, target_node, target_label, edge_type
             FROM gephi_edge WHERE run_id = ?1 ORDER BY edge_id",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut edges = Vec::with_capacity(rows.len());
        for (id, source_id, source_label, target_id, target_label, edge_type) in rows {
            let edge_type = EdgeType::parse(&edge_type).ok_or_else(|| StoreError::Corrupted {
                table: "gephi_edge",
                message: format!("unknown edge type '{}'", edge_type),
            })?;
            edges.push(GraphEdge {
                id: id as u64,
                source_id: source_id as NodeId,
                source_label,
                target_id: target_id as NodeId,
                target_label,
                edge_type,
            });
        }

        Ok(RestructuredGraph { nodes, edges })
    }

    /// Number of stored nodes across all runs.
    pub fn count_nodes(&self) -> Result<usize, StoreError> {
        self.count("gephi_node")
    }

    /// Number of stored edges across all runs.
    pub fn count_edges(&self) -> Result<usize, StoreError> {
        self.count("gephi_edge")
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RowSource for SqliteStore {
    fn fetch_unprocessed(&self) -> Result<Vec<RawTaxonomyRow>, StoreError> {
        let mut stmt = self.conn.prepare(UNPROCESSED_ROWS)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawTaxonomyRow {
                    subtopic_id: row.get(0)?,
                    subtopic_name: row.get(1)?,
                    topic_id: row.get(2)?,
                    topic_name: row.get(3)?,
                    macrotopic_id: row.get(4)?,
                    macrotopic_name: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(rows = rows.len(), "fetched unprocessed taxonomy rows");
        Ok(rows)
    }
}

impl GraphSink for SqliteStore {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn begin(&mut self, run: &GraphRun) -> Result<Self::Transaction<'_>, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO graph_run (run_id, created_at, node_count, edge_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &run.id,
                run.created_at,
                run.node_count as i64,
                run.edge_count as i64
            ],
        )?;
        debug!(run_id = %run.id, "transaction opened");

        Ok(SqliteTransaction {
            tx,
            run_id: run.id.clone(),
        })
    }
}

/// An open write of one run. Dropping it uncommitted rolls it back.
pub struct SqliteTransaction<'a> {
    tx: Transaction<'a>,
    run_id: String,
}

impl SinkTransaction for SqliteTransaction<'_> {
    fn insert_nodes(&mut self, nodes: &[GraphNode]) -> Result<(), StoreError> {
        let mut insert_node = self
            .tx
            .prepare("INSERT INTO gephi_node (run_id, node_id, label) VALUES (?1, ?2, ?3)")?;
        let mut insert_source = self.tx.prepare(
            "INSERT INTO gephi_node_source (run_id, node_id, level, source_id)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for node in nodes {
            insert_node.execute(params![&self.run_id, node.id as i64, &node.label])?;
            for level in Level::ALL {
                for source_id in node.sources.ids(level) {
                    insert_source.execute(params![
                        &self.run_id,
                        node.id as i64,
                        level.as_str(),
                        source_id
                    ])?;
                }
            }
        }

        debug!(run_id = %self.run_id, nodes = nodes.len(), "nodes inserted");
        Ok(())
    }

    fn insert_edges(&mut self, edges: &[GraphEdge]) -> Result<(), StoreError> {
        let mut stmt = self.tx.prepare(
            "INSERT INTO gephi_edge
             (run_id, edge_id, source_node, source_label, target_node, target_label, edge_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for edge in edges {
            stmt.execute(params![
                &self.run_id,
                edge.id as i64,
                edge.source_id as i64,
                &edge.source_label,
                edge.target_id as i64,
                &edge.target_label,
                edge.edge_type.as_str(),
            ])?;
        }

        debug!(run_id = %self.run_id, edges = edges.len(), "edges inserted");
        Ok(())
    }

    fn mark_processed(&mut self, ids: &ProcessedIds) -> Result<(), StoreError> {
        for level in Level::ALL {
            let sql = format!("UPDATE {} SET status = ?1 WHERE id = ?2", level_table(level));
            let mut stmt = self.tx.prepare(&sql)?;
            for id in ids.ids(level) {
                stmt.execute(params![PROCESSED, id])?;
            }
        }

        debug!(run_id = %self.run_id, ids = ids.len(), "source rows marked processed");
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}

fn level_table(level: Level) -> &'static str {
    match level {
        Level::Subtopic => "qna_subtopic",
        Level::Topic => "topic",
        Level::Macrotopic => "macrotopic",
    }
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GraphRun> {
    Ok(GraphRun {
        id: row.get(0)?,
        created_at: row.get(1)?,
        node_count: row.get::<_, i64>(2)? as usize,
        edge_count: row.get::<_, i64>(3)? as usize,
    })
}

fn insert_chain(
    conn: &Connection,
    record: &TaxonomyRecord,
) -> Result<(SourceId, SourceId, SourceId), StoreError> {
    let macrotopic_id = find_or_insert(
        conn,
        "SELECT id FROM macrotopic WHERE name = ?1",
        "INSERT INTO macrotopic (name) VALUES (?1)",
        params![record.macrotopic],
    )?;
    let topic_id = find_or_insert(
        conn,
        "SELECT id FROM topic WHERE name = ?1 AND macrotopic_id = ?2",
        "INSERT INTO topic (name, macrotopic_id) VALUES (?1, ?2)",
        params![record.topic, macrotopic_id],
    )?;
    let subtopic_id = find_or_insert(
        conn,
        "SELECT id FROM qna_subtopic WHERE name = ?1 AND topic_id = ?2",
        "INSERT INTO qna_subtopic (name, topic_id) VALUES (?1, ?2)",
        params![record.subtopic, topic_id],
    )?;
    Ok((subtopic_id, topic_id, macrotopic_id))
}

fn find_or_insert(
    conn: &Connection,
    select: &str,
    insert: &str,
    values: &[&dyn rusqlite::ToSql],
) -> Result<SourceId, StoreError> {
    if let Some(id) = conn
        .query_row(select, values, |row| row.get(0))
        .optional()?
    {
        return Ok(id);
    }
    conn.execute(insert, values)?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_taxonomy_reuses_parents() {
        let mut store = SqliteStore::in_memory().unwrap();

        let (s1, t1, m1) = store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();
        let (s2, t2, m2) = store.insert_taxonomy("Engineering", "Hydraulics", "Valves").unwrap();
        let (s3, t3, m3) = store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();

        assert_ne!(s1, s2);
        assert_eq!((t1, m1), (t2, m2));
        assert_eq!((s1, t1, m1), (s3, t3, m3));
    }

    #[test]
    fn test_insert_taxonomy_trims_and_rejects_blank_names() {
        let mut store = SqliteStore::in_memory().unwrap();

        let first = store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();
        let padded = store.insert_taxonomy(" Engineering ", "Hydraulics\t", "Pumps").unwrap();
        assert_eq!(first, padded);

        let err = store.insert_taxonomy("Engineering", "  ", "Valves").unwrap_err();
        assert!(matches!(err, StoreError::BlankLabel { level: Level::Topic }));
        assert_eq!(store.fetch_unprocessed().unwrap().len(), 1);
    }

    #[test]
    fn test_run_lookup() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();
        let graph = RestructuredGraph::default();
        let run = GraphRun::new(&graph);
        store.begin(&run).unwrap().commit().unwrap();

        let found = store.run(&run.id).unwrap().unwrap();
        assert_eq!((found.id, found.node_count), (run.id, 0));
        assert_eq!(store.run("missing").unwrap(), None);
    }

    #[test]
    fn test_fetch_unprocessed_joins_levels() {
        let mut store = SqliteStore::in_memory().unwrap();
        let (s, t, m) = store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();

        let rows = store.fetch_unprocessed().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subtopic_id, Some(s));
        assert_eq!(rows[0].topic_id, Some(t));
        assert_eq!(rows[0].macrotopic_id, Some(m));
        assert_eq!(rows[0].subtopic_name.as_deref(), Some("Pumps"));
    }

    #[test]
    fn test_row_pulled_while_any_level_unprocessed() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.insert_taxonomy("Engineering", "Hydraulics", "Pumps").unwrap();

        store
            .connection()
            .execute_batch("UPDATE macrotopic SET status = 1; UPDATE topic SET status = 1;")
            .unwrap();
        assert_eq!(store.fetch_unprocessed().unwrap().len(), 1);

        store
            .connection()
            .execute_batch("UPDATE qna_subtopic SET status = 1;")
            .unwrap();
        assert!(store.fetch_unprocessed().unwrap().is_empty());
    }

    #[test]
    fn test_null_names_come_through_as_missing() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "INSERT INTO macrotopic (id, name) VALUES (1, 'Engineering');
                 INSERT INTO topic (id, name, macrotopic_id) VALUES (2, NULL, 1);
                 INSERT INTO qna_subtopic (id, name, topic_id) VALUES (3, 'Pumps', 2);",
            )
            .unwrap();

        let rows = store.fetch_unprocessed().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].topic_name, None);
    }

    #[test]
    fn test_load_unknown_run() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.load_graph("missing"),
            Err(StoreError::RunNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        assert!(store.list_runs().unwrap().is_empty());
        assert!(store.latest_run().unwrap().is_none());
    }
}
