//! Source ids to flag as processed once a batch is committed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::GraphNode;
use crate::taxonomy::{Level, SourceId, TaxonomyRow};

/// Per-level source ids whose labels made it into a committed graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedIds {
    pub subtopic_ids: BTreeSet<SourceId>,
    pub topic_ids: BTreeSet<SourceId>,
    pub macrotopic_ids: BTreeSet<SourceId>,
}

impl ProcessedIds {
    pub fn ids(&self, level: Level) -> &BTreeSet<SourceId> {
        match level {
            Level::Subtopic => &self.subtopic_ids,
            Level::Topic => &self.topic_ids,
            Level::Macrotopic => &self.macrotopic_ids,
        }
    }

    fn insert(&mut self, level: Level, id: SourceId) {
        match level {
            Level::Subtopic => self.subtopic_ids.insert(id),
            Level::Topic => self.topic_ids.insert(id),
            Level::Macrotopic => self.macrotopic_ids.insert(id),
        };
    }

    /// Total number of ids across all levels.
    pub fn len(&self) -> usize {
        self.subtopic_ids.len() + self.topic_ids.len() + self.macrotopic_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes the ids to mark from the batch that was actually pushed.
///
/// A row's id at a level is included when the row's label at that level is
/// one of the node labels. `rows` and `nodes` must come from the same
/// [`build_graph`](super::build_graph) call.
pub fn compute_processed_ids(rows: &[TaxonomyRow], nodes: &[GraphNode]) -> ProcessedIds {
    let labels: HashSet<&str> = nodes.iter().map(|n| n.label.as_str()).collect();

    let mut processed = ProcessedIds::default();
    for row in rows {
        for level in Level::ALL {
            if labels.contains(row.label(level)) {
                processed.insert(level, row.id(level));
            }
        }
    }
    processed
}
