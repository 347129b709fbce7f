//! Taxonomy rows as pulled from the store.
//!
//! A row joins one subtopic with its topic and macrotopic. The store hands
//! out [`RawTaxonomyRow`]s whose columns may be NULL; [`validate_rows`]
//! turns a whole batch into [`TaxonomyRow`]s or rejects it.

mod error;

pub use error::ValidationError;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a taxonomy entry.
pub type SourceId = i64;

/// The three tiers of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Subtopic,
    Topic,
    Macrotopic,
}

impl Level {
    /// All levels, in the order labels are collected from a row.
    pub const ALL: [Level; 3] = [Level::Subtopic, Level::Topic, Level::Macrotopic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Subtopic => "subtopic",
            Level::Topic => "topic",
            Level::Macrotopic => "macrotopic",
        }
    }

    /// Parses the stored name of a level.
    pub fn parse(s: &str) -> Option<Level> {
        match s {
            "subtopic" => Some(Level::Subtopic),
            "topic" => Some(Level::Topic),
            "macrotopic" => Some(Level::Macrotopic),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A joined row exactly as the store returned it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTaxonomyRow {
    pub subtopic_id: Option<SourceId>,
    pub subtopic_name: Option<String>,
    pub topic_id: Option<SourceId>,
    pub topic_name: Option<String>,
    pub macrotopic_id: Option<SourceId>,
    pub macrotopic_name: Option<String>,
}

/// A validated taxonomy row. Labels are trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRow {
    pub subtopic_id: SourceId,
    pub subtopic_name: String,
    pub topic_id: SourceId,
    pub topic_name: String,
    pub macrotopic_id: SourceId,
    pub macrotopic_name: String,
}

impl TaxonomyRow {
    /// Creates a row, trimming all three labels.
    pub fn new(
        subtopic: (SourceId, impl AsRef<str>),
        topic: (SourceId, impl AsRef<str>),
        macrotopic: (SourceId, impl AsRef<str>),
    ) -> Self {
        Self {
            subtopic_id: subtopic.0,
            subtopic_name: subtopic.1.as_ref().trim().to_string(),
            topic_id: topic.0,
            topic_name: topic.1.as_ref().trim().to_string(),
            macrotopic_id: macrotopic.0,
            macrotopic_name: macrotopic.1.as_ref().trim().to_string(),
        }
    }

    /// Source id at the given level.
    pub fn id(&self, level: Level) -> SourceId {
        match level {
            Level::Subtopic => self.subtopic_id,
            Level::Topic => self.topic_id,
            Level::Macrotopic => self.macrotopic_id,
        }
    }

    /// Label at the given level.
    pub fn label(&self, level: Level) -> &str {
        match level {
            Level::Subtopic => &self.subtopic_name,
            Level::Topic => &self.topic_name,
            Level::Macrotopic => &self.macrotopic_name,
        }
    }

    /// Checks that every label is non-empty after trimming.
    ///
    /// `row` is only used to locate the error.
    pub fn check_labels(&self, row: usize) -> Result<(), ValidationError> {
        for level in Level::ALL {
            if self.label(level).trim().is_empty() {
                return Err(ValidationError::EmptyLabel { row, level });
            }
        }
        Ok(())
    }
}

impl RawTaxonomyRow {
    /// Validates a single row, reporting the first problem found.
    pub fn validate(&self, row: usize) -> Result<TaxonomyRow, ValidationError> {
        let subtopic_id = require(self.subtopic_id, row, "subtopic_id")?;
        let subtopic_name = require(self.subtopic_name.as_deref(), row, "subtopic_name")?;
        let topic_id = require(self.topic_id, row, "topic_id")?;
        let topic_name = require(self.topic_name.as_deref(), row, "topic_name")?;
        let macrotopic_id = require(self.macrotopic_id, row, "macrotopic_id")?;
        let macrotopic_name = require(self.macrotopic_name.as_deref(), row, "macrotopic_name")?;

        let validated = TaxonomyRow::new(
            (subtopic_id, subtopic_name),
            (topic_id, topic_name),
            (macrotopic_id, macrotopic_name),
        );
        validated.check_labels(row)?;
        Ok(validated)
    }
}

impl From<TaxonomyRow> for RawTaxonomyRow {
    fn from(row: TaxonomyRow) -> Self {
        Self {
            subtopic_id: Some(row.subtopic_id),
            subtopic_name: Some(row.subtopic_name),
            topic_id: Some(row.topic_id),
            topic_name: Some(row.topic_name),
            macrotopic_id: Some(row.macrotopic_id),
            macrotopic_name: Some(row.macrotopic_name),
        }
    }
}

fn require<T>(value: Option<T>, row: usize, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { row, field })
}

/// Validates a whole batch.
///
/// The batch is all-or-nothing: if any row is invalid the batch is
/// rejected with a [`ValidationError::Rejected`] listing every bad row.
pub fn validate_rows(rows: &[RawTaxonomyRow]) -> Result<Vec<TaxonomyRow>, ValidationError> {
    let mut valid = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (index, raw) in rows.iter().enumerate() {
        match raw.validate(index) {
            Ok(row) => valid.push(row),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(ValidationError::Rejected(errors))
    }
}
