//! LogEntry domain type
//!
//! One committed mutation event read from the commit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntryId;

/// Commit log entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogEntryStatus {
    /// Written ahead of the mutation, not yet committed
    #[default]
    Prepared,
    /// Mutation committed, triggers not yet run
    Committed,
    /// Triggers ran successfully
    Complete,
    /// Triggers failed
    Error,
}

impl LogEntryStatus {
    /// Only committed entries are handed to workers
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Committed)
    }

    /// Whether the entry still needs processing
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Prepared | Self::Committed)
    }
}

impl std::fmt::Display for LogEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prepared => write!(f, "prepared"),
            Self::Committed => write!(f, "committed"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogEntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prepared" => Ok(Self::Prepared),
            "committed" => Ok(Self::Committed),
            "complete" => Ok(Self::Complete),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// A single column mutation within an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Column name
    pub column: String,

    /// New value (None for deletes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Whether this operation removes the column
    #[serde(default)]
    pub delete: bool,
}

impl Operation {
    pub fn update(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: Some(value.into()),
            delete: false,
        }
    }

    pub fn delete(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: None,
            delete: true,
        }
    }
}

/// A committed mutation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier, stable across polls
    pub id: EntryId,

    /// Current status
    pub status: LogEntryStatus,

    /// Keyspace the mutation was applied to
    #[serde(default)]
    pub keyspace: String,

    /// Table (column family) the mutation was applied to
    #[serde(default)]
    pub table: String,

    /// Row key of the mutated row
    #[serde(default, rename = "row-key")]
    pub row_key: String,

    /// Host that wrote the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,

    /// Column operations in the mutation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    /// Failure messages attached by trigger execution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl LogEntry {
    /// Create a new committed entry with a generated ID
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self::with_id(EntryId::generate(), keyspace, table, row_key)
    }

    /// Create a new committed entry with a known ID
    pub fn with_id(
        id: impl Into<EntryId>,
        keyspace: impl Into<String>,
        table: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: LogEntryStatus::Committed,
            keyspace: keyspace.into(),
            table: table.into(),
            row_key: row_key.into(),
            host: None,
            timestamp: Utc::now(),
            operations: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Builder-style status override
    pub fn with_status(mut self, status: LogEntryStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder-style operation append
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Fully qualified table name: `keyspace.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    /// Whether the dispatcher may hand this entry to a worker
    pub fn is_dispatchable(&self) -> bool {
        self.status.is_dispatchable()
    }

    /// Update status, recording an error message if given
    pub fn set_status(&mut self, status: LogEntryStatus, error: Option<&str>) {
        self.status = status;
        if let Some(msg) = error {
            self.errors.push(msg.to_string());
        }
        self.timestamp = Utc::now();
    }
}
