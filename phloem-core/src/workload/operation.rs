//! Operations produced by a workload

use crate::db::FieldMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of operation, also the measurement bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Read,
    Update,
    Insert,
    Scan,
    Delete,
}

impl OperationKind {
    /// All kinds, in mix and report order
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Read,
        OperationKind::Update,
        OperationKind::Insert,
        OperationKind::Scan,
        OperationKind::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Read => "READ",
            OperationKind::Update => "UPDATE",
            OperationKind::Insert => "INSERT",
            OperationKind::Scan => "SCAN",
            OperationKind::Delete => "DELETE",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work for a backend
///
/// `fields: None` means every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read { key: String, fields: Option<Vec<String>> },
    Update { key: String, values: FieldMap },
    Insert { key: String, values: FieldMap },
    Scan { start_key: String, count: usize, fields: Option<Vec<String>> },
    Delete { key: String },
    /// Drawn against an empty keyspace; recorded as NOT_FOUND without a backend call
    Unavailable(OperationKind),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Read { .. } => OperationKind::Read,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Scan { .. } => OperationKind::Scan,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Unavailable(kind) => *kind,
        }
    }

    /// Target key (start key for scans)
    pub fn key(&self) -> Option<&str> {
        match self {
            Operation::Read { key, .. }
            | Operation::Update { key, .. }
            | Operation::Insert { key, .. }
            | Operation::Delete { key } => Some(key),
            Operation::Scan { start_key, .. } => Some(start_key),
            Operation::Unavailable(_) => None,
        }
    }
}
