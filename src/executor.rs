//! Boundary with the document-store driver.
//!
//! The query engine compiles every terminal builder call into exactly one
//! [`Command`] and hands it to an [`Executor`]. Connection handling, retries
//! and timeouts belong to the executor; its failures come back as
//! [`ExecutionError`] and are surfaced unchanged.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::errors::ExecutionError;

pub trait Executor: Send + Sync {
    /// Runs one command against the store.
    ///
    /// # Errors
    /// Returns an [`ExecutionError`] for any transport, protocol or store failure.
    fn execute(&self, command: Command) -> Result<Reply, ExecutionError>;
}

/// Options for a `Find` command. `None` means "not requested".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Find { collection: String, filter: Document, options: FindOptions },
    Aggregate { collection: String, pipeline: Vec<Document> },
    Count { collection: String, filter: Document },
    Insert { collection: String, documents: Vec<Document> },
    Update { collection: String, filter: Document, update: Document, multi: bool },
    Delete { collection: String, filter: Document, multi: bool },
}

impl Command {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Find { collection, .. }
            | Self::Aggregate { collection, .. }
            | Self::Count { collection, .. }
            | Self::Insert { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Find { .. } => "find",
            Self::Aggregate { .. } => "aggregate",
            Self::Count { .. } => "count",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Documents(Vec<Document>),
    Count(u64),
    Inserted(InsertReport),
    Updated(UpdateReport),
    Deleted(DeleteReport),
}

impl Reply {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Documents(_) => "documents",
            Self::Count(_) => "count",
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertReport {
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
