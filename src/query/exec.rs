//! Terminal builder calls.
//!
//! Each method compiles the current state, issues exactly one
//! [`Executor::execute`](crate::executor::Executor::execute) and converts the
//! reply. Compilation errors return before the executor is reached; executor
//! failures come back unchanged as [`DbError::Execution`].

use bson::{Bson, Document, doc};
use std::time::Instant;

use super::builder::Builder;
use super::filter::compile_filter;
use super::options::{compile_find_options, compile_pipeline};
use super::record::{Record, materialize};
use super::types::Mutation;
use super::update::{compile_update, mutations_from_document};
use crate::errors::{DbError, ExecutionError};
use crate::executor::{Command, Reply};
use crate::types::{ID_FIELD, normalize_id};
use crate::utils::devlog::{self, BenchLine};
use crate::utils::logger::SLOW_TARGET;
use crate::utils::num::{u128_to_u64_saturating, usize_to_u64};

impl Builder {
    /// Compiled filter for the current clauses; `{}` when unfiltered.
    ///
    /// # Errors
    /// Propagates operand errors from the operator table.
    pub fn to_filter(&self) -> Result<Document, DbError> {
        compile_filter(&self.wheres)
    }

    /// The read command `get` would issue, without executing it.
    ///
    /// # Errors
    /// Propagates filter compilation errors.
    pub fn to_read_command(&self) -> Result<Command, DbError> {
        let filter = self.to_filter()?;
        let options = compile_find_options(&self.columns, &self.computed, &self.orders, self.limit, self.offset);
        if self.computed.is_empty() {
            Ok(Command::Find { collection: self.collection.clone(), filter, options })
        } else {
            Ok(Command::Aggregate {
                collection: self.collection.clone(),
                pipeline: compile_pipeline(filter, &self.computed, options),
            })
        }
    }

    // --- reads ---

    /// Every matching record in store order.
    ///
    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn get(&self) -> Result<Vec<Record>, DbError> {
        let command = self.to_read_command()?;
        let docs = documents(self.dispatch(command)?)?;
        Ok(docs.into_iter().map(|d| materialize(d, &self.columns, &self.computed)).collect())
    }

    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn first(&self) -> Result<Option<Record>, DbError> {
        Ok(self.clone().limit(1).get()?.into_iter().next())
    }

    /// Record with the given id that also satisfies the current filter.
    /// Any offset is ignored. An id that is not a valid store id returns
    /// `None` without a round trip.
    ///
    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn find(&self, id: impl Into<Bson>) -> Result<Option<Record>, DbError> {
        let Some(id) = normalize_id(&id.into()) else {
            log::debug!("find on '{}' skipped: id is not a store id", self.collection);
            return Ok(None);
        };
        self.clone().offset(0).where_eq(ID_FIELD, id).first()
    }

    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn count(&self) -> Result<u64, DbError> {
        let filter = self.to_filter()?;
        match self.dispatch(Command::Count { collection: self.collection.clone(), filter })? {
            Reply::Count(n) => Ok(n),
            other => Err(unexpected("count", &other)),
        }
    }

    /// Matching records where `field` is present and not null.
    ///
    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn count_field(&self, field: &str) -> Result<u64, DbError> {
        self.clone().where_not_null(field).count()
    }

    // --- inserts ---

    /// Inserts one document and returns its id.
    ///
    /// # Errors
    /// The executor's failure, or a reply without an id.
    pub fn insert(&self, document: Document) -> Result<Bson, DbError> {
        let mut ids = self.insert_documents(vec![document])?;
        if ids.is_empty() {
            return Err(ExecutionError::new("insert reply carried no id").into());
        }
        Ok(ids.swap_remove(0))
    }

    /// Inserts a batch in one command; ids come back in input order.
    /// An empty batch issues nothing.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn insert_many<I>(&self, documents: I) -> Result<Vec<Bson>, DbError>
    where
        I: IntoIterator<Item = Document>,
    {
        let documents: Vec<Document> = documents.into_iter().collect();
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.insert_documents(documents)
    }

    /// Inserts one document and returns its id as text (hex for object ids).
    ///
    /// # Errors
    /// The executor's failure, or a reply without an id.
    pub fn insert_get_id(&self, document: Document) -> Result<String, DbError> {
        Ok(match self.insert(document)? {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s,
            other => other.to_string(),
        })
    }

    fn insert_documents(&self, documents: Vec<Document>) -> Result<Vec<Bson>, DbError> {
        let command = Command::Insert { collection: self.collection.clone(), documents };
        match self.dispatch(command)? {
            Reply::Inserted(report) => Ok(report.inserted_ids),
            other => Err(unexpected("insert", &other)),
        }
    }

    // --- updates ---

    /// Plain fields are assigned; `$`-keys are passed through as raw
    /// update operators. Applies to every matching record.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty update, or the executor's failure.
    pub fn update(&self, values: Document) -> Result<u64, DbError> {
        self.update_with(&mutations_from_document(values))
    }

    /// # Errors
    /// `InvalidArgument` for an empty update, or the executor's failure.
    pub fn update_with(&self, mutations: &[Mutation]) -> Result<u64, DbError> {
        let filter = self.to_filter()?;
        let update = compile_update(mutations)?;
        let command = Command::Update { collection: self.collection.clone(), filter, update, multi: true };
        match self.dispatch(command)? {
            Reply::Updated(report) => Ok(report.modified),
            other => Err(unexpected("update", &other)),
        }
    }

    /// # Errors
    /// The executor's failure.
    pub fn increment(&self, field: &str, by: impl Into<Bson>) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Increment(field.to_string(), by.into())])
    }

    /// # Errors
    /// `InvalidArgument` when `by` is not numeric, or the executor's failure.
    pub fn decrement(&self, field: &str, by: impl Into<Bson>) -> Result<u64, DbError> {
        let by = negate(by.into())?;
        self.update_with(&[Mutation::Increment(field.to_string(), by)])
    }

    /// Removes the listed fields from every matching record.
    ///
    /// # Errors
    /// `InvalidArgument` for no fields, or the executor's failure.
    pub fn unset<I, S>(&self, fields: I) -> Result<u64, DbError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mutations: Vec<Mutation> = fields.into_iter().map(|f| Mutation::Unset(f.into())).collect();
        self.update_with(&mutations)
    }

    /// Appends `value` (each element of an array value) to `field`.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn push(&self, field: &str, value: impl Into<Bson>) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Push { field: field.to_string(), value: value.into(), unique: false }])
    }

    /// Appends only elements not already present.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn push_unique(&self, field: &str, value: impl Into<Bson>) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Push { field: field.to_string(), value: value.into(), unique: true }])
    }

    /// `$push` body passed through untouched.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn push_raw(&self, body: Document) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Raw(doc! { "$push": body })])
    }

    /// Removes matching elements from `field`; an array value removes each
    /// listed element, a document value is a per-element criteria.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn pull(&self, field: &str, value: impl Into<Bson>) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Pull { field: field.to_string(), value: value.into() }])
    }

    /// `$pull` body passed through untouched.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn pull_raw(&self, body: Document) -> Result<u64, DbError> {
        self.update_with(&[Mutation::Raw(doc! { "$pull": body })])
    }

    // --- deletes ---

    /// Removes every matching record. Without any clause this removes every
    /// record in the collection.
    ///
    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn delete(&self) -> Result<u64, DbError> {
        let filter = self.to_filter()?;
        if filter.is_empty() {
            log::warn!("unfiltered delete on '{}' removes every record", self.collection);
        }
        self.delete_matching(filter, true)
    }

    /// Removes the record with this id if it also satisfies the current
    /// filter. An invalid id deletes nothing and issues nothing.
    ///
    /// # Errors
    /// Compilation errors, or the executor's failure.
    pub fn delete_id(&self, id: impl Into<Bson>) -> Result<u64, DbError> {
        let Some(id) = normalize_id(&id.into()) else {
            log::debug!("delete on '{}' skipped: id is not a store id", self.collection);
            return Ok(0);
        };
        let filter = self.clone().where_eq(ID_FIELD, id).to_filter()?;
        self.delete_matching(filter, false)
    }

    /// Empties the collection regardless of the current filter.
    ///
    /// # Errors
    /// The executor's failure.
    pub fn truncate(&self) -> Result<bool, DbError> {
        self.delete_matching(Document::new(), true)?;
        Ok(true)
    }

    fn delete_matching(&self, filter: Document, multi: bool) -> Result<u64, DbError> {
        let command = Command::Delete { collection: self.collection.clone(), filter, multi };
        match self.dispatch(command)? {
            Reply::Deleted(report) => Ok(report.deleted),
            other => Err(unexpected("delete", &other)),
        }
    }

    // --- round trip ---

    fn dispatch(&self, command: Command) -> Result<Reply, DbError> {
        let op = command.name();
        log::debug!("{op} on '{}': {command:?}", self.collection);
        let start = Instant::now();
        let reply = self.executor.execute(command).map_err(|e| {
            log::debug!("{op} on '{}' failed: {e}", self.collection);
            e
        })?;
        let duration_ms = u128_to_u64_saturating(start.elapsed().as_millis());
        let slow_ms = self.config.slow_query_ms;
        if slow_ms > 0 && duration_ms >= slow_ms {
            log::warn!(
                target: SLOW_TARGET,
                "{op} on '{}' took {duration_ms} ms (threshold {slow_ms} ms)",
                self.collection
            );
        }
        devlog::record(&BenchLine::query(op, &self.collection, duration_ms, result_count(&reply)));
        Ok(reply)
    }
}

fn documents(reply: Reply) -> Result<Vec<Document>, DbError> {
    match reply {
        Reply::Documents(docs) => Ok(docs),
        other => Err(unexpected("read", &other)),
    }
}

fn result_count(reply: &Reply) -> u64 {
    match reply {
        Reply::Documents(docs) => usize_to_u64(docs.len()),
        Reply::Count(n) => *n,
        Reply::Inserted(r) => usize_to_u64(r.inserted_ids.len()),
        Reply::Updated(r) => r.modified,
        Reply::Deleted(r) => r.deleted,
    }
}

fn unexpected(op: &str, reply: &Reply) -> DbError {
    ExecutionError::new(format!("unexpected '{}' reply to {op}", reply.kind())).into()
}

fn negate(by: Bson) -> Result<Bson, DbError> {
    match by {
        Bson::Int32(i) => Ok(i.checked_neg().map_or(Bson::Int64(-i64::from(i)), Bson::Int32)),
        Bson::Int64(i) => i
            .checked_neg()
            .map(Bson::Int64)
            .ok_or_else(|| DbError::InvalidArgument("decrement overflows".into())),
        Bson::Double(f) => Ok(Bson::Double(-f)),
        other => Err(DbError::InvalidArgument(format!("cannot decrement by {other}"))),
    }
}
