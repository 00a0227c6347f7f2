//! In-process executor.
//!
//! [`MemoryStore`] interprets the commands this crate emits against
//! insertion-ordered collections held in memory. It applies the same
//! matching, update and ordering rules a document server would, which makes
//! it the collaborator behind the test suite and a small embedded backend.

pub mod eval;
pub mod expr;
pub mod update;

use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::errors::ExecutionError;
use crate::executor::{Command, DeleteReport, Executor, FindOptions, InsertReport, Reply, UpdateReport};
use crate::types::ID_FIELD;
use crate::utils::num::{i64_to_usize, u64_to_usize, usize_to_u64};

pub use eval::{compare_bson, compare_docs, matches};
pub use update::apply_update;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a collection's documents in insertion order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections.read().get(collection).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn find(&self, collection: &str, filter: &Document, options: FindOptions) -> Result<Vec<Document>, ExecutionError> {
        let guard = self.collections.read();
        let source = guard.get(collection).map_or(&[][..], Vec::as_slice);
        let mut docs = Vec::new();
        for d in source {
            if matches(d, filter)? {
                docs.push(d.clone());
            }
        }
        drop(guard);
        if let Some(sort) = &options.sort {
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }
        let docs = page(docs, options.skip, options.limit);
        Ok(match &options.projection {
            Some(p) => docs.iter().map(|d| project(d, p)).collect(),
            None => docs,
        })
    }

    fn aggregate(&self, collection: &str, pipeline: &[Document]) -> Result<Vec<Document>, ExecutionError> {
        let mut docs = self.documents(collection);
        for stage in pipeline {
            let Some((name, body)) = stage.iter().next().filter(|_| stage.len() == 1) else {
                return Err(ExecutionError::new("a pipeline stage must have exactly one field"));
            };
            docs = match (name.as_str(), body) {
                ("$match", Bson::Document(filter)) => {
                    let mut kept = Vec::with_capacity(docs.len());
                    for d in docs {
                        if matches(&d, filter)? {
                            kept.push(d);
                        }
                    }
                    kept
                }
                ("$addFields" | "$set", Bson::Document(fields)) => {
                    let mut out = Vec::with_capacity(docs.len());
                    for mut d in docs {
                        let mut computed = Vec::with_capacity(fields.len());
                        for (name, e) in fields {
                            computed.push((name.clone(), expr::evaluate(&d, e)?));
                        }
                        for (name, value) in computed {
                            d.insert(name, value);
                        }
                        out.push(d);
                    }
                    out
                }
                ("$sort", Bson::Document(sort)) => {
                    docs.sort_by(|a, b| compare_docs(a, b, sort));
                    docs
                }
                ("$skip", n) => {
                    let skip = eval::as_i64(n).and_then(|n| u64::try_from(n).ok());
                    page(docs, skip, None)
                }
                ("$limit", n) => {
                    let limit = eval::as_i64(n).filter(|n| *n > 0).ok_or_else(|| ExecutionError::new("the limit must be positive"))?;
                    page(docs, None, Some(limit))
                }
                ("$project", Bson::Document(spec)) => {
                    let mut out = Vec::with_capacity(docs.len());
                    for d in &docs {
                        out.push(project_with_expressions(d, spec)?);
                    }
                    out
                }
                (other, _) => return Err(ExecutionError::new(format!("unrecognized pipeline stage name: '{other}'"))),
            };
        }
        Ok(docs)
    }

    fn count(&self, collection: &str, filter: &Document) -> Result<u64, ExecutionError> {
        let guard = self.collections.read();
        let mut n = 0u64;
        for d in guard.get(collection).map_or(&[][..], Vec::as_slice) {
            if matches(d, filter)? {
                n += 1;
            }
        }
        Ok(n)
    }

    fn insert(&self, collection: &str, documents: Vec<Document>) -> Result<InsertReport, ExecutionError> {
        let mut prepared = Vec::with_capacity(documents.len());
        for d in documents {
            if d.contains_key(ID_FIELD) {
                prepared.push(d);
            } else {
                let mut with_id = Document::new();
                with_id.insert(ID_FIELD, ObjectId::new());
                for (k, v) in d {
                    with_id.insert(k, v);
                }
                prepared.push(with_id);
            }
        }
        let mut guard = self.collections.write();
        let target = guard.entry(collection.to_string()).or_default();
        let mut seen: Vec<&Bson> = target.iter().filter_map(|d| d.get(ID_FIELD)).collect();
        for d in &prepared {
            let id = d.get(ID_FIELD).unwrap_or(&Bson::Null);
            if seen.iter().any(|s| eval::values_equal(s, id)) {
                return Err(ExecutionError::new(format!("E11000 duplicate key error collection: {collection} dup key: {{ _id: {id} }}")));
            }
            seen.push(id);
        }
        let inserted_ids = prepared.iter().filter_map(|d| d.get(ID_FIELD).cloned()).collect();
        target.extend(prepared);
        Ok(InsertReport { inserted_ids })
    }

    fn update(&self, collection: &str, filter: &Document, update: &Document, multi: bool) -> Result<UpdateReport, ExecutionError> {
        let mut guard = self.collections.write();
        let Some(target) = guard.get_mut(collection) else {
            return Ok(UpdateReport::default());
        };
        let mut staged = Vec::new();
        for (i, d) in target.iter().enumerate() {
            if matches(d, filter)? {
                let mut next = d.clone();
                let changed = apply_update(&mut next, update)?;
                staged.push((i, next, changed));
                if !multi {
                    break;
                }
            }
        }
        let mut report = UpdateReport { matched: usize_to_u64(staged.len()), modified: 0 };
        for (i, next, changed) in staged {
            if changed {
                report.modified += 1;
                target[i] = next;
            }
        }
        Ok(report)
    }

    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<DeleteReport, ExecutionError> {
        let mut guard = self.collections.write();
        let Some(target) = guard.get_mut(collection) else {
            return Ok(DeleteReport::default());
        };
        let mut doomed = Vec::new();
        for (i, d) in target.iter().enumerate() {
            if matches(d, filter)? {
                doomed.push(i);
                if !multi {
                    break;
                }
            }
        }
        for i in doomed.iter().rev() {
            target.remove(*i);
        }
        Ok(DeleteReport { deleted: usize_to_u64(doomed.len()) })
    }
}

impl Executor for MemoryStore {
    fn execute(&self, command: Command) -> Result<Reply, ExecutionError> {
        log::trace!("memory store executing {} on '{}'", command.name(), command.collection());
        match command {
            Command::Find { collection, filter, options } => {
                self.find(&collection, &filter, options).map(Reply::Documents)
            }
            Command::Aggregate { collection, pipeline } => {
                self.aggregate(&collection, &pipeline).map(Reply::Documents)
            }
            Command::Count { collection, filter } => self.count(&collection, &filter).map(Reply::Count),
            Command::Insert { collection, documents } => self.insert(&collection, documents).map(Reply::Inserted),
            Command::Update { collection, filter, update, multi } => {
                self.update(&collection, &filter, &update, multi).map(Reply::Updated)
            }
            Command::Delete { collection, filter, multi } => {
                self.delete(&collection, &filter, multi).map(Reply::Deleted)
            }
        }
    }
}

fn page(docs: Vec<Document>, skip: Option<u64>, limit: Option<i64>) -> Vec<Document> {
    let skip = skip.map_or(0, |s| u64_to_usize(s).unwrap_or(usize::MAX));
    let take = limit
        .filter(|l| *l != 0)
        .map_or(usize::MAX, |l| i64_to_usize(l.saturating_abs()).unwrap_or(usize::MAX));
    docs.into_iter().skip(skip).take(take).collect()
}

fn is_inclusion(flag: &Bson) -> Option<bool> {
    match flag {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Some(eval::as_f64(flag).is_some_and(|f| f != 0.0)),
        _ => None,
    }
}

/// Applies an inclusion (`{f: 1}`) or exclusion (`{f: 0}`) projection.
/// `_id` is kept unless excluded explicitly.
fn project(doc: &Document, spec: &Document) -> Document {
    let inclusive = spec
        .iter()
        .filter(|(k, _)| k.as_str() != ID_FIELD)
        .any(|(_, v)| is_inclusion(v).unwrap_or(true));
    let keep_id = spec.get(ID_FIELD).and_then(is_inclusion).unwrap_or(true);
    if !inclusive {
        let mut out = doc.clone();
        for (k, v) in spec {
            if is_inclusion(v) == Some(false) {
                remove_path(&mut out, k);
            }
        }
        if !keep_id {
            out.remove(ID_FIELD);
        }
        return out;
    }
    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD, id.clone());
    }
    for (k, v) in spec {
        if k == ID_FIELD || is_inclusion(v) != Some(true) {
            continue;
        }
        copy_path(doc, &mut out, k);
    }
    out
}

/// `$project` stage: flags select fields, any other value is an expression
/// whose result is stored under that name.
fn project_with_expressions(doc: &Document, spec: &Document) -> Result<Document, ExecutionError> {
    let mut flags = Document::new();
    let mut computed = Vec::new();
    for (k, v) in spec {
        match is_inclusion(v) {
            Some(_) => {
                flags.insert(k.clone(), v.clone());
            }
            None => computed.push((k.clone(), expr::evaluate(doc, v)?)),
        }
    }
    if flags.is_empty() && !computed.is_empty() {
        flags.insert(ID_FIELD, 1);
    }
    let mut out = project(doc, &flags);
    for (k, v) in computed {
        out.insert(k, v);
    }
    Ok(out)
}

fn copy_path(src: &Document, dst: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(v) = src.get(path) {
                dst.insert(path, v.clone());
            }
        }
        Some((head, rest)) => {
            let Some(Bson::Document(child)) = src.get(head) else { return };
            if !matches!(dst.get(head), Some(Bson::Document(_))) {
                dst.insert(head, Document::new());
            }
            if let Some(Bson::Document(out_child)) = dst.get_mut(head) {
                copy_path(child, out_child, rest);
                if out_child.is_empty() {
                    dst.remove(head);
                }
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}
