use bson::{Bson, Document, doc};

use super::types::Mutation;
use crate::errors::DbError;

/// Compiles update directives into one update document.
///
/// Directives on the same operator share one bucket (`$set`, `$push`, ...);
/// a later directive on the same field replaces the earlier one.
///
/// # Errors
/// Returns `InvalidArgument` when nothing would be updated.
pub fn compile_update(mutations: &[Mutation]) -> Result<Document, DbError> {
    let mut out = Document::new();
    for m in mutations {
        match m {
            Mutation::Set(field, value) => put(&mut out, "$set", field, value.clone()),
            Mutation::Unset(field) => put(&mut out, "$unset", field, Bson::String(String::new())),
            Mutation::Increment(field, by) => put(&mut out, "$inc", field, by.clone()),
            Mutation::Push { field, value, unique } => {
                let op = if *unique { "$addToSet" } else { "$push" };
                let operand = match value {
                    Bson::Array(items) => Bson::Document(doc! { "$each": items.clone() }),
                    other => other.clone(),
                };
                put(&mut out, op, field, operand);
            }
            Mutation::PushEach { field, values, unique } => {
                let op = if *unique { "$addToSet" } else { "$push" };
                put(&mut out, op, field, Bson::Document(doc! { "$each": values.clone() }));
            }
            Mutation::Pull { field, value } => match value {
                Bson::Array(items) => put(&mut out, "$pullAll", field, Bson::Array(items.clone())),
                other => put(&mut out, "$pull", field, other.clone()),
            },
            Mutation::Raw(raw) => merge_raw(&mut out, raw),
        }
    }
    if out.is_empty() {
        return Err(DbError::InvalidArgument("update has no directives".into()));
    }
    Ok(out)
}

/// Splits a caller update document: `$`-operators are kept as raw directives,
/// plain fields become `Set`s.
#[must_use]
pub fn mutations_from_document(values: Document) -> Vec<Mutation> {
    let mut plain = Vec::new();
    let mut raw = Document::new();
    for (k, v) in values {
        if k.starts_with('$') {
            raw.insert(k, v);
        } else {
            plain.push(Mutation::Set(k, v));
        }
    }
    if !raw.is_empty() {
        plain.push(Mutation::Raw(raw));
    }
    plain
}

fn put(out: &mut Document, op: &str, field: &str, value: Bson) {
    if !matches!(out.get(op), Some(Bson::Document(_))) {
        out.insert(op, Document::new());
    }
    if let Some(Bson::Document(bucket)) = out.get_mut(op) {
        bucket.insert(field, value);
    }
}

fn merge_raw(out: &mut Document, raw: &Document) {
    for (key, body) in raw {
        match body {
            Bson::Document(fields) if key.starts_with('$') => {
                for (field, value) in fields {
                    put(out, key, field, value.clone());
                }
            }
            _ if key.starts_with('$') => {
                out.insert(key.clone(), body.clone());
            }
            _ => put(out, "$set", key, body.clone()),
        }
    }
}
