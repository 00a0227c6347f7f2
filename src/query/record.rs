use bson::{Bson, Document};
use serde::de::DeserializeOwned;

use super::types::Selection;
use crate::errors::DbError;
use crate::types::ID_FIELD;

/// One materialized result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Document);

impl Record {
    #[must_use]
    pub const fn new(doc: Document) -> Self {
        Self(doc)
    }

    #[must_use]
    pub fn id(&self) -> Option<&Bson> {
        self.0.get(ID_FIELD)
    }

    /// Looks up a top-level field or a dot-notation path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Bson> {
        lookup(&self.0, path)
    }

    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Bson::as_str)
    }

    /// Integer value widened to `i64`; doubles with no fraction are accepted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Bson::Int32(i) => Some(i64::from(*i)),
            Bson::Int64(i) => Some(*i),
            Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_array(&self, path: &str) -> Option<&Vec<Bson>> {
        self.get(path).and_then(Bson::as_array)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Field names in record order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub const fn as_document(&self) -> &Document {
        &self.0
    }

    #[must_use]
    pub fn into_document(self) -> Document {
        self.0
    }

    /// Relaxed extended-JSON view of the record.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        Bson::Document(self.0.clone()).into_relaxed_extjson()
    }

    /// Maps the record onto a caller type through its relaxed JSON form.
    ///
    /// # Errors
    /// Returns `Json` when the record does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DbError> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}

impl From<Record> for Document {
    fn from(r: Record) -> Self {
        r.0
    }
}

/// Shapes a raw store document into a record.
///
/// With no columns the document is kept whole. Otherwise the record holds
/// `_id`, each selected column in caller order (under its alias, or rebuilt as
/// a nested document for unaliased dotted paths), then computed fields.
/// Fields missing from `raw` stay absent.
#[must_use]
pub fn materialize(raw: Document, columns: &[Selection], computed: &[(String, Bson)]) -> Record {
    if columns.is_empty() {
        return Record(raw);
    }
    let mut out = Document::new();
    if let Some(id) = raw.get(ID_FIELD) {
        out.insert(ID_FIELD, id.clone());
    }
    for c in columns {
        let Some(value) = lookup(&raw, &c.field) else { continue };
        match &c.alias {
            Some(alias) => {
                out.insert(alias.clone(), value.clone());
            }
            None => insert_path(&mut out, &c.field, value.clone()),
        }
    }
    for (name, _) in computed {
        if let Some(value) = raw.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    Record(out)
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if let Some(v) = doc.get(path) {
        return Some(v);
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for part in parts {
        cur = match cur {
            Bson::Document(d) => d.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn insert_path(out: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            out.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(out.get(head), Some(Bson::Document(_))) {
                out.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = out.get_mut(head) {
                insert_path(child, rest, value);
            }
        }
    }
}
