use bson::{Bson, Document, doc};
use chrono::{NaiveDate, NaiveTime};

use super::operator::{Operator, compile_operator, field_doc};
use super::types::{Boolean, Clause, ClauseKind};
use crate::errors::DbError;
use crate::types::{ID_FIELD, normalize_id};

const MS_PER_DAY: i64 = 86_400_000;

/// Folds clauses left to right into one filter document.
///
/// `And` clauses extend the top-level `$and`; `Or` clauses wrap everything
/// accumulated so far, so `a AND b OR c` is `(a AND b) OR c`. No clauses
/// compiles to `{}`.
///
/// # Errors
/// Propagates operand errors from the operator table.
pub fn compile_filter(clauses: &[Clause]) -> Result<Document, DbError> {
    let mut acc: Option<Document> = None;
    for clause in clauses {
        let fragment = compile_clause(&clause.kind)?;
        acc = Some(match (acc, clause.boolean) {
            (None, _) => fragment,
            (Some(prev), Boolean::And) => conjoin(prev, fragment),
            (Some(prev), Boolean::Or) => doc! { "$or": [prev, fragment] },
        });
    }
    Ok(acc.unwrap_or_default())
}

/// ANDs two filter documents, extending an existing top-level `$and`.
#[must_use]
pub fn conjoin(prev: Document, fragment: Document) -> Document {
    if prev.is_empty() {
        return fragment;
    }
    if fragment.is_empty() {
        return prev;
    }
    if prev.len() == 1
        && let Some(Bson::Array(items)) = prev.get("$and")
    {
        let mut items = items.clone();
        items.push(Bson::Document(fragment));
        return doc! { "$and": items };
    }
    doc! { "$and": [prev, fragment] }
}

fn compile_clause(kind: &ClauseKind) -> Result<Document, DbError> {
    match kind {
        ClauseKind::Basic { field, operator, value } => {
            if field == ID_FIELD {
                compile_id_clause(*operator, value)
            } else {
                compile_operator(*operator, field, value.clone())
            }
        }
        ClauseKind::Nested(inner) => compile_filter(inner),
        ClauseKind::Raw(raw) => Ok(raw.clone()),
    }
}

/// Identifier comparisons use the store's native id form. An id that cannot
/// be normalized matches nothing instead of raising.
fn compile_id_clause(op: Operator, value: &Bson) -> Result<Document, DbError> {
    match op {
        Operator::Eq | Operator::Ne => match normalize_id(value) {
            Some(id) => compile_operator(op, ID_FIELD, id),
            None if op == Operator::Eq => Ok(match_nothing(ID_FIELD)),
            None => compile_operator(op, ID_FIELD, value.clone()),
        },
        Operator::In | Operator::NotIn => {
            let ids = match value {
                Bson::Array(items) => items.iter().filter_map(normalize_id).collect(),
                other => normalize_id(other).into_iter().collect::<Vec<_>>(),
            };
            compile_operator(op, ID_FIELD, Bson::Array(ids))
        }
        _ => compile_operator(op, ID_FIELD, value.clone()),
    }
}

/// A fragment no document satisfies.
#[must_use]
pub fn match_nothing(field: &str) -> Document {
    field_doc(field, doc! { "$in": [] })
}

/// Calendar component extracted server-side for `where_year` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    const fn operator(self) -> &'static str {
        match self {
            Self::Year => "$year",
            Self::Month => "$month",
            Self::Day => "$dayOfMonth",
        }
    }
}

#[must_use]
pub fn date_part_fragment(field: &str, part: DatePart, value: i32) -> Document {
    let mut extract = Document::new();
    extract.insert(part.operator(), format!("${field}"));
    doc! { "$expr": { "$eq": [extract, value] } }
}

/// Matches instants whose UTC time of day formats to `time` (`HH:MM:SS`).
///
/// # Errors
/// Returns `InvalidArgument` when `time` is not `HH:MM[:SS]`.
pub fn time_fragment(field: &str, time: &str) -> Result<Document, DbError> {
    let parsed = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|e| DbError::InvalidArgument(format!("invalid time '{time}': {e}")))?;
    let formatted = parsed.format("%H:%M:%S").to_string();
    Ok(doc! {
        "$expr": {
            "$eq": [
                { "$dateToString": { "format": "%H:%M:%S", "date": format!("${field}") } },
                formatted,
            ]
        }
    })
}

/// Matches instants falling anywhere on `date` (`YYYY-MM-DD`, UTC).
///
/// # Errors
/// Returns `InvalidArgument` when `date` is not a calendar date.
pub fn date_fragment(field: &str, date: &str) -> Result<Document, DbError> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| DbError::InvalidArgument(format!("invalid date '{date}': {e}")))?;
    let start = day
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| DbError::InvalidArgument(format!("invalid date '{date}'")))?;
    let start_dt = bson::DateTime::from_millis(start);
    let end_dt = bson::DateTime::from_millis(start + MS_PER_DAY - 1);
    Ok(field_doc(field, doc! { "$gte": start_dt, "$lte": end_dt }))
}
