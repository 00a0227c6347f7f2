use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::operator::Operator;
use crate::errors::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

impl FromStr for Order {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Asc),
            "desc" | "descending" | "-1" => Ok(Self::Desc),
            other => Err(DbError::InvalidArgument(format!("unknown sort direction '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// How a clause joins the clauses before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub boolean: Boolean,
    pub kind: ClauseKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKind {
    Basic { field: String, operator: Operator, value: Bson },
    /// A parenthesized group, compiled to one fragment before folding.
    Nested(Vec<Clause>),
    /// A pre-built filter fragment, merged without interpretation.
    Raw(Document),
}

impl Clause {
    #[must_use]
    pub fn basic(boolean: Boolean, field: impl Into<String>, operator: Operator, value: Bson) -> Self {
        Self { boolean, kind: ClauseKind::Basic { field: field.into(), operator, value } }
    }
}

/// One update directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set(String, Bson),
    Unset(String),
    Increment(String, Bson),
    /// Appends `value`; an array value appends each element. With `unique`
    /// an element already present is skipped.
    Push { field: String, value: Bson, unique: bool },
    PushEach { field: String, values: Vec<Bson>, unique: bool },
    /// Removes matching elements; an array value removes each listed element,
    /// a document value removes every element matching all of its fields.
    Pull { field: String, value: Bson },
    Raw(Document),
}

/// A projected field, optionally renamed with `field as alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub field: String,
    pub alias: Option<String>,
}

impl Selection {
    /// Name the value appears under in a materialized record.
    #[must_use]
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field)
    }
}

impl FromStr for Selection {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let (field, alias) = match lower.find(" as ") {
            Some(at) => (trimmed[..at].trim(), Some(trimmed[at + 4..].trim())),
            None => (trimmed, None),
        };
        if field.is_empty() || alias.is_some_and(str::is_empty) {
            return Err(DbError::InvalidArgument(format!("invalid column '{s}'")));
        }
        Ok(Self { field: field.to_string(), alias: alias.map(str::to_string) })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(a) => write!(f, "{} as {a}", self.field),
            None => f.write_str(&self.field),
        }
    }
}
