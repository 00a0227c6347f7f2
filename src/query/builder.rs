//! Chainable query state.
//!
//! A [`Builder`] is a plain value: every fluent method consumes it and
//! returns the extended state. Cloning copies all clause and projection
//! vectors, so two chains forked from one base never see each other's
//! additions. Terminal methods live in `exec.rs`.

use bson::{Bson, Document};
use std::fmt;
use std::sync::Arc;

use super::filter::{DatePart, date_fragment, date_part_fragment, time_fragment};
use super::operator::Operator;
use super::types::{Boolean, Clause, ClauseKind, Order, Selection, SortSpec};
use crate::config::QueryConfig;
use crate::errors::DbError;
use crate::executor::Executor;

#[derive(Clone)]
pub struct Builder {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) config: Arc<QueryConfig>,
    pub(crate) collection: String,
    pub(crate) wheres: Vec<Clause>,
    pub(crate) orders: Vec<SortSpec>,
    pub(crate) limit: u64,
    pub(crate) offset: u64,
    pub(crate) columns: Vec<Selection>,
    pub(crate) computed: Vec<(String, Bson)>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("collection", &self.collection)
            .field("wheres", &self.wheres)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("columns", &self.columns)
            .field("computed", &self.computed)
            .finish_non_exhaustive()
    }
}

impl Builder {
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, config: Arc<QueryConfig>, collection: impl Into<String>) -> Self {
        Self {
            executor,
            config,
            collection: collection.into(),
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: 0,
            offset: 0,
            columns: Vec::new(),
            computed: Vec::new(),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.wheres
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        !self.wheres.is_empty()
    }

    fn add_clause(mut self, boolean: Boolean, kind: ClauseKind) -> Self {
        self.wheres.push(Clause { boolean, kind });
        self
    }

    fn basic(self, boolean: Boolean, field: impl Into<String>, op: Operator, value: Bson) -> Self {
        self.add_clause(boolean, ClauseKind::Basic { field: field.into(), operator: op, value })
    }

    // --- basic comparisons ---

    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.basic(Boolean::And, field, Operator::Eq, value.into())
    }

    #[must_use]
    pub fn or_where_eq(self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.basic(Boolean::Or, field, Operator::Eq, value.into())
    }

    #[must_use]
    pub fn where_cmp(self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> Self {
        self.basic(Boolean::And, field, op, value.into())
    }

    #[must_use]
    pub fn or_where_cmp(self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> Self {
        self.basic(Boolean::Or, field, op, value.into())
    }

    /// `where(field, "<op>", value)` with a textual operator.
    ///
    /// # Errors
    /// Returns `UnsupportedOperator` for tokens outside the operator table.
    pub fn where_op(self, field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Result<Self, DbError> {
        let op: Operator = op.parse()?;
        Ok(self.basic(Boolean::And, field, op, value.into()))
    }

    /// # Errors
    /// Returns `UnsupportedOperator` for tokens outside the operator table.
    pub fn or_where_op(self, field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Result<Self, DbError> {
        let op: Operator = op.parse()?;
        Ok(self.basic(Boolean::Or, field, op, value.into()))
    }

    // --- membership and ranges ---

    #[must_use]
    pub fn where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.basic(Boolean::And, field, Operator::In, list(values))
    }

    #[must_use]
    pub fn or_where_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.basic(Boolean::Or, field, Operator::In, list(values))
    }

    #[must_use]
    pub fn where_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.basic(Boolean::And, field, Operator::NotIn, list(values))
    }

    #[must_use]
    pub fn or_where_not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.basic(Boolean::Or, field, Operator::NotIn, list(values))
    }

    #[must_use]
    pub fn where_between(self, field: impl Into<String>, lo: impl Into<Bson>, hi: impl Into<Bson>) -> Self {
        self.basic(Boolean::And, field, Operator::Between, Bson::Array(vec![lo.into(), hi.into()]))
    }

    #[must_use]
    pub fn or_where_between(self, field: impl Into<String>, lo: impl Into<Bson>, hi: impl Into<Bson>) -> Self {
        self.basic(Boolean::Or, field, Operator::Between, Bson::Array(vec![lo.into(), hi.into()]))
    }

    #[must_use]
    pub fn where_not_between(self, field: impl Into<String>, lo: impl Into<Bson>, hi: impl Into<Bson>) -> Self {
        self.basic(Boolean::And, field, Operator::NotBetween, Bson::Array(vec![lo.into(), hi.into()]))
    }

    #[must_use]
    pub fn or_where_not_between(self, field: impl Into<String>, lo: impl Into<Bson>, hi: impl Into<Bson>) -> Self {
        self.basic(Boolean::Or, field, Operator::NotBetween, Bson::Array(vec![lo.into(), hi.into()]))
    }

    // --- null checks ---

    /// Matches explicit `null` and a missing field.
    #[must_use]
    pub fn where_null(self, field: impl Into<String>) -> Self {
        self.basic(Boolean::And, field, Operator::Eq, Bson::Null)
    }

    #[must_use]
    pub fn or_where_null(self, field: impl Into<String>) -> Self {
        self.basic(Boolean::Or, field, Operator::Eq, Bson::Null)
    }

    #[must_use]
    pub fn where_not_null(self, field: impl Into<String>) -> Self {
        self.basic(Boolean::And, field, Operator::Ne, Bson::Null)
    }

    #[must_use]
    pub fn or_where_not_null(self, field: impl Into<String>) -> Self {
        self.basic(Boolean::Or, field, Operator::Ne, Bson::Null)
    }

    // --- string patterns ---

    #[must_use]
    pub fn where_like(self, field: impl Into<String>, pattern: &str) -> Self {
        self.basic(Boolean::And, field, Operator::Like, Bson::String(pattern.to_string()))
    }

    #[must_use]
    pub fn where_regex(self, field: impl Into<String>, pattern: &str, flags: &str) -> Self {
        let mut re = Document::new();
        re.insert("$regex", pattern);
        re.insert("$options", flags);
        self.basic(Boolean::And, field, Operator::Regex, Bson::Document(re))
    }

    // --- groups and raw fragments ---

    /// Adds a parenthesized group built by `f` on an empty filter.
    #[must_use]
    pub fn where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.nested(Boolean::And, f)
    }

    #[must_use]
    pub fn or_where_nested<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.nested(Boolean::Or, f)
    }

    fn nested<F>(self, boolean: Boolean, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let mut scratch = self.clone();
        scratch.wheres.clear();
        let group = f(scratch).wheres;
        if group.is_empty() {
            return self;
        }
        self.add_clause(boolean, ClauseKind::Nested(group))
    }

    #[must_use]
    pub fn where_raw(self, fragment: Document) -> Self {
        self.add_clause(Boolean::And, ClauseKind::Raw(fragment))
    }

    #[must_use]
    pub fn or_where_raw(self, fragment: Document) -> Self {
        self.add_clause(Boolean::Or, ClauseKind::Raw(fragment))
    }

    /// Raw fragment given as a JSON object.
    ///
    /// # Errors
    /// Returns `InvalidArgument` when `json` is not a JSON object.
    pub fn where_raw_json(self, json: &str) -> Result<Self, DbError> {
        let fragment = crate::utils::json::parse_json_to_bson_document(json)
            .map_err(|e| DbError::InvalidArgument(e.to_string()))?;
        Ok(self.where_raw(fragment))
    }

    // --- date components ---

    #[must_use]
    pub fn where_year(self, field: &str, year: i32) -> Self {
        self.where_raw(date_part_fragment(field, DatePart::Year, year))
    }

    #[must_use]
    pub fn where_month(self, field: &str, month: i32) -> Self {
        self.where_raw(date_part_fragment(field, DatePart::Month, month))
    }

    #[must_use]
    pub fn where_day(self, field: &str, day: i32) -> Self {
        self.where_raw(date_part_fragment(field, DatePart::Day, day))
    }

    /// # Errors
    /// Returns `InvalidArgument` when `date` is not `YYYY-MM-DD`.
    pub fn where_date(self, field: &str, date: &str) -> Result<Self, DbError> {
        Ok(self.where_raw(date_fragment(field, date)?))
    }

    /// # Errors
    /// Returns `InvalidArgument` when `time` is not `HH:MM[:SS]`.
    pub fn where_time(self, field: &str, time: &str) -> Result<Self, DbError> {
        Ok(self.where_raw(time_fragment(field, time)?))
    }

    // --- projection, sort, paging ---

    /// Restricts returned fields; `"field as alias"` renames.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty column.
    pub fn select<I, S>(mut self, columns: I) -> Result<Self, DbError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for c in columns {
            self.columns.push(c.as_ref().parse()?);
        }
        Ok(self)
    }

    /// Adds a field computed by the store from an aggregation expression.
    #[must_use]
    pub fn add_field(mut self, name: impl Into<String>, expr: impl Into<Bson>) -> Self {
        let name = name.into();
        let expr = expr.into();
        match self.computed.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = expr,
            None => self.computed.push((name, expr)),
        }
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.orders.push(SortSpec { field: field.into(), order });
        self
    }

    #[must_use]
    pub fn order_by_desc(self, field: impl Into<String>) -> Self {
        self.order_by(field, Order::Desc)
    }

    /// Zero clears the limit.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = n;
        self
    }

    /// Zero clears the offset.
    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = n;
        self
    }
}

fn list<I, V>(values: I) -> Bson
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    Bson::Array(values.into_iter().map(Into::into).collect())
}
