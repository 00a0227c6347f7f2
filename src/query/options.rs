use bson::{Bson, Document, doc};

use super::types::{Selection, SortSpec};
use crate::executor::FindOptions;

/// Inclusion projection for the selected columns plus computed fields.
/// `None` when every field is wanted.
#[must_use]
pub fn compile_projection(columns: &[Selection], computed: &[(String, Bson)]) -> Option<Document> {
    if columns.is_empty() {
        return None;
    }
    let mut out = Document::new();
    for c in columns {
        out.insert(c.field.clone(), 1);
    }
    for (name, _) in computed {
        out.insert(name.clone(), 1);
    }
    Some(out)
}

#[must_use]
pub fn compile_sort(orders: &[SortSpec]) -> Option<Document> {
    if orders.is_empty() {
        return None;
    }
    let mut out = Document::new();
    for s in orders {
        out.insert(s.field.clone(), s.order.direction());
    }
    Some(out)
}

/// `(skip, limit)`; zero means unset for both.
#[must_use]
pub fn compile_paging(limit: u64, offset: u64) -> (Option<u64>, Option<i64>) {
    let skip = (offset > 0).then_some(offset);
    let limit = (limit > 0).then(|| i64::try_from(limit).unwrap_or(i64::MAX));
    (skip, limit)
}

#[must_use]
pub fn compile_find_options(
    columns: &[Selection],
    computed: &[(String, Bson)],
    orders: &[SortSpec],
    limit: u64,
    offset: u64,
) -> FindOptions {
    let (skip, limit) = compile_paging(limit, offset);
    FindOptions {
        projection: compile_projection(columns, computed),
        sort: compile_sort(orders),
        skip,
        limit,
    }
}

/// Aggregation form of a read, used when computed fields must be evaluated
/// by the store.
#[must_use]
pub fn compile_pipeline(filter: Document, computed: &[(String, Bson)], options: FindOptions) -> Vec<Document> {
    let mut pipeline = vec![doc! { "$match": filter }];
    if !computed.is_empty() {
        let mut fields = Document::new();
        for (name, expr) in computed {
            fields.insert(name.clone(), expr.clone());
        }
        pipeline.push(doc! { "$addFields": fields });
    }
    if let Some(sort) = options.sort {
        pipeline.push(doc! { "$sort": sort });
    }
    if let Some(skip) = options.skip {
        pipeline.push(doc! { "$skip": i64::try_from(skip).unwrap_or(i64::MAX) });
    }
    if let Some(limit) = options.limit {
        pipeline.push(doc! { "$limit": limit });
    }
    if let Some(projection) = options.projection {
        pipeline.push(doc! { "$project": projection });
    }
    pipeline
}
