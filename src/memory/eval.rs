//! Filter matching with document-store semantics.
//!
//! Dotted paths fan out over arrays of sub-documents, equality against an
//! array field is containment, and `null` equality also matches a missing
//! field. Range operators only compare values of the same type bracket.

use bson::{Bson, Document};
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::num::NonZeroUsize;

use super::expr;
use crate::errors::ExecutionError;

pub(crate) const MAX_PATH_DEPTH: usize = 32;

const REGEX_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

thread_local! {
    static REGEX_CACHE: RefCell<LruCache<String, Regex>> = RefCell::new(LruCache::new(REGEX_CACHE_SIZE));
}

/// Whether `doc` satisfies `filter`. An empty filter matches everything.
///
/// # Errors
/// Unknown operators or malformed operands.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, ExecutionError> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for f in clauses(key, cond)? {
                    if !matches(doc, f)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in clauses(key, cond)? {
                    if matches(doc, f)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            "$expr" => expr::truthy(&expr::evaluate(doc, cond)?),
            k if k.starts_with('$') => return Err(ExecutionError::new(format!("unknown top level operator: {k}"))),
            path => {
                let values = lookup(doc, path);
                condition_holds(&values, cond)?
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether a single array element satisfies a `$pull` or `$elemMatch`
/// condition: an operator document tests the element itself, a plain
/// document tests the element's fields.
///
/// # Errors
/// Unknown operators or malformed operands.
pub fn element_matches(elem: &Bson, cond: &Bson) -> Result<bool, ExecutionError> {
    match (cond, elem) {
        (Bson::Document(c), _) if is_operator_doc(c) => apply_operators(&[elem], c),
        (Bson::Document(c), Bson::Document(e)) => matches(e, c),
        (Bson::Document(_), _) => Ok(false),
        _ => Ok(equals_any(&[elem], cond)),
    }
}

fn clauses<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a Document>, ExecutionError> {
    let Bson::Array(items) = cond else {
        return Err(ExecutionError::new(format!("{op} must be an array")));
    };
    if items.is_empty() {
        return Err(ExecutionError::new(format!("{op} must be a nonempty array")));
    }
    items
        .iter()
        .map(|i| match i {
            Bson::Document(d) => Ok(d),
            _ => Err(ExecutionError::new(format!("{op} entries must be objects"))),
        })
        .collect()
}

fn is_operator_doc(d: &Document) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn condition_holds(values: &[&Bson], cond: &Bson) -> Result<bool, ExecutionError> {
    match cond {
        Bson::Document(d) if is_operator_doc(d) => apply_operators(values, d),
        _ => Ok(equals_any(values, cond)),
    }
}

fn apply_operators(values: &[&Bson], ops: &Document) -> Result<bool, ExecutionError> {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_any(values, operand),
            "$ne" => !equals_any(values, operand),
            "$gt" => compares(values, operand, |o| o == Ordering::Greater),
            "$gte" => compares(values, operand, |o| o != Ordering::Less),
            "$lt" => compares(values, operand, |o| o == Ordering::Less),
            "$lte" => compares(values, operand, |o| o != Ordering::Greater),
            "$in" => in_list(values, list(op, operand)?)?,
            "$nin" => !in_list(values, list(op, operand)?)?,
            "$exists" => !values.is_empty() == expr::truthy(operand),
            "$type" => type_matches(values, operand)?,
            "$mod" => modulo(values, operand)?,
            "$all" => {
                let wanted = list(op, operand)?;
                !wanted.is_empty() && wanted.iter().all(|w| equals_any(values, w))
            }
            "$size" => {
                let n = as_i64(operand).ok_or_else(|| ExecutionError::new("$size needs a number"))?;
                values.iter().any(|v| matches!(v, Bson::Array(a) if i64::try_from(a.len()).is_ok_and(|l| l == n)))
            }
            "$elemMatch" => {
                let Bson::Document(criteria) = operand else {
                    return Err(ExecutionError::new("$elemMatch needs an object"));
                };
                let cond = Bson::Document(criteria.clone());
                let mut hit = false;
                for v in values {
                    if let Bson::Array(items) = v {
                        for item in items {
                            if element_matches(item, &cond)? {
                                hit = true;
                                break;
                            }
                        }
                    }
                }
                hit
            }
            "$regex" => {
                let (pattern, native) = pattern_of(operand)?;
                let options = ops.get_str("$options").unwrap_or(native);
                regex_matches(values, pattern, options)?
            }
            "$options" => true,
            "$not" => match operand {
                Bson::Document(inner) => !apply_operators(values, inner)?,
                Bson::RegularExpression(re) => {
                    !regex_matches(values, re.pattern.as_str(), re.options.as_str())?
                }
                _ => return Err(ExecutionError::new("$not needs a regex or a document")),
            },
            other => return Err(ExecutionError::new(format!("unknown operator: {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn list<'a>(op: &str, operand: &'a Bson) -> Result<&'a [Bson], ExecutionError> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(ExecutionError::new(format!("{op} needs an array"))),
    }
}

fn pattern_of(operand: &Bson) -> Result<(&str, &str), ExecutionError> {
    match operand {
        Bson::String(s) => Ok((s.as_str(), "")),
        Bson::RegularExpression(re) => Ok((re.pattern.as_str(), re.options.as_str())),
        _ => Err(ExecutionError::new("$regex has to be a string")),
    }
}

/// Each value, plus the elements of array values.
fn expand<'a>(values: &'a [&'a Bson]) -> impl Iterator<Item = &'a Bson> {
    values.iter().flat_map(|v| {
        let inner: Box<dyn Iterator<Item = &'a Bson>> = match v {
            Bson::Array(items) => Box::new(std::iter::once(*v).chain(items.iter())),
            _ => Box::new(std::iter::once(*v)),
        };
        inner
    })
}

fn equals_any(values: &[&Bson], target: &Bson) -> bool {
    match target {
        Bson::Null => values.is_empty() || expand(values).any(|v| matches!(v, Bson::Null)),
        Bson::RegularExpression(re) => {
            regex_matches(values, re.pattern.as_str(), re.options.as_str()).unwrap_or(false)
        }
        _ => expand(values).any(|v| values_equal(v, target)),
    }
}

fn in_list(values: &[&Bson], items: &[Bson]) -> Result<bool, ExecutionError> {
    Ok(items.iter().any(|item| equals_any(values, item)))
}

fn compares(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    expand(values).any(|v| same_bracket(v, operand) && accept(compare_bson(v, operand)))
}

fn regex_matches(values: &[&Bson], pattern: &str, options: &str) -> Result<bool, ExecutionError> {
    let re = compile_regex(pattern, options)?;
    Ok(expand(values).any(|v| matches!(v, Bson::String(s) if re.is_match(s))))
}

/// Compiled patterns are kept per thread so a filter evaluated over many
/// documents builds its regex once.
fn compile_regex(pattern: &str, options: &str) -> Result<Regex, ExecutionError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(ExecutionError::new(format!("invalid flag in regex options: {other}"))),
        };
    }
    let key = format!("{options}/{pattern}");
    if let Some(re) = REGEX_CACHE.with(|c| c.borrow_mut().get(key.as_str()).cloned()) {
        return Ok(re);
    }
    let re = builder
        .build()
        .map_err(|e| ExecutionError::with_source(format!("invalid regex '{pattern}'"), e))?;
    REGEX_CACHE.with(|c| c.borrow_mut().put(key, re.clone()));
    Ok(re)
}

fn modulo(values: &[&Bson], operand: &Bson) -> Result<bool, ExecutionError> {
    let pair = list("$mod", operand)?;
    let (Some(divisor), Some(remainder)) = (pair.first().and_then(as_i64), pair.get(1).and_then(as_i64)) else {
        return Err(ExecutionError::new("$mod needs [divisor, remainder]"));
    };
    if divisor == 0 {
        return Err(ExecutionError::new("divisor cannot be 0"));
    }
    Ok(expand(values).filter_map(as_i64).any(|n| n.checked_rem(divisor).is_some_and(|r| r == remainder)))
}

fn type_matches(values: &[&Bson], operand: &Bson) -> Result<bool, ExecutionError> {
    let wanted: Vec<&Bson> = match operand {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for w in wanted {
        let hit = match w {
            Bson::String(alias) if alias == "number" => expand(values).any(is_number),
            Bson::String(alias) => {
                let code = type_alias(alias)
                    .ok_or_else(|| ExecutionError::new(format!("unknown type name alias: {alias}")))?;
                expand(values).any(|v| type_code(v) == code)
            }
            other => {
                let code = as_i64(other).ok_or_else(|| ExecutionError::new("$type needs a code or alias"))?;
                expand(values).any(|v| i64::from(type_code(v)) == code)
            }
        };
        if hit {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Numeric type code stored in the BSON element header.
#[must_use]
pub const fn type_code(v: &Bson) -> i32 {
    match v {
        Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::Undefined => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Null => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) => 12,
        Bson::JavaScriptCode(_) => 13,
        Bson::Symbol(_) => 14,
        Bson::JavaScriptCodeWithScope(_) => 15,
        Bson::Int32(_) => 16,
        Bson::Timestamp(_) => 17,
        Bson::Int64(_) => 18,
        Bson::Decimal128(_) => 19,
        Bson::MinKey => -1,
        Bson::MaxKey => 127,
    }
}

fn type_alias(alias: &str) -> Option<i32> {
    Some(match alias {
        "double" => 1,
        "string" => 2,
        "object" => 3,
        "array" => 4,
        "binData" => 5,
        "undefined" => 6,
        "objectId" => 7,
        "bool" => 8,
        "date" => 9,
        "null" => 10,
        "regex" => 11,
        "dbPointer" => 12,
        "javascript" => 13,
        "symbol" => 14,
        "javascriptWithScope" => 15,
        "int" => 16,
        "timestamp" => 17,
        "long" => 18,
        "decimal" => 19,
        "minKey" => -1,
        "maxKey" => 127,
        _ => return None,
    })
}

// --- paths ---

/// Values reached by a dotted path. Arrays of sub-documents fan out; a
/// numeric segment indexes into an array. Missing paths yield nothing.
#[must_use]
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if parts.len() > MAX_PATH_DEPTH {
        return out;
    }
    if let Some((head, rest)) = parts.split_first()
        && let Some(v) = doc.get(*head)
    {
        collect(v, rest, &mut out);
    }
    out
}

fn collect<'a>(value: &'a Bson, parts: &[&str], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = parts.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Bson::Document(d) => {
            if let Some(v) = d.get(*head) {
                collect(v, rest, out);
            }
        }
        Bson::Array(items) => {
            if let Ok(i) = head.parse::<usize>() {
                if let Some(v) = items.get(i) {
                    collect(v, rest, out);
                }
            } else {
                for item in items.iter().filter(|i| matches!(i, Bson::Document(_))) {
                    collect(item, parts, out);
                }
            }
        }
        _ => {}
    }
}

// --- comparison ---

fn is_number(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

pub(crate) fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(i64::from(*i)),
        Bson::Int64(i) => Some(*i),
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.is_finite() => Some(f.trunc() as i64),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Sort bracket; values only compare by content within one bracket.
const fn bracket(v: &Bson) -> u8 {
    match v {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::DbPointer(_) | Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => 12,
        Bson::MaxKey => 13,
    }
}

fn same_bracket(a: &Bson, b: &Bson) -> bool {
    bracket(a) == bracket(b)
}

/// Equality across numeric widths; everything else is structural.
#[must_use]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_number(a) && is_number(b) {
        return compare_bson(a, b) == Ordering::Equal;
    }
    match (a, b) {
        (Bson::Array(x), Bson::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q)),
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        _ => a == b,
    }
}

/// Total order used for sorting and range tests.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let by_bracket = bracket(a).cmp(&bracket(b));
    if by_bracket != Ordering::Equal {
        return by_bracket;
    }
    match (a, b) {
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            as_i64(a).cmp(&as_i64(b))
        }
        _ if is_number(a) => {
            let (x, y) = (as_f64(a).unwrap_or(f64::NAN), as_f64(b).unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        (Bson::Array(x), Bson::Array(y)) => {
            for (p, q) in x.iter().zip(y) {
                let o = compare_bson(p, q);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => {
            for ((ka, va), (kb, vb)) in x.iter().zip(y) {
                let o = compare_bson(va, vb).then_with(|| ka.cmp(kb));
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Orders two documents by a sort specification `{field: 1 | -1, ...}`.
/// A missing field sorts as `null`. An array field sorts by its smallest
/// element ascending and by its largest element descending.
#[must_use]
pub fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, dir) in sort {
        let descending = as_i64(dir).unwrap_or(1) < 0;
        let va = sort_key(a, field, descending);
        let vb = sort_key(b, field, descending);
        let ord = compare_bson(va, vb);
        if ord != Ordering::Equal {
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

fn sort_key<'a>(doc: &'a Document, field: &str, descending: bool) -> &'a Bson {
    let mut candidates = lookup(doc, field).into_iter().flat_map(|v: &'a Bson| match v {
        Bson::Array(items) if !items.is_empty() => items.iter().collect::<Vec<_>>(),
        Bson::Array(_) => vec![&Bson::Null],
        other => vec![other],
    });
    let first = candidates.next().unwrap_or(&Bson::Null);
    candidates.fold(first, |best, v| {
        let ord = compare_bson(v, best);
        let better = if descending { ord == Ordering::Greater } else { ord == Ordering::Less };
        if better { v } else { best }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn m(d: &Document, f: Document) -> bool {
        matches(d, &f).unwrap()
    }

    #[test]
    fn equality_is_containment_on_arrays() {
        let d = doc! { "tags": ["tag1", "tag2"] };
        assert!(m(&d, doc! { "tags": "tag2" }));
        assert!(m(&d, doc! { "tags": ["tag1", "tag2"] }));
        assert!(!m(&d, doc! { "tags": "tag3" }));
    }

    #[test]
    fn null_matches_missing() {
        let d = doc! { "name": "x" };
        assert!(m(&d, doc! { "age": Bson::Null }));
        assert!(!m(&d, doc! { "age": { "$exists": true, "$ne": Bson::Null } }));
        assert!(m(&doc! { "age": Bson::Null }, doc! { "age": Bson::Null }));
    }

    #[test]
    fn numeric_widths_compare_equal() {
        let d = doc! { "age": 20_i64 };
        assert!(m(&d, doc! { "age": 20 }));
        assert!(m(&d, doc! { "age": { "$gte": 19.5 } }));
        assert!(!m(&d, doc! { "age": { "$gt": "a" } }));
    }

    #[test]
    fn dotted_paths_fan_out() {
        let d = doc! { "addresses": [ { "city": "Ghent" }, { "city": "Paris" } ] };
        assert!(m(&d, doc! { "addresses.city": "Paris" }));
        assert!(m(&d, doc! { "addresses.1.city": "Paris" }));
        assert!(!m(&d, doc! { "addresses.0.city": "Paris" }));
    }

    #[test]
    fn logical_operators() {
        let d = doc! { "a": 1, "b": 2 };
        assert!(m(&d, doc! { "$or": [ { "a": 5 }, { "b": 2 } ] }));
        assert!(!m(&d, doc! { "$and": [ { "a": 1 }, { "b": 3 } ] }));
        assert!(m(&d, doc! { "$nor": [ { "a": 5 } ] }));
        assert!(matches(&d, &doc! { "$or": [] }).is_err());
    }

    #[test]
    fn array_operators() {
        let d = doc! { "tags": ["a", "b", "c"], "items": [ { "n": 1, "k": "x" }, { "n": 5, "k": "y" } ] };
        assert!(m(&d, doc! { "tags": { "$all": ["c", "a"] } }));
        assert!(!m(&d, doc! { "tags": { "$all": [] } }));
        assert!(m(&d, doc! { "tags": { "$size": 3 } }));
        assert!(m(&d, doc! { "items": { "$elemMatch": { "n": { "$gt": 2 }, "k": "y" } } }));
        assert!(!m(&d, doc! { "items": { "$elemMatch": { "n": { "$gt": 2 }, "k": "x" } } }));
    }

    #[test]
    fn in_and_nin() {
        let d = doc! { "age": 20 };
        assert!(m(&d, doc! { "age": { "$in": [20, 21] } }));
        assert!(!m(&d, doc! { "age": { "$in": [] } }));
        assert!(m(&d, doc! { "age": { "$nin": [] } }));
        assert!(m(&doc! {}, doc! { "age": { "$in": [Bson::Null] } }));
    }

    #[test]
    fn regex_with_options_and_not() {
        let d = doc! { "name": "John Doe" };
        assert!(m(&d, doc! { "name": { "$regex": "doe$", "$options": "i" } }));
        assert!(!m(&d, doc! { "name": { "$regex": "doe$" } }));
        assert!(m(&d, doc! { "name": { "$not": { "$regex": "^jane", "$options": "i" } } }));
        assert!(matches(&d, &doc! { "name": { "$regex": "(" } }).is_err());
    }

    #[test]
    fn type_mod_and_exists() {
        let d = doc! { "n": 7, "s": "x", "z": Bson::Null };
        assert!(m(&d, doc! { "n": { "$type": 16 } }));
        assert!(m(&d, doc! { "n": { "$type": "number" } }));
        assert!(m(&d, doc! { "s": { "$type": "string" } }));
        assert!(m(&d, doc! { "n": { "$mod": [3, 1] } }));
        assert!(m(&d, doc! { "z": { "$exists": true } }));
        assert!(m(&d, doc! { "q": { "$exists": false } }));
        assert!(matches(&d, &doc! { "n": { "$mod": [0, 1] } }).is_err());
    }

    #[test]
    fn repeated_patterns_reuse_the_compiled_regex() {
        let first = compile_regex("^j.*doe$", "i").unwrap();
        let again = compile_regex("^j.*doe$", "i").unwrap();
        assert_eq!(first.as_str(), again.as_str());
        assert!(again.is_match("JANE DOE"));
        assert!(compile_regex("^j", "q").is_err());
        let docs = [doc! { "name": "John Doe" }, doc! { "name": "Robert Roe" }];
        let filter = doc! { "name": { "$regex": "doe", "$options": "i" } };
        let hits = docs.iter().filter(|d| m(d, filter.clone())).count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn mod_by_minus_one_at_integer_minimum() {
        let d = doc! { "n": i64::MIN };
        assert!(m(&d, doc! { "n": { "$mod": [-1, 0] } }));
        assert!(!m(&d, doc! { "n": { "$mod": [-1, 1] } }));
    }

    #[test]
    fn array_sort_keys_use_min_and_max() {
        let a = doc! { "v": [5, 1] };
        let b = doc! { "v": [3, 4] };
        assert_eq!(compare_docs(&a, &b, &doc! { "v": 1 }), Ordering::Less);
        assert_eq!(compare_docs(&a, &b, &doc! { "v": -1 }), Ordering::Less);
        assert_eq!(compare_docs(&doc! { "v": 2 }, &b, &doc! { "v": -1 }), Ordering::Greater);
    }

    #[test]
    fn unknown_operator_is_an_error() {
        assert!(matches(&doc! { "a": 1 }, &doc! { "a": { "$near": 1 } }).is_err());
        assert!(matches(&doc! { "a": 1 }, &doc! { "$where": "1" }).is_err());
    }

    #[test]
    fn sort_puts_missing_first_ascending() {
        let a = doc! { "age": 3 };
        let b = doc! {};
        assert_eq!(compare_docs(&a, &b, &doc! { "age": 1 }), Ordering::Greater);
        assert_eq!(compare_docs(&a, &b, &doc! { "age": -1 }), Ordering::Less);
    }
}
