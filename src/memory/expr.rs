//! Aggregation expressions used by `$expr`, `$addFields` and `$project`.

use bson::{Bson, Document};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::cmp::Ordering;
use std::fmt::Write as _;

use super::eval::{as_f64, compare_bson, lookup};
use crate::errors::ExecutionError;

/// Evaluates `expr` against `doc`. `"$path"` strings are field references;
/// a missing field evaluates to `null`.
///
/// # Errors
/// Unknown operators or operands of the wrong type.
pub fn evaluate(doc: &Document, expr: &Bson) -> Result<Bson, ExecutionError> {
    match expr {
        Bson::String(s) if s.starts_with('$') && !s.starts_with("$$") => {
            Ok(lookup(doc, &s[1..]).first().map_or(Bson::Null, |v| (*v).clone()))
        }
        Bson::Array(items) => Ok(Bson::Array(items.iter().map(|i| evaluate(doc, i)).collect::<Result<_, _>>()?)),
        Bson::Document(d) => match d.iter().next() {
            Some((op, operand)) if d.len() == 1 && op.starts_with('$') => operator(doc, op, operand),
            _ => {
                let mut out = Document::new();
                for (k, v) in d {
                    out.insert(k.clone(), evaluate(doc, v)?);
                }
                Ok(Bson::Document(out))
            }
        },
        other => Ok(other.clone()),
    }
}

/// Expression truthiness: `false`, `null`, missing and zero are false.
#[must_use]
pub fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => true,
    }
}

const fn is_null(v: &Bson) -> bool {
    matches!(v, Bson::Null)
}

fn operator(doc: &Document, op: &str, operand: &Bson) -> Result<Bson, ExecutionError> {
    if op == "$literal" {
        return Ok(operand.clone());
    }
    let args = arguments(doc, operand)?;
    match op {
        "$add" => add(&args),
        "$subtract" => {
            let [a, b] = exactly::<2>(op, args)?;
            subtract(&a, &b)
        }
        "$multiply" => fold_numbers(op, &args, 1, |x, y| x.checked_mul(y), |x, y| x * y),
        "$divide" => {
            let [a, b] = exactly::<2>(op, args)?;
            if is_null(&a) || is_null(&b) {
                return Ok(Bson::Null);
            }
            let (Some(x), Some(y)) = (as_f64(&a), as_f64(&b)) else {
                return Err(ExecutionError::new("$divide only supports numeric types"));
            };
            if y == 0.0 {
                return Err(ExecutionError::new("can't $divide by zero"));
            }
            Ok(Bson::Double(x / y))
        }
        "$max" | "$min" => {
            let items = match <[Bson; 1]>::try_from(args) {
                Ok([Bson::Array(inner)]) => inner,
                Ok([single]) => vec![single],
                Err(all) => all,
            };
            let want = if op == "$max" { Ordering::Greater } else { Ordering::Less };
            Ok(items
                .into_iter()
                .filter(|v| !is_null(v))
                .reduce(|best, v| if compare_bson(&v, &best) == want { v } else { best })
                .unwrap_or(Bson::Null))
        }
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => {
            let [a, b] = exactly::<2>(op, args)?;
            let ord = compare_bson(&a, &b);
            Ok(Bson::Boolean(match op {
                "$eq" => ord == Ordering::Equal,
                "$ne" => ord != Ordering::Equal,
                "$gt" => ord == Ordering::Greater,
                "$gte" => ord != Ordering::Less,
                "$lt" => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            }))
        }
        "$and" => Ok(Bson::Boolean(args.iter().all(truthy))),
        "$or" => Ok(Bson::Boolean(args.iter().any(truthy))),
        "$not" => {
            let [a] = exactly::<1>(op, args)?;
            Ok(Bson::Boolean(!truthy(&a)))
        }
        "$ifNull" => Ok(args.into_iter().find(|v| !is_null(v)).unwrap_or(Bson::Null)),
        "$cond" => {
            let [cond, then, otherwise] = exactly::<3>(op, args)?;
            Ok(if truthy(&cond) { then } else { otherwise })
        }
        "$concat" => {
            let mut out = String::new();
            for a in &args {
                match a {
                    Bson::String(s) => out.push_str(s),
                    Bson::Null => return Ok(Bson::Null),
                    other => return Err(ExecutionError::new(format!("$concat only supports strings, not {other}"))),
                }
            }
            Ok(Bson::String(out))
        }
        "$year" | "$month" | "$dayOfMonth" | "$hour" | "$minute" | "$second" => {
            let Some(dt) = date_argument(op, args)? else {
                return Ok(Bson::Null);
            };
            let n = match op {
                "$year" => dt.year(),
                "$month" => i32::try_from(dt.month()).unwrap_or_default(),
                "$dayOfMonth" => i32::try_from(dt.day()).unwrap_or_default(),
                "$hour" => i32::try_from(dt.hour()).unwrap_or_default(),
                "$minute" => i32::try_from(dt.minute()).unwrap_or_default(),
                _ => i32::try_from(dt.second()).unwrap_or_default(),
            };
            Ok(Bson::Int32(n))
        }
        "$dateToString" => date_to_string(doc, operand),
        other => Err(ExecutionError::new(format!("unsupported expression operator: {other}"))),
    }
}

/// Operands: an array evaluates element-wise, anything else is one argument.
/// `$dateToString` takes a named-argument document and never reaches here.
fn arguments(doc: &Document, operand: &Bson) -> Result<Vec<Bson>, ExecutionError> {
    match operand {
        Bson::Array(items) => items.iter().map(|i| evaluate(doc, i)).collect(),
        Bson::Document(d) if d.contains_key("date") && d.len() <= 2 && !d.contains_key("format") => {
            Ok(vec![evaluate(doc, d.get("date").unwrap_or(&Bson::Null))?])
        }
        other => Ok(vec![evaluate(doc, other)?]),
    }
}

fn exactly<const N: usize>(op: &str, args: Vec<Bson>) -> Result<[Bson; N], ExecutionError> {
    let got = args.len();
    <[Bson; N]>::try_from(args)
        .map_err(|_| ExecutionError::new(format!("expression {op} takes exactly {N} arguments, {got} were passed in")))
}

fn add(args: &[Bson]) -> Result<Bson, ExecutionError> {
    if args.iter().any(is_null) {
        return Ok(Bson::Null);
    }
    let dates: Vec<&bson::DateTime> = args
        .iter()
        .filter_map(|a| match a {
            Bson::DateTime(d) => Some(d),
            _ => None,
        })
        .collect();
    match dates.as_slice() {
        [] => fold_numbers("$add", args, 0, i64::checked_add, |x, y| x + y),
        [date] => {
            let rest: Vec<Bson> = args.iter().filter(|a| !matches!(a, Bson::DateTime(_))).cloned().collect();
            let offset = fold_numbers("$add", &rest, 0, i64::checked_add, |x, y| x + y)?;
            let millis = as_f64(&offset).unwrap_or_default();
            #[allow(clippy::cast_possible_truncation)]
            let shifted = date.timestamp_millis().saturating_add(millis.round() as i64);
            Ok(Bson::DateTime(bson::DateTime::from_millis(shifted)))
        }
        _ => Err(ExecutionError::new("only one date allowed in an $add expression")),
    }
}

fn subtract(a: &Bson, b: &Bson) -> Result<Bson, ExecutionError> {
    match (a, b) {
        (Bson::Null, _) | (_, Bson::Null) => Ok(Bson::Null),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Ok(Bson::Int64(x.timestamp_millis().saturating_sub(y.timestamp_millis())))
        }
        (Bson::DateTime(x), n) => {
            let millis = as_f64(n).ok_or_else(|| ExecutionError::new("can't $subtract a non-number from a date"))?;
            #[allow(clippy::cast_possible_truncation)]
            let shifted = x.timestamp_millis().saturating_sub(millis.round() as i64);
            Ok(Bson::DateTime(bson::DateTime::from_millis(shifted)))
        }
        _ => {
            let negated = match b {
                Bson::Int32(i) => Bson::Int64(-i64::from(*i)),
                Bson::Int64(i) => Bson::Int64(i.saturating_neg()),
                Bson::Double(f) => Bson::Double(-f),
                other => return Err(ExecutionError::new(format!("can't $subtract {other}"))),
            };
            let keep_i32 = matches!((a, b), (Bson::Int32(_), Bson::Int32(_)));
            let out = fold_numbers("$subtract", &[a.clone(), negated], 0, i64::checked_add, |x, y| x + y)?;
            Ok(match out {
                Bson::Int64(n) if keep_i32 => i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32),
                other => other,
            })
        }
    }
}

/// Integer arithmetic while every operand is an integer, widening from
/// `Int32` to `Int64` on overflow; any double turns the result into a double.
fn fold_numbers(
    op: &str,
    args: &[Bson],
    identity: i64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Bson, ExecutionError> {
    let mut int_acc = Some(identity);
    #[allow(clippy::cast_precision_loss)]
    let mut float_acc = identity as f64;
    let mut all_i32 = true;
    for a in args {
        match a {
            Bson::Null => return Ok(Bson::Null),
            Bson::Int32(i) => {
                int_acc = int_acc.and_then(|acc| int_op(acc, i64::from(*i)));
                float_acc = float_op(float_acc, f64::from(*i));
            }
            Bson::Int64(i) => {
                all_i32 = false;
                int_acc = int_acc.and_then(|acc| int_op(acc, *i));
                #[allow(clippy::cast_precision_loss)]
                let f = *i as f64;
                float_acc = float_op(float_acc, f);
            }
            other => {
                let f = as_f64(other)
                    .ok_or_else(|| ExecutionError::new(format!("{op} only supports numeric types, not {other}")))?;
                all_i32 = false;
                int_acc = None;
                float_acc = float_op(float_acc, f);
            }
        }
    }
    let has_float = args.iter().any(|a| matches!(a, Bson::Double(_) | Bson::Decimal128(_)));
    Ok(match int_acc {
        Some(n) if !has_float && all_i32 => i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32),
        Some(n) if !has_float => Bson::Int64(n),
        _ => Bson::Double(float_acc),
    })
}

fn date_argument(op: &str, args: Vec<Bson>) -> Result<Option<DateTime<Utc>>, ExecutionError> {
    let [arg] = exactly::<1>(op, args)?;
    match arg {
        Bson::Null => Ok(None),
        Bson::DateTime(d) => DateTime::from_timestamp_millis(d.timestamp_millis())
            .map(Some)
            .ok_or_else(|| ExecutionError::new(format!("{op}: date out of range"))),
        other => Err(ExecutionError::new(format!("can't convert from BSON type {other} to Date"))),
    }
}

fn date_to_string(doc: &Document, operand: &Bson) -> Result<Bson, ExecutionError> {
    let Bson::Document(spec) = operand else {
        return Err(ExecutionError::new("$dateToString only supports an object as its argument"));
    };
    let format = spec.get_str("format").unwrap_or("%Y-%m-%dT%H:%M:%S.%LZ").replace("%L", "%3f");
    let date = evaluate(doc, spec.get("date").unwrap_or(&Bson::Null))?;
    let Some(dt) = date_argument("$dateToString", vec![date])? else {
        return Ok(Bson::Null);
    };
    let mut out = String::new();
    write!(out, "{}", dt.format(&format))
        .map_err(|_| ExecutionError::new(format!("invalid $dateToString format '{format}'")))?;
    Ok(Bson::String(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn eval(d: &Document, e: Bson) -> Bson {
        evaluate(d, &e).unwrap()
    }

    #[test]
    fn field_references_and_arithmetic() {
        let d = doc! { "a": 1, "b": 2, "c": 1.5 };
        assert_eq!(eval(&d, doc! { "$add": ["$a", "$b"] }.into()), Bson::Int32(3));
        assert_eq!(eval(&d, doc! { "$add": ["$a", "$c"] }.into()), Bson::Double(2.5));
        assert_eq!(eval(&d, doc! { "$subtract": ["$b", "$a"] }.into()), Bson::Int32(1));
        assert_eq!(eval(&d, doc! { "$add": ["$a", "$missing"] }.into()), Bson::Null);
        assert_eq!(eval(&d, doc! { "$max": ["$a", "$b"] }.into()), Bson::Int32(2));
    }

    #[test]
    fn int32_overflow_widens() {
        let d = doc! { "a": i32::MAX };
        assert_eq!(eval(&d, doc! { "$add": ["$a", 1] }.into()), Bson::Int64(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn date_parts() {
        // 1970-03-01T12:30:00Z
        let when = bson::DateTime::from_millis(5_097_600_000 + 45_000_000);
        let d = doc! { "t": when };
        assert_eq!(eval(&d, doc! { "$year": "$t" }.into()), Bson::Int32(1970));
        assert_eq!(eval(&d, doc! { "$month": "$t" }.into()), Bson::Int32(3));
        assert_eq!(eval(&d, doc! { "$dayOfMonth": "$t" }.into()), Bson::Int32(1));
        let formatted = eval(&d, doc! { "$dateToString": { "format": "%H:%M:%S", "date": "$t" } }.into());
        assert_eq!(formatted, Bson::String("12:30:00".into()));
        assert_eq!(eval(&doc! {}, doc! { "$year": "$t" }.into()), Bson::Null);
    }

    #[test]
    fn comparisons_and_logic() {
        let d = doc! { "a": 3 };
        assert_eq!(eval(&d, doc! { "$gt": ["$a", 2] }.into()), Bson::Boolean(true));
        assert_eq!(eval(&d, doc! { "$eq": ["$a", 3.0] }.into()), Bson::Boolean(true));
        assert!(truthy(&eval(&d, doc! { "$and": [true, "$a"] }.into())));
        assert_eq!(eval(&d, doc! { "$cond": [false, 1, 2] }.into()), Bson::Int32(2));
    }

    #[test]
    fn unknown_operators_fail() {
        assert!(evaluate(&doc! {}, &doc! { "$zip": [] }.into()).is_err());
        assert!(evaluate(&doc! {}, &doc! { "$subtract": [1] }.into()).is_err());
    }

    #[test]
    fn literal_and_concat() {
        let d = doc! { "first": "Jane", "last": "Doe" };
        assert_eq!(eval(&d, doc! { "$literal": "$first" }.into()), Bson::String("$first".into()));
        assert_eq!(eval(&d, doc! { "$concat": ["$first", " ", "$last"] }.into()), Bson::String("Jane Doe".into()));
    }
}
