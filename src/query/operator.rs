//! Operator table: symbolic comparison/array/string operators and the
//! filter fragment each one compiles to.

use bson::{Bson, Document, doc};
use std::fmt;
use std::str::FromStr;

use crate::errors::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
    Exists,
    Type,
    Mod,
    All,
    Size,
    ElemMatch,
    Regex,
    NotRegex,
    Raw,
}

impl Operator {
    pub const ALL: [Self; 21] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::NotBetween,
        Self::Exists,
        Self::Type,
        Self::Mod,
        Self::All,
        Self::Size,
        Self::ElemMatch,
        Self::Regex,
        Self::NotRegex,
        Self::Raw,
    ];

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Between => "between",
            Self::NotBetween => "not between",
            Self::Exists => "exists",
            Self::Type => "type",
            Self::Mod => "mod",
            Self::All => "all",
            Self::Size => "size",
            Self::ElemMatch => "elemMatch",
            Self::Regex => "regex",
            Self::NotRegex => "not regex",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Operator {
    type Err = DbError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase();
        let op = match norm.as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "like" => Self::Like,
            "not like" => Self::NotLike,
            "in" => Self::In,
            "not in" => Self::NotIn,
            "between" => Self::Between,
            "not between" => Self::NotBetween,
            "exists" => Self::Exists,
            "type" => Self::Type,
            "mod" => Self::Mod,
            "all" => Self::All,
            "size" => Self::Size,
            "elemmatch" => Self::ElemMatch,
            "regex" | "regexp" => Self::Regex,
            "not regex" | "not regexp" => Self::NotRegex,
            "raw" => Self::Raw,
            _ => return Err(DbError::UnsupportedOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// Compiles one `field <op> value` test into a filter fragment.
///
/// # Errors
/// Returns `InvalidArgument` when the operand does not have the shape the
/// operator needs (e.g. `between` without a two-element array).
pub fn compile_operator(op: Operator, field: &str, value: Bson) -> Result<Document, DbError> {
    let fragment = match op {
        Operator::Eq => match value {
            Bson::Document(d) => field_doc(field, doc! { "$eq": d }),
            other => field_doc(field, other),
        },
        Operator::Ne => field_doc(field, doc! { "$exists": true, "$ne": value }),
        Operator::Lt => field_doc(field, doc! { "$lt": value }),
        Operator::Lte => field_doc(field, doc! { "$lte": value }),
        Operator::Gt => field_doc(field, doc! { "$gt": value }),
        Operator::Gte => field_doc(field, doc! { "$gte": value }),
        Operator::Like | Operator::NotLike => {
            let Bson::String(pattern) = value else {
                return Err(invalid(op, "expects a string pattern"));
            };
            let re = doc! { "$regex": like_to_regex(&pattern), "$options": "i" };
            if op == Operator::Like {
                field_doc(field, re)
            } else {
                field_doc(field, doc! { "$not": re })
            }
        }
        Operator::In => field_doc(field, doc! { "$in": into_list(value) }),
        Operator::NotIn => field_doc(field, doc! { "$nin": into_list(value) }),
        Operator::Between | Operator::NotBetween => {
            let (lo, hi) = pair(op, value)?;
            if op == Operator::Between {
                field_doc(field, doc! { "$gte": lo, "$lte": hi })
            } else {
                doc! { "$or": [field_doc(field, doc! { "$lt": lo }), field_doc(field, doc! { "$gt": hi })] }
            }
        }
        Operator::Exists => field_doc(field, doc! { "$exists": truthy(&value) }),
        Operator::Type => field_doc(field, doc! { "$type": value }),
        Operator::Mod => {
            let (divisor, remainder) = pair(op, value)?;
            field_doc(field, doc! { "$mod": [divisor, remainder] })
        }
        Operator::All => field_doc(field, doc! { "$all": into_list(value) }),
        Operator::Size => field_doc(field, doc! { "$size": value }),
        Operator::ElemMatch => {
            let Bson::Document(criteria) = value else {
                return Err(invalid(op, "expects a document of criteria"));
            };
            field_doc(field, doc! { "$elemMatch": criteria })
        }
        Operator::Regex | Operator::NotRegex => {
            let (pattern, options) = parse_regex(&value)?;
            let re = doc! { "$regex": pattern, "$options": options };
            if op == Operator::Regex {
                field_doc(field, re)
            } else {
                field_doc(field, doc! { "$not": re })
            }
        }
        Operator::Raw => match value {
            Bson::Document(d) if field.is_empty() => d,
            Bson::Document(d) => field_doc(field, d),
            _ => return Err(invalid(op, "expects a document")),
        },
    };
    Ok(fragment)
}

/// Converts an SQL `LIKE` pattern into a case-insensitive-ready regex.
///
/// `%` matches any run, `_` one character, `\` escapes the next character.
/// Leading/trailing `%` leave that side unanchored.
#[must_use]
pub fn like_to_regex(pattern: &str) -> String {
    let (body, anchor_start) = match pattern.strip_prefix('%') {
        Some(rest) => (rest, false),
        None => (pattern, true),
    };
    let (body, anchor_end) = match body.strip_suffix('%') {
        Some(rest) if !rest.ends_with('\\') => (rest, false),
        _ => (body, anchor_start || !body.is_empty()),
    };

    let mut out = String::with_capacity(body.len() + 8);
    if anchor_start {
        out.push('^');
    }
    let mut literal = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    literal.push(next);
                }
            }
            '%' | '_' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '%' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    if anchor_end {
        out.push('$');
    }
    out
}

/// Extracts `(pattern, options)` from a BSON regex, a `{$regex, $options}`
/// document or a delimiter-wrapped string such as `/.*doe/i`.
///
/// # Errors
/// Returns `InvalidArgument` for other value types or unknown flags.
pub fn parse_regex(value: &Bson) -> Result<(String, String), DbError> {
    match value {
        Bson::RegularExpression(re) => {
            Ok((re.pattern.as_str().to_string(), re.options.as_str().to_string()))
        }
        Bson::String(s) => parse_delimited(s),
        Bson::Document(d) => {
            let pattern = d
                .get_str("$regex")
                .map_err(|_| invalid(Operator::Regex, "document needs a string $regex"))?;
            let options = d.get_str("$options").unwrap_or("");
            Ok((pattern.to_string(), options.to_string()))
        }
        _ => Err(invalid(Operator::Regex, "expects a pattern")),
    }
}

fn parse_delimited(s: &str) -> Result<(String, String), DbError> {
    let Some(delim) = s.chars().next() else {
        return Ok((String::new(), String::new()));
    };
    let close = s.rfind(delim).filter(|&at| at > 0);
    let Some(close) = close.filter(|_| !delim.is_alphanumeric() && delim != '\\') else {
        return Ok((s.to_string(), String::new()));
    };
    let pattern = &s[delim.len_utf8()..close];
    let flags = &s[close + delim.len_utf8()..];
    if let Some(bad) = flags.chars().find(|c| !"imsx".contains(*c)) {
        return Err(invalid(Operator::Regex, &format!("unknown flag '{bad}'")));
    }
    Ok((pattern.to_string(), flags.to_string()))
}

pub(crate) fn field_doc(field: &str, cond: impl Into<Bson>) -> Document {
    let mut d = Document::new();
    d.insert(field, cond);
    d
}

fn into_list(value: Bson) -> Vec<Bson> {
    match value {
        Bson::Array(items) => items,
        Bson::Null => Vec::new(),
        other => vec![other],
    }
}

fn pair(op: Operator, value: Bson) -> Result<(Bson, Bson), DbError> {
    match value {
        Bson::Array(items) if items.len() == 2 => {
            let mut it = items.into_iter();
            match (it.next(), it.next()) {
                (Some(a), Some(b)) => Ok((a, b)),
                _ => Err(invalid(op, "expects exactly two values")),
            }
        }
        _ => Err(invalid(op, "expects exactly two values")),
    }
}

const fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        _ => true,
    }
}

fn invalid(op: Operator, why: &str) -> DbError {
    DbError::InvalidArgument(format!("operator '{op}' {why}"))
}
