use bson::{Bson, Document};

use super::eval::{element_matches, values_equal};
use crate::errors::ExecutionError;
use crate::types::ID_FIELD;

const MAX_ARRAY_PAD: usize = 1 << 16;

/// Applies an operator update document in place. Returns whether the
/// document changed.
///
/// # Errors
/// Unknown operators, a plain replacement document, or an operand that does
/// not fit the targeted field. `doc` is left untouched on error.
pub fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, ExecutionError> {
    if update.is_empty() {
        return Err(ExecutionError::new("update document must not be empty"));
    }
    let mut next = doc.clone();
    for (op, body) in update {
        let Bson::Document(fields) = body else {
            if op.starts_with('$') {
                return Err(ExecutionError::new(format!("modifier {op} expects an object")));
            }
            return Err(ExecutionError::new("update document requires atomic operators"));
        };
        for (path, operand) in fields {
            match op.as_str() {
                "$set" => set_path(&mut next, path, operand.clone())?,
                "$unset" => unset_path(&mut next, path),
                "$inc" => inc_path(&mut next, path, operand)?,
                "$push" => push_path(&mut next, path, operand, false)?,
                "$addToSet" => push_path(&mut next, path, operand, true)?,
                "$pull" => pull_path(&mut next, path, |e| element_matches(e, operand))?,
                "$pullAll" => {
                    let Bson::Array(listed) = operand else {
                        return Err(ExecutionError::new("$pullAll requires an array argument"));
                    };
                    pull_path(&mut next, path, |e| Ok(listed.iter().any(|l| values_equal(e, l))))?;
                }
                other => return Err(ExecutionError::new(format!("unknown modifier: {other}"))),
            }
        }
    }
    if next.get(ID_FIELD) != doc.get(ID_FIELD) {
        return Err(ExecutionError::new("performing an update on the path '_id' would modify the immutable field '_id'"));
    }
    let changed = next != *doc;
    *doc = next;
    Ok(changed)
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> Result<(), ExecutionError> {
    let Some((head, rest)) = path.split_once('.') else {
        root.insert(path, value);
        return Ok(());
    };
    if !root.contains_key(head) {
        root.insert(head, Document::new());
    }
    match root.get_mut(head) {
        Some(child) => set_in(child, head, rest, value),
        None => Err(ExecutionError::new(format!("cannot create field '{rest}' in '{head}'"))),
    }
}

/// Sets `path` below `parent`, a value named `name`. Numeric segments index
/// into arrays, padding with nulls past the end.
fn set_in(parent: &mut Bson, name: &str, path: &str, value: Bson) -> Result<(), ExecutionError> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match parent {
        Bson::Document(child) => match rest {
            None => {
                child.insert(head, value);
                Ok(())
            }
            Some(_) => set_path(child, path, value),
        },
        Bson::Array(items) => {
            let Some(index) = array_index(head) else {
                return Err(ExecutionError::new(format!("cannot create field '{head}' in array '{name}'")));
            };
            if index >= items.len() {
                if index - items.len() > MAX_ARRAY_PAD {
                    return Err(ExecutionError::new(format!("index {index} is too far past the end of '{name}'")));
                }
                let fresh = if rest.is_some() { Bson::Document(Document::new()) } else { Bson::Null };
                items.resize(index, Bson::Null);
                items.push(fresh);
            }
            match rest {
                None => {
                    items[index] = value;
                    Ok(())
                }
                Some(rest) => set_in(&mut items[index], head, rest, value),
            }
        }
        _ => Err(ExecutionError::new(format!("cannot create field '{path}' in non-object '{name}'"))),
    }
}

fn array_index(segment: &str) -> Option<usize> {
    segment.bytes().all(|b| b.is_ascii_digit()).then(|| segment.parse().ok()).flatten()
}

fn get_path_mut<'a>(root: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => root.get_mut(path),
        Some((head, rest)) => descend_mut(root.get_mut(head)?, rest),
    }
}

fn descend_mut<'a>(value: &'a mut Bson, path: &str) -> Option<&'a mut Bson> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let next = match value {
        Bson::Document(child) => child.get_mut(head)?,
        Bson::Array(items) => items.get_mut(array_index(head)?)?,
        _ => return None,
    };
    match rest {
        None => Some(next),
        Some(rest) => descend_mut(next, rest),
    }
}

/// Removes a field. An array element is replaced by null, keeping positions.
fn unset_path(root: &mut Document, path: &str) {
    match path.rsplit_once('.') {
        None => {
            root.remove(path);
        }
        Some((parent, last)) => match get_path_mut(root, parent) {
            Some(Bson::Document(child)) => {
                child.remove(last);
            }
            Some(Bson::Array(items)) => {
                if let Some(slot) = array_index(last).and_then(|i| items.get_mut(i)) {
                    *slot = Bson::Null;
                }
            }
            _ => {}
        },
    }
}

fn inc_path(root: &mut Document, path: &str, by: &Bson) -> Result<(), ExecutionError> {
    let sum = match get_path_mut(root, path) {
        None => by.clone(),
        Some(current) => add_numbers(current, by)
            .ok_or_else(|| ExecutionError::new(format!("cannot apply $inc to '{path}' with {current} and {by}")))?,
    };
    if !matches!(sum, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
        return Err(ExecutionError::new("cannot increment with non-numeric argument"));
    }
    set_path(root, path, sum)
}

#[allow(clippy::cast_precision_loss)]
fn add_numbers(a: &Bson, b: &Bson) -> Option<Bson> {
    Some(match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.checked_add(*y).map_or_else(|| Bson::Int64(i64::from(*x) + i64::from(*y)), Bson::Int32),
        (Bson::Int32(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Int32(x)) => Bson::Int64(i64::from(*x).checked_add(*y)?),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x.checked_add(*y)?),
        (Bson::Double(x), Bson::Double(y)) => Bson::Double(x + y),
        (Bson::Double(x), Bson::Int32(y)) | (Bson::Int32(y), Bson::Double(x)) => Bson::Double(x + f64::from(*y)),
        (Bson::Double(x), Bson::Int64(y)) | (Bson::Int64(y), Bson::Double(x)) => Bson::Double(x + *y as f64),
        _ => return None,
    })
}

fn push_path(root: &mut Document, path: &str, operand: &Bson, unique: bool) -> Result<(), ExecutionError> {
    let incoming: Vec<Bson> = match operand {
        Bson::Document(d) if d.contains_key("$each") => match d.get("$each") {
            Some(Bson::Array(items)) => items.clone(),
            _ => return Err(ExecutionError::new("the argument to $each must be an array")),
        },
        other => vec![other.clone()],
    };
    if get_path_mut(root, path).is_none() {
        set_path(root, path, Bson::Array(Vec::new()))?;
    }
    let Some(Bson::Array(items)) = get_path_mut(root, path) else {
        return Err(ExecutionError::new(format!("the field '{path}' must be an array")));
    };
    for value in incoming {
        if unique && items.iter().any(|i| values_equal(i, &value)) {
            continue;
        }
        items.push(value);
    }
    Ok(())
}

fn pull_path<F>(root: &mut Document, path: &str, mut remove: F) -> Result<(), ExecutionError>
where
    F: FnMut(&Bson) -> Result<bool, ExecutionError>,
{
    let items = match get_path_mut(root, path) {
        None => return Ok(()),
        Some(Bson::Array(items)) => items,
        Some(_) => return Err(ExecutionError::new(format!("cannot apply $pull to a non-array value at '{path}'"))),
    };
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !remove(&item)? {
            kept.push(item);
        }
    }
    *items = kept;
    Ok(())
}
