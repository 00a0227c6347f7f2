use bson::Bson;
use bson::oid::ObjectId;

/// Name of the primary-key field on every stored document.
pub const ID_FIELD: &str = "_id";

/// Normalizes a caller-supplied identifier to the store's native id form.
///
/// `ObjectId`s and integer ids pass through, 24-character hex strings are
/// parsed into `ObjectId`s. Anything else (null, malformed strings, other
/// types) yields `None`, which callers treat as "no such record".
#[must_use]
pub fn normalize_id(value: &Bson) -> Option<Bson> {
    match value {
        Bson::ObjectId(_) | Bson::Int32(_) | Bson::Int64(_) => Some(value.clone()),
        Bson::String(s) => ObjectId::parse_str(s).ok().map(Bson::ObjectId),
        _ => None,
    }
}
