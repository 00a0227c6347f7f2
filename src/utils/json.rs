use bson::Document;

use crate::errors::DbError;

/// Convert a `serde_json::Value` that must be an object into a `bson::Document`.
///
/// # Errors
/// `InvalidArgument` when the value is not an object or holds numbers BSON
/// cannot represent.
pub fn json_value_to_bson_document(val: &serde_json::Value) -> Result<Document, DbError> {
    let obj = val
        .as_object()
        .ok_or_else(|| DbError::InvalidArgument("expected a JSON object".into()))?;
    Document::try_from(obj.clone()).map_err(|e| DbError::InvalidArgument(e.to_string()))
}

/// Parse a JSON string into a `bson::Document`. The JSON must be a top-level object.
///
/// # Errors
/// `Json` for malformed text, `InvalidArgument` for a non-object.
pub fn parse_json_to_bson_document(json: &str) -> Result<Document, DbError> {
    let val: serde_json::Value = serde_json::from_str(json)?;
    json_value_to_bson_document(&val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_bson_success() {
        let d = parse_json_to_bson_document(r#"{"age":{"$gt":18},"name":"x"}"#).unwrap();
        assert_eq!(d.get_document("age").unwrap().get_i32("$gt").unwrap(), 18);
        assert_eq!(d.get_str("name").unwrap(), "x");
    }

    #[test]
    fn json_to_bson_rejects_array_and_garbage() {
        assert!(matches!(parse_json_to_bson_document("[1,2,3]"), Err(DbError::InvalidArgument(_))));
        assert!(matches!(parse_json_to_bson_document("{"), Err(DbError::Json(_))));
    }
}
