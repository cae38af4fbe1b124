//! Record shaping before staging.
//!
//! The destination columns are scalar text, so list-valued fields never reach
//! the load stage: they are replaced by their JSON text. Under the fixed schema
//! policy records are additionally projected onto the eleven table columns.

use crate::config::SchemaPolicy;
use crate::models::{RawRecord, RECORD_COLUMNS};
use serde_json::Value;

/// Replaces every array-valued field with its JSON text.
///
/// Scalars and objects pass through unchanged.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use silo_core::normalize::stringify_sequences;
///
/// let record = json!({"title": "Wheat exports", "keywords": ["grain", "trade"]});
/// let out = stringify_sequences(record.as_object().unwrap().clone());
/// assert_eq!(out["keywords"], json!(r#"["grain","trade"]"#));
/// assert_eq!(out["title"], json!("Wheat exports"));
/// ```
pub fn stringify_sequences(record: RawRecord) -> RawRecord {
    record
        .into_iter()
        .map(|(key, value)| match value {
            Value::Array(_) => {
                let text = value.to_string();
                (key, Value::String(text))
            }
            other => (key, other),
        })
        .collect()
}

/// Projects a record onto the fixed table columns.
///
/// Missing columns become null, keys outside the schema are dropped, and any
/// non-string value is replaced by its JSON text. `identifier` falls back to
/// the API's `id` field.
pub fn conform_to_schema(mut record: RawRecord) -> RawRecord {
    if !record.contains_key("identifier") {
        if let Some(id) = record.remove("id") {
            record.insert("identifier".to_string(), id);
        }
    }

    RECORD_COLUMNS
        .iter()
        .map(|column| {
            let value = match record.remove(*column) {
                None | Some(Value::Null) => Value::Null,
                Some(Value::String(s)) => Value::String(s),
                Some(other) => Value::String(other.to_string()),
            };
            (column.to_string(), value)
        })
        .collect()
}

/// Applies the shaping required by `policy` to one record.
pub fn normalize(record: RawRecord, policy: SchemaPolicy) -> RawRecord {
    let record = stringify_sequences(record);
    match policy {
        SchemaPolicy::AutoDetect => record,
        SchemaPolicy::Fixed => conform_to_schema(record),
    }
}

/// Returns true if no field of the record holds an array.
pub fn is_flat(record: &RawRecord) -> bool {
    !record.values().any(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_stringify_round_trips_lists() {
        let keywords = json!(["grain", "trade", "wheat"]);
        let distributions = json!([{"format": "CSV", "access_url": "https://x/y.csv"}]);
        let out = stringify_sequences(record(json!({
            "keywords": keywords.clone(),
            "distributions": distributions.clone(),
        })));

        assert!(is_flat(&out));
        let parsed: Value = serde_json::from_str(out["keywords"].as_str().unwrap()).unwrap();
        assert_eq!(parsed, keywords);
        let parsed: Value = serde_json::from_str(out["distributions"].as_str().unwrap()).unwrap();
        assert_eq!(parsed, distributions);
    }

    #[test]
    fn test_stringify_keeps_scalars_and_maps() {
        let out = stringify_sequences(record(json!({
            "title": "Grain",
            "version_info": 3,
            "country": {"id": "DE", "title": "Germany"},
            "creator": null,
        })));

        assert_eq!(out["title"], json!("Grain"));
        assert_eq!(out["version_info"], json!(3));
        assert_eq!(out["country"], json!({"id": "DE", "title": "Germany"}));
        assert_eq!(out["creator"], Value::Null);
    }

    #[test]
    fn test_empty_list_becomes_text() {
        let out = stringify_sequences(record(json!({"keywords": []})));
        assert_eq!(out["keywords"], json!("[]"));
    }

    #[test]
    fn test_conform_projects_onto_columns() {
        let out = conform_to_schema(record(json!({
            "id": "grain-stats-2023",
            "title": "Grain statistics",
            "country": {"id": "FR"},
            "modified": "2023-04-01",
        })));

        assert_eq!(out.len(), RECORD_COLUMNS.len());
        assert_eq!(out["identifier"], json!("grain-stats-2023"));
        assert_eq!(out["title"], json!("Grain statistics"));
        assert_eq!(out["country"], json!(r#"{"id":"FR"}"#));
        assert_eq!(out["resource"], Value::Null);
        assert!(!out.contains_key("modified"));
        assert!(out.values().all(|v| v.is_string() || v.is_null()));
    }

    #[test]
    fn test_conform_prefers_identifier_over_id() {
        let out = conform_to_schema(record(json!({"identifier": "a", "id": "b"})));
        assert_eq!(out["identifier"], json!("a"));
    }

    #[test]
    fn test_normalize_autodetect_only_stringifies() {
        let out = normalize(
            record(json!({"keywords": ["a"], "extra": 1})),
            SchemaPolicy::AutoDetect,
        );
        assert_eq!(out["keywords"], json!(r#"["a"]"#));
        assert_eq!(out["extra"], json!(1));
    }

    #[test]
    fn test_normalize_fixed_is_flat() {
        let out = normalize(
            record(json!({"keywords": ["a"], "distributions": [{"f": 1}]})),
            SchemaPolicy::Fixed,
        );
        assert!(is_flat(&out));
        assert_eq!(out["keywords"], json!(r#"["a"]"#));
    }
}
