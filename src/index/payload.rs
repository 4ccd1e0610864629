//! Mapping between [`KnowledgeItem`] fields and the index payload.
//!
//! Decoding is lenient: every field has a documented default, and a record is
//! only dropped when it has no usable identifier.
//!
//! | field        | missing / invalid                  |
//! |--------------|------------------------------------|
//! | `id`         | record skipped                     |
//! | `title`      | `"Untitled"`                       |
//! | `text`       | `""`                               |
//! | `tags`       | empty (non-string entries dropped) |
//! | `source`     | `None`                             |
//! | `created_at` | current time                       |

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{EmbeddingVector, KnowledgeItem, VectorIndexRecord};

/// Title used when a stored record has none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// A field that had to be defaulted while decoding a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDefect {
    /// `title` absent or not a string.
    MissingTitle,
    /// `text` absent or not a string.
    MissingText,
    /// `tags` not an array, or holding non-string entries.
    InvalidTags,
    /// `source` present but not a string.
    InvalidSource,
    /// No `created_at` field.
    MissingCreatedAt,
    /// `created_at` present but not a recognizable timestamp.
    UnparsableCreatedAt,
}

/// Build the index record for an item.
pub fn encode_item(item: &KnowledgeItem, vector: EmbeddingVector) -> VectorIndexRecord {
    let mut payload = Map::new();
    payload.insert("title".into(), Value::String(item.title.clone()));
    payload.insert("text".into(), Value::String(item.text.clone()));
    payload.insert(
        "tags".into(),
        Value::Array(item.tags.iter().cloned().map(Value::String).collect()),
    );
    payload.insert(
        "source".into(),
        item.source.clone().map_or(Value::Null, Value::String),
    );
    payload.insert("created_at".into(), Value::String(format_timestamp(&item.created_at)));

    VectorIndexRecord {
        id: item.id.clone(),
        payload,
        vector,
    }
}

/// Serialized form of a creation timestamp.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decode one search hit into an item, filling defaults for bad fields.
///
/// Returns `None` only when the hit has no string or integer id.
pub fn decode_hit(id: &Value, payload: Option<&Map<String, Value>>) -> Option<KnowledgeItem> {
    let id = match id {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) if n.is_u64() || n.is_i64() => n.to_string(),
        other => {
            warn!(id = %other, "skipping search hit without a usable id");
            return None;
        }
    };

    let empty = Map::new();
    let payload = payload.unwrap_or(&empty);
    let mut defects = Vec::new();

    let title = match payload.get("title") {
        Some(Value::String(s)) => s.clone(),
        _ => {
            defects.push(RecordDefect::MissingTitle);
            DEFAULT_TITLE.to_owned()
        }
    };

    let text = match payload.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => {
            defects.push(RecordDefect::MissingText);
            String::new()
        }
    };

    let tags = match payload.get("tags") {
        Some(Value::Array(values)) => {
            let tags: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect();
            if tags.len() != values.len() {
                defects.push(RecordDefect::InvalidTags);
            }
            tags
        }
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            defects.push(RecordDefect::InvalidTags);
            Vec::new()
        }
    };

    let source = match payload.get("source") {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(_) => {
            defects.push(RecordDefect::InvalidSource);
            None
        }
    };

    let created_at = match payload.get("created_at") {
        Some(Value::String(raw)) => parse_timestamp(raw).unwrap_or_else(|| {
            defects.push(RecordDefect::UnparsableCreatedAt);
            Utc::now()
        }),
        Some(_) => {
            defects.push(RecordDefect::UnparsableCreatedAt);
            Utc::now()
        }
        None => {
            defects.push(RecordDefect::MissingCreatedAt);
            Utc::now()
        }
    };

    if !defects.is_empty() {
        debug!(%id, ?defects, "search hit decoded with defaults");
    }

    Some(KnowledgeItem {
        id,
        title,
        text,
        tags,
        source,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample_item() -> KnowledgeItem {
        KnowledgeItem {
            id: "abc".into(),
            title: "T".into(),
            text: "hello world".into(),
            tags: vec!["x".into()],
            source: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn encode_carries_every_field() {
        let record = encode_item(&sample_item(), vec![0.1, 0.2, 0.3]);
        assert_eq!(record.id, "abc");
        assert_eq!(record.vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(record.payload["title"], "T");
        assert_eq!(record.payload["text"], "hello world");
        assert_eq!(record.payload["tags"], json!(["x"]));
        assert_eq!(record.payload["source"], Value::Null);
        assert_eq!(record.payload["created_at"], "2024-05-01T12:30:00.000000Z");
    }

    #[test]
    fn encode_then_decode_keeps_fields() {
        let item = sample_item();
        let record = encode_item(&item, vec![1.0]);
        let decoded = decode_hit(&json!(record.id), Some(&record.payload)).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn empty_payload_gets_defaults() {
        let before = Utc::now();
        let item = decode_hit(&json!("id-1"), None).unwrap();
        assert_eq!(item.title, DEFAULT_TITLE);
        assert_eq!(item.text, "");
        assert!(item.tags.is_empty());
        assert_eq!(item.source, None);
        assert!(item.created_at >= before);
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let payload = object(json!({"title": "A", "created_at": "yesterday-ish"}));
        let item = decode_hit(&json!("id-2"), Some(&payload)).unwrap();
        assert_eq!(item.title, "A");
        assert!(item.created_at >= before);
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let payload = object(json!({"created_at": "2024-01-02T03:04:05.123456"}));
        let item = decode_hit(&json!("id-3"), Some(&payload)).unwrap();
        assert_eq!(
            item.created_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
                + chrono::Duration::microseconds(123_456)
        );
    }

    #[test]
    fn offset_timestamp_is_normalized() {
        let payload = object(json!({"created_at": "2024-01-02T05:04:05+02:00"}));
        let item = decode_hit(&json!("id-4"), Some(&payload)).unwrap();
        assert_eq!(item.created_at, Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn non_string_tags_are_dropped() {
        let payload = object(json!({"tags": ["a", 3, null, "b"], "source": 7}));
        let item = decode_hit(&json!("id-5"), Some(&payload)).unwrap();
        assert_eq!(item.tags, vec!["a", "b"]);
        assert_eq!(item.source, None);
    }

    #[test]
    fn integer_id_is_accepted() {
        let item = decode_hit(&json!(42), None).unwrap();
        assert_eq!(item.id, "42");
    }

    #[test]
    fn unusable_id_skips_record() {
        assert!(decode_hit(&Value::Null, None).is_none());
        assert!(decode_hit(&json!(""), None).is_none());
        assert!(decode_hit(&json!({"uuid": "x"}), None).is_none());
    }
}
