//! Mapping between profile records and Firestore REST documents.
//!
//! Firestore wraps every field in a typed value (`{"stringValue": "x"}`,
//! `{"integerValue": "42"}`, ...). Only the value kinds a profile uses are
//! modelled; fields of other kinds are ignored on read.

use crate::{ProfilePatch, ProfileRecord, Role, StoreError, StoreResult, INITIAL_PASSWORD_VERSION};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

pub(crate) type Fields = Map<String, serde_json::Value>;

/// A typed Firestore value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum Value {
    NullValue(()),
    BooleanValue(bool),
    /// int64, transported as a decimal string.
    IntegerValue(String),
    DoubleValue(f64),
    StringValue(String),
    TimestampValue(String),
}

impl Value {
    fn string(value: impl Into<String>) -> Self {
        Value::StringValue(value.into())
    }

    fn integer(value: impl ToString) -> Self {
        Value::IntegerValue(value.to_string())
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(d) if d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }

    fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::StringValue(s) | Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn is_null(&self) -> bool {
        matches!(self, Value::NullValue(()))
    }
}

/// A document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl Document {
    /// Last path segment of the document name.
    pub fn key(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    fn value(&self, field: &str) -> Option<Value> {
        let raw = self.fields.get(field)?;
        serde_json::from_value::<Value>(raw.clone()).ok()
    }
}

/// Page of a collection listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentPage {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Expiry dates are stored as ISO-8601 strings with millisecond precision.
fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn insert(fields: &mut Fields, name: &str, value: Value) -> StoreResult<()> {
    fields.insert(name.to_string(), serde_json::to_value(value)?);
    Ok(())
}

/// Encode every field of a record. Unset optional fields are left out.
pub(crate) fn encode_record(record: &ProfileRecord) -> StoreResult<Fields> {
    let mut fields = Fields::new();
    insert(&mut fields, "uid", Value::string(&record.id))?;
    insert(&mut fields, "email", Value::string(&record.address))?;
    insert(&mut fields, "role", Value::string(record.role.as_str()))?;
    insert(&mut fields, "createdAt", Value::integer(record.created_at))?;
    insert(&mut fields, "passwordVersion", Value::integer(record.password_version))?;
    insert(&mut fields, "isDisabled", Value::BooleanValue(record.is_disabled))?;
    if let Some(expiry) = record.expiry_date {
        insert(&mut fields, "expiryDate", Value::string(format_instant(expiry)))?;
    }
    if let Some(note) = &record.note {
        insert(&mut fields, "note", Value::string(note))?;
    }
    Ok(fields)
}

/// Encode the fields a patch sets. Fields the patch clears are left out of
/// the body; listing them in the update mask removes them.
pub(crate) fn encode_patch(patch: &ProfilePatch) -> StoreResult<Fields> {
    let mut fields = Fields::new();
    if let Some(role) = patch.role {
        insert(&mut fields, "role", Value::string(role.as_str()))?;
    }
    if let Some(version) = patch.password_version {
        insert(&mut fields, "passwordVersion", Value::integer(version))?;
    }
    if let Some(disabled) = patch.is_disabled {
        insert(&mut fields, "isDisabled", Value::BooleanValue(disabled))?;
    }
    if let Some(Some(expiry)) = patch.expiry_date {
        insert(&mut fields, "expiryDate", Value::string(format_instant(expiry)))?;
    }
    if let Some(Some(note)) = &patch.note {
        insert(&mut fields, "note", Value::string(note))?;
    }
    Ok(fields)
}

/// Decode a document into a profile record.
///
/// Missing `passwordVersion` and `isDisabled` take their defaults; a missing
/// `uid` falls back to the document key. Explicit nulls count as absent.
pub(crate) fn decode_document(document: &Document) -> StoreResult<ProfileRecord> {
    let malformed = |field: &str| {
        StoreError::Codec(format!("{}: missing or invalid `{}`", document.name, field))
    };
    let present = |field: &str| document.value(field).filter(|value| !value.is_null());

    let id = present("uid")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| document.key().to_string());
    let address = present("email")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| malformed("email"))?;
    let role = present("role")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<Role>().ok()))
        .ok_or_else(|| malformed("role"))?;
    let created_at = match present("createdAt") {
        Some(value) => value.as_i64().ok_or_else(|| malformed("createdAt"))?,
        None => 0,
    };
    let password_version = match present("passwordVersion") {
        Some(value) => value
            .as_i64()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| malformed("passwordVersion"))?,
        None => INITIAL_PASSWORD_VERSION,
    };
    let is_disabled = match present("isDisabled") {
        Some(value) => value.as_bool().ok_or_else(|| malformed("isDisabled"))?,
        None => false,
    };
    let expiry_date = match present("expiryDate") {
        Some(value) => Some(value.as_instant().ok_or_else(|| malformed("expiryDate"))?),
        None => None,
    };
    let note = present("note").and_then(|v| v.as_str().map(str::to_string));

    Ok(ProfileRecord {
        id,
        address,
        role,
        created_at,
        password_version,
        is_disabled,
        expiry_date,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn document(fields: serde_json::Value) -> Document {
        serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/uid-9",
            "fields": fields,
            "updateTime": "2026-01-01T00:00:00.000000Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_value_wire_shape() {
        assert_eq!(
            serde_json::to_value(Value::string("x")).unwrap(),
            json!({"stringValue": "x"})
        );
        assert_eq!(
            serde_json::to_value(Value::integer(42)).unwrap(),
            json!({"integerValue": "42"})
        );
        assert_eq!(
            serde_json::to_value(Value::NullValue(())).unwrap(),
            json!({"nullValue": null})
        );
    }

    #[test]
    fn test_decode_full_document() {
        let doc = document(json!({
            "uid": {"stringValue": "uid-9"},
            "email": {"stringValue": "member01@render.ai"},
            "role": {"stringValue": "MEMBER"},
            "createdAt": {"integerValue": "1767225600000"},
            "passwordVersion": {"integerValue": "3"},
            "isDisabled": {"booleanValue": true},
            "expiryDate": {"stringValue": "2026-03-01T00:00:00.000Z"},
            "note": {"stringValue": "trial"}
        }));

        let record = decode_document(&doc).unwrap();
        assert_eq!(record.id, "uid-9");
        assert_eq!(record.address, "member01@render.ai");
        assert_eq!(record.role, Role::Member);
        assert_eq!(record.created_at, 1_767_225_600_000);
        assert_eq!(record.password_version, 3);
        assert!(record.is_disabled);
        assert_eq!(
            record.expiry_date,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(record.note.as_deref(), Some("trial"));
    }

    #[test]
    fn test_decode_applies_defaults() {
        let doc = document(json!({
            "email": {"stringValue": "old@render.ai"},
            "role": {"stringValue": "ADMIN"},
            "createdAt": {"doubleValue": 1700000000000.0},
            "expiryDate": {"nullValue": null},
            "tags": {"arrayValue": {"values": []}}
        }));

        let record = decode_document(&doc).unwrap();
        assert_eq!(record.id, "uid-9");
        assert_eq!(record.password_version, INITIAL_PASSWORD_VERSION);
        assert!(!record.is_disabled);
        assert!(record.expiry_date.is_none());
        assert_eq!(record.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_decode_rejects_missing_role() {
        let doc = document(json!({"email": {"stringValue": "x@render.ai"}}));
        assert!(matches!(decode_document(&doc), Err(StoreError::Codec(_))));
    }

    #[test]
    fn test_encode_then_decode_preserves_record() {
        let record = ProfileRecord::new(
            "uid-9",
            "member01@render.ai",
            Role::Member,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_expiry(Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()))
        .with_note(Some("vip".into()));

        let fields = encode_record(&record).unwrap();
        assert_eq!(fields["expiryDate"], json!({"stringValue": "2026-02-01T00:00:00.000Z"}));

        let doc = Document {
            name: "projects/p/databases/(default)/documents/users/uid-9".into(),
            fields,
            update_time: None,
        };
        assert_eq!(decode_document(&doc).unwrap(), record);
    }

    #[test]
    fn test_encode_patch_omits_cleared_fields() {
        let patch = ProfilePatch {
            is_disabled: Some(true),
            expiry_date: Some(None),
            ..ProfilePatch::default()
        };
        let fields = encode_patch(&patch).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["isDisabled"], json!({"booleanValue": true}));
        assert_eq!(patch.field_paths(), vec!["isDisabled", "expiryDate"]);
    }
}
