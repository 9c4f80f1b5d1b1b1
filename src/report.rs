use anyhow::{Result, anyhow};
use bson::{Bson, Document, oid::ObjectId};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::util::{format_datetime, rfc3339};

pub const ID_FIELD: &str = "_id";

pub const TEST_NUMBER: &str = "Test #";
pub const BUILD_NUMBER: &str = "Build #";
pub const CATEGORY: &str = "Category";
pub const TEST_CASE: &str = "Test Case";
pub const EXPECTED_RESULT: &str = "Expected Result";
pub const ACTUAL_RESULT: &str = "Actual Result";
pub const REPEATABLE: &str = "Repeatable?";
pub const BLOCKER: &str = "Blocker?";
pub const TEST_OWNER: &str = "Test Owner";

/// Keys every stored report is expected to carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    TEST_NUMBER,
    BUILD_NUMBER,
    CATEGORY,
    TEST_CASE,
    EXPECTED_RESULT,
    ACTUAL_RESULT,
    REPEATABLE,
    BLOCKER,
    TEST_OWNER,
];

/// A single cell as it is stored in the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Always UTC.
    DateTime(OffsetDateTime),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Rendering used for CSV cells.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(true) => "True".into(),
            FieldValue::Bool(false) => "False".into(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::DateTime(dt) => format_datetime(*dt),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => Value::String(rfc3339(*dt)),
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            FieldValue::Null => Bson::Null,
            FieldValue::Bool(b) => Bson::Boolean(*b),
            FieldValue::Int(i) => Bson::Int64(*i),
            FieldValue::Float(f) => Bson::Double(*f),
            FieldValue::Text(s) => Bson::String(s.clone()),
            FieldValue::DateTime(dt) => {
                let millis = dt.unix_timestamp_nanos() / 1_000_000;
                Bson::DateTime(bson::DateTime::from_millis(millis as i64))
            }
        }
    }

    pub fn from_bson(value: Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => FieldValue::Null,
            Bson::Boolean(b) => FieldValue::Bool(b),
            Bson::Int32(i) => FieldValue::Int(i as i64),
            Bson::Int64(i) => FieldValue::Int(i),
            Bson::Double(f) => FieldValue::Float(f),
            Bson::String(s) => FieldValue::Text(s),
            Bson::ObjectId(oid) => FieldValue::Text(oid.to_hex()),
            Bson::DateTime(dt) => {
                let nanos = dt.timestamp_millis() as i128 * 1_000_000;
                match OffsetDateTime::from_unix_timestamp_nanos(nanos) {
                    Ok(odt) => FieldValue::DateTime(odt),
                    Err(_) => FieldValue::Text(dt.to_string()),
                }
            }
            other => FieldValue::Text(other.into_relaxed_extjson().to_string()),
        }
    }
}

/// One test-report row.
///
/// `None` on a known field means the key is absent from the stored document,
/// which is different from a present-but-null value (`Some(FieldValue::Null)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestReport {
    pub id: Option<ObjectId>,
    pub test_number: Option<FieldValue>,
    pub build_number: Option<FieldValue>,
    pub category: Option<FieldValue>,
    pub test_case: Option<FieldValue>,
    pub expected_result: Option<FieldValue>,
    pub actual_result: Option<FieldValue>,
    pub repeatable: Option<FieldValue>,
    pub blocker: Option<FieldValue>,
    pub test_owner: Option<FieldValue>,
    /// Columns outside the known set, in insertion order.
    pub extra: Vec<(String, FieldValue)>,
    /// Every key passed to `set`, in first-set order. Drives `entries`, so a
    /// document keeps the column order of the file it came from.
    pub key_order: Vec<String>,
}

impl TestReport {
    fn known(&self, key: &str) -> Option<&Option<FieldValue>> {
        let slot = match key {
            TEST_NUMBER => &self.test_number,
            BUILD_NUMBER => &self.build_number,
            CATEGORY => &self.category,
            TEST_CASE => &self.test_case,
            EXPECTED_RESULT => &self.expected_result,
            ACTUAL_RESULT => &self.actual_result,
            REPEATABLE => &self.repeatable,
            BLOCKER => &self.blocker,
            TEST_OWNER => &self.test_owner,
            _ => return None,
        };
        Some(slot)
    }

    fn known_mut(&mut self, key: &str) -> Option<&mut Option<FieldValue>> {
        let slot = match key {
            TEST_NUMBER => &mut self.test_number,
            BUILD_NUMBER => &mut self.build_number,
            CATEGORY => &mut self.category,
            TEST_CASE => &mut self.test_case,
            EXPECTED_RESULT => &mut self.expected_result,
            ACTUAL_RESULT => &mut self.actual_result,
            REPEATABLE => &mut self.repeatable,
            BLOCKER => &mut self.blocker,
            TEST_OWNER => &mut self.test_owner,
            _ => return None,
        };
        Some(slot)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        match self.known(key) {
            Some(slot) => slot.as_ref(),
            None => self.extra.iter().find(|(k, _)| k == key).map(|(_, v)| v),
        }
    }

    pub fn set(&mut self, key: &str, value: FieldValue) {
        if !self.key_order.iter().any(|k| k == key) {
            self.key_order.push(key.to_string());
        }
        if let Some(slot) = self.known_mut(key) {
            *slot = Some(value);
            return;
        }
        match self.extra.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.extra.push((key.to_string(), value)),
        }
    }

    /// Builder-style `set`, handy when assembling fixtures.
    pub fn with(mut self, key: &str, value: FieldValue) -> Self {
        self.set(key, value);
        self
    }

    /// Present fields (without `_id`) in `key_order`. Fields filled in
    /// directly rather than through `set` follow: known keys, then extras.
    pub fn entries(&self) -> Vec<(&str, &FieldValue)> {
        let mut keys: Vec<&str> = self.key_order.iter().map(String::as_str).collect();
        for k in REQUIRED_FIELDS {
            keys.push(k);
        }
        for (k, _) in &self.extra {
            keys.push(k);
        }

        let mut out: Vec<(&str, &FieldValue)> = Vec::new();
        for key in keys {
            if out.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if let Some(v) = self.get(key) {
                out.push((key, v));
            }
        }
        out
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if let Some(id) = self.id {
            doc.insert(ID_FIELD, id);
        }
        for (k, v) in self.entries() {
            doc.insert(k, v.to_bson());
        }
        doc
    }

    pub fn from_document(doc: Document) -> Result<Self> {
        let mut report = TestReport::default();
        for (k, v) in doc {
            if k == ID_FIELD {
                match v {
                    Bson::ObjectId(oid) => report.id = Some(oid),
                    other => return Err(anyhow!("unsupported _id type: {other}")),
                }
                continue;
            }
            report.set(&k, FieldValue::from_bson(v));
        }
        Ok(report)
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = self.id {
            map.insert(ID_FIELD.into(), Value::String(id.to_hex()));
        }
        for (k, v) in self.entries() {
            map.insert(k.into(), v.to_json());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn set_routes_known_and_extra_keys() {
        let r = TestReport::default()
            .with(TEST_OWNER, FieldValue::text("alice"))
            .with("Notes", FieldValue::text("flaky"))
            .with("Notes", FieldValue::text("fixed"));
        assert_eq!(r.test_owner, Some(FieldValue::text("alice")));
        assert_eq!(r.extra, vec![("Notes".to_string(), FieldValue::text("fixed"))]);
        assert_eq!(r.get("Notes"), Some(&FieldValue::text("fixed")));
        assert_eq!(r.get(BLOCKER), None);
    }

    #[test]
    fn entries_follow_set_order() {
        let r = TestReport::default()
            .with("Notes", FieldValue::text("n"))
            .with(TEST_OWNER, FieldValue::text("alice"))
            .with(TEST_NUMBER, FieldValue::Int(1))
            .with(TEST_OWNER, FieldValue::text("bob"));
        let keys: Vec<&str> = r.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Notes", TEST_OWNER, TEST_NUMBER]);

        let back = TestReport::from_document(r.to_document()).unwrap();
        let keys: Vec<&str> = back.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Notes", TEST_OWNER, TEST_NUMBER]);
    }

    #[test]
    fn directly_filled_fields_still_listed() {
        let r = TestReport {
            blocker: Some(FieldValue::text("Yes")),
            ..Default::default()
        }
        .with("Notes", FieldValue::text("n"));
        let keys: Vec<&str> = r.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Notes", BLOCKER]);
    }

    #[test]
    fn document_keeps_absent_and_null_apart() {
        let r = TestReport {
            id: Some(ObjectId::new()),
            ..Default::default()
        }
        .with(CATEGORY, FieldValue::Null)
        .with(BUILD_NUMBER, FieldValue::DateTime(datetime!(2024-07-04 10:30 UTC)));

        let back = TestReport::from_document(r.to_document()).unwrap();
        assert_eq!(back, r);
        assert_eq!(back.category, Some(FieldValue::Null));
        assert_eq!(back.test_owner, None);
    }

    #[test]
    fn foreign_bson_types_become_text() {
        let doc = bson::doc! { "Tags": ["a", "b"], "Test #": 3_i32 };
        let r = TestReport::from_document(doc).unwrap();
        assert_eq!(r.test_number, Some(FieldValue::Int(3)));
        assert!(matches!(r.get("Tags"), Some(FieldValue::Text(_))));
    }

    #[test]
    fn non_object_id_is_rejected() {
        let doc = bson::doc! { "_id": "abc" };
        assert!(TestReport::from_document(doc).is_err());
    }
}
