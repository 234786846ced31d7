//! Payload schema for indexed clause vectors

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{ListValue, Struct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Payload key holding the owner partition
pub const NAMESPACE_KEY: &str = "namespace";

/// Payload key holding the `{document_id}_{chunk_index}` id
pub const VECTOR_ID_KEY: &str = "vector_id";

/// Open key-value metadata attached to a vector
///
/// Recognized keys: `user_id`, `document_id`, `filename` (strings) and
/// `chunk_index` (integer). Any other key is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorMetadata(BTreeMap<String, Value>);

impl VectorMetadata {
    pub const USER_ID: &'static str = "user_id";
    pub const DOCUMENT_ID: &'static str = "document_id";
    pub const FILENAME: &'static str = "filename";
    pub const CHUNK_INDEX: &'static str = "chunk_index";

    /// Metadata for one document chunk with every recognized key set
    pub fn for_chunk(user_id: &str, document_id: &str, filename: &str, chunk_index: usize) -> Self {
        let mut meta = Self::default();
        meta.insert(Self::USER_ID, Value::from(user_id));
        meta.insert(Self::DOCUMENT_ID, Value::from(document_id));
        meta.insert(Self::FILENAME, Value::from(filename));
        meta.insert(Self::CHUNK_INDEX, Value::from(chunk_index as u64));
        meta
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get_str(Self::USER_ID)
    }

    pub fn document_id(&self) -> Option<&str> {
        self.get_str(Self::DOCUMENT_ID)
    }

    pub fn filename(&self) -> Option<&str> {
        self.get_str(Self::FILENAME)
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.0
            .get(Self::CHUNK_INDEX)
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }

    /// Qdrant payload for this metadata plus the partition and id keys
    pub(crate) fn to_qdrant_payload(
        &self,
        namespace: &str,
        vector_id: &str,
    ) -> HashMap<String, QdrantValue> {
        let mut map: HashMap<String, QdrantValue> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
            .collect();
        map.insert(NAMESPACE_KEY.to_string(), string_to_qdrant(namespace));
        map.insert(VECTOR_ID_KEY.to_string(), string_to_qdrant(vector_id));
        map
    }
}

impl From<Map<String, Value>> for VectorMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// One vector to upsert
#[derive(Debug, Clone)]
pub struct IndexItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// One similarity match
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Equality conditions over metadata keys, all of which must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorFilter {
    conditions: Vec<(String, String)>,
}

impl VectorFilter {
    /// Every vector belonging to one document
    pub fn document(document_id: &str) -> Self {
        Self::default().and(VectorMetadata::DOCUMENT_ID, document_id)
    }

    pub fn and(mut self, key: &str, value: &str) -> Self {
        self.conditions.push((key.to_string(), value.to_string()));
        self
    }

    pub fn conditions(&self) -> &[(String, String)] {
        &self.conditions
    }

    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.get_str(key) == Some(value.as_str()))
    }
}

fn string_to_qdrant(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

/// Convert serde_json Value to Qdrant value
pub(crate) fn json_to_qdrant_value(v: &Value) -> QdrantValue {
    let kind = match v {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(json_to_qdrant_value).collect(),
        }),
        Value::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

/// Convert Qdrant value to serde_json Value
pub(crate) fn json_from_qdrant_value(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
