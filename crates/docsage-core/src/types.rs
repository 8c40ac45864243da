//! Content units, index metadata, and retrieval results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    Text,
    ImageDescription,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::ImageDescription => write!(f, "image-description"),
        }
    }
}

/// One atomic piece of extracted knowledge with page provenance.
///
/// `metadata` may hold arbitrary JSON here; the vector index coerces it to
/// [`MetadataValue`]s on insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub kind: ContentKind,
    pub content: String,
    /// 1-based page number.
    pub page: u32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ContentUnit {
    /// Text block of a page. Metadata: `{source, page}`.
    pub fn text(source: &str, page: u32, content: impl Into<String>) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), source.into());
        metadata.insert("page".into(), page.into());
        Self {
            kind: ContentKind::Text,
            content: content.into(),
            page,
            metadata,
        }
    }

    /// Image description, wrapped in a marker so it embeds comparably to prose.
    /// Metadata: `{source, page, image_index}`.
    pub fn image_description(source: &str, page: u32, image_index: usize, description: &str) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), source.into());
        metadata.insert("page".into(), page.into());
        metadata.insert("image_index".into(), image_index.into());
        Self {
            kind: ContentKind::ImageDescription,
            content: format!("[IMAGE DESCRIPTION: {}]", description),
            page,
            metadata,
        }
    }
}

/// A primitive metadata value; the only shapes the index can store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Coerce a JSON value. Non-primitive values (null, arrays, objects)
    /// are stored as their JSON text.
    pub fn coerce(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::String(s) => Self::Str(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            other => Self::Str(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Cleaned metadata as stored in the index.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Coerce a raw metadata object into storable primitives.
pub fn coerce_metadata(raw: &serde_json::Map<String, serde_json::Value>) -> Metadata {
    raw.iter()
        .map(|(k, v)| (k.clone(), MetadataValue::coerce(v)))
        .collect()
}

/// One entry of a retrieval result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// 1-based position in the result set.
    pub rank: usize,
    /// Cosine similarity to the query.
    pub score: f64,
    /// `1 - score`.
    pub distance: f64,
}

impl RetrievedDocument {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(MetadataValue::as_str)
    }

    pub fn page(&self) -> Option<&MetadataValue> {
        self.metadata.get("page")
    }

    pub fn image_index(&self) -> Option<&MetadataValue> {
        self.metadata.get("image_index")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_marker() {
        let unit = ContentUnit::image_description("doc.pdf", 2, 0, "A bar chart");
        assert_eq!(unit.content, "[IMAGE DESCRIPTION: A bar chart]");
        assert_eq!(unit.kind, ContentKind::ImageDescription);
        assert_eq!(unit.metadata["image_index"], json!(0));
        assert_eq!(unit.metadata["page"], json!(2));
    }

    #[test]
    fn test_coerce_metadata() {
        let raw = json!({"page": 3, "tag": ["a", "b"], "score": 0.5, "ok": true, "none": null});
        let meta = coerce_metadata(raw.as_object().unwrap());
        assert_eq!(meta["page"], MetadataValue::Int(3));
        assert_eq!(meta["tag"], MetadataValue::Str(r#"["a","b"]"#.into()));
        assert_eq!(meta["score"], MetadataValue::Float(0.5));
        assert_eq!(meta["ok"], MetadataValue::Bool(true));
        assert_eq!(meta["none"], MetadataValue::Str("null".into()));
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut meta = Metadata::new();
        meta.insert("page".into(), MetadataValue::Int(3));
        meta.insert("source".into(), MetadataValue::Str("a.pdf".into()));
        let encoded = serde_json::to_string(&meta).unwrap();
        assert_eq!(encoded, r#"{"page":3,"source":"a.pdf"}"#);
        let decoded: Metadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, meta);
    }
}
