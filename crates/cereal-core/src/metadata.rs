use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CerealError, CerealResult};

/// Version string written into every metadata record.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metadata record embedded in a document in place of an externalized value.
///
/// This is persisted inside `model.json` and must stay backward-compatible:
/// field names are the wire format. `object_path` is always relative to the
/// base path of the context in effect at read time, so a document directory
/// can be relocated wholesale between storage backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactMeta {
    /// Version of the engine that wrote the record.
    pub cereal_version: String,
    /// Symbolic reference to the writer that produced the artifact.
    pub cereal_writer: String,
    /// Symbolic reference to the reader to use on load.
    pub cereal_reader: String,
    /// Artifact path, relative to the context base path.
    pub object_path: String,
}

impl ArtifactMeta {
    /// Check the record invariant: every field present and non-empty.
    pub fn validate(&self) -> CerealResult<()> {
        for (field, value) in [
            ("cereal_version", &self.cereal_version),
            ("cereal_writer", &self.cereal_writer),
            ("cereal_reader", &self.cereal_reader),
            ("object_path", &self.object_path),
        ] {
            if value.is_empty() {
                return Err(CerealError::InvalidMetadata(format!(
                    "field {field:?} is empty"
                )));
            }
        }
        Ok(())
    }

    /// Interpret an in-memory value as a validated metadata record.
    ///
    /// Accepts the two encodings a field hook may see: a structured map, or
    /// a JSON text string containing one. Returns `None` when the value is
    /// not a metadata record at all (the caller's literal-value fallback),
    /// and `Err` only when it matches the shape but violates the invariant.
    pub fn interpret(value: &Value) -> CerealResult<Option<Self>> {
        let parsed: Option<Self> = match value {
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            Value::String(text) => serde_json::from_str(text).ok(),
            _ => None,
        };
        match parsed {
            Some(meta) => {
                meta.validate()?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }
}

/// JSON-schema description of the metadata record, reported for
/// externalized fields in generated document schemas.
pub fn meta_schema() -> Value {
    json!({
        "title": "ArtifactMeta",
        "description": "Out-of-band artifact reference.",
        "type": "object",
        "properties": {
            "cereal_version": {"type": "string"},
            "cereal_writer": {"type": "string"},
            "cereal_reader": {"type": "string"},
            "object_path": {"type": "string"},
        },
        "required": ["cereal_version", "cereal_writer", "cereal_reader", "object_path"],
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArtifactMeta {
        ArtifactMeta {
            cereal_version: PROTOCOL_VERSION.to_string(),
            cereal_writer: "bytes.write".to_string(),
            cereal_reader: "bytes.read".to_string(),
            object_path: "0f2e7c".to_string(),
        }
    }

    #[test]
    fn wire_keys_are_stable() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["cereal_version", "cereal_writer", "cereal_reader", "object_path"]
        );
    }

    #[test]
    fn interpret_structured_form() {
        let value = serde_json::to_value(sample()).unwrap();
        let meta = ArtifactMeta::interpret(&value).unwrap().unwrap();
        assert_eq!(meta, sample());
    }

    #[test]
    fn interpret_json_text_form() {
        let text = serde_json::to_string(&sample()).unwrap();
        let meta = ArtifactMeta::interpret(&Value::String(text)).unwrap().unwrap();
        assert_eq!(meta, sample());
    }

    #[test]
    fn interpret_rejects_unknown_fields() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["extra"] = json!(1);
        // Not a metadata record; falls back to literal handling.
        assert!(ArtifactMeta::interpret(&value).unwrap().is_none());
    }

    #[test]
    fn interpret_non_meta_value_is_none() {
        assert!(ArtifactMeta::interpret(&json!(42)).unwrap().is_none());
        assert!(ArtifactMeta::interpret(&json!({"a": 1})).unwrap().is_none());
        assert!(ArtifactMeta::interpret(&json!("plain string")).unwrap().is_none());
    }

    #[test]
    fn empty_field_fails_validation() {
        let mut meta = sample();
        meta.object_path.clear();
        assert!(meta.validate().is_err());
        let value = serde_json::to_value(meta).unwrap();
        assert!(ArtifactMeta::interpret(&value).is_err());
    }
}
