//! Schema declaration and document values.

use crate::error::{Result, SiftError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A document: property name to value.
///
/// A `BTreeMap` keeps property order stable, which keeps snapshots and
/// equality checks deterministic.
pub type Document = BTreeMap<String, Value>;

/// A single document value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Free text, tokenized and indexed.
    String(String),
    /// Stored and validated, not indexed.
    Number(f64),
    /// Stored and validated, not indexed.
    Boolean(bool),
    /// A nested object, validated against a nested schema.
    Nested(Document),
}

impl Value {
    /// Name of the value's type, as used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Nested(_) => "object",
        }
    }

    /// Returns the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Nested(value)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = SiftError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
            serde_json::Value::Number(n) => {
                n.as_f64()
                    .map(Value::Number)
                    .ok_or_else(|| SiftError::SchemaMismatch {
                        field: String::new(),
                        expected: "number".to_string(),
                        found: n.to_string(),
                    })
            }
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (key, value) in map {
                    doc.insert(key, Value::try_from(value)?);
                }
                Ok(Value::Nested(doc))
            }
            other => Err(SiftError::SchemaMismatch {
                field: String::new(),
                expected: "string, number, boolean or object".to_string(),
                found: json_kind(&other).to_string(),
            }),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Object(_) => "object",
    }
}

/// Converts a JSON object into a `Document`.
///
/// Arrays and nulls have no field type and are rejected.
pub fn parse_document(value: serde_json::Value) -> Result<Document> {
    match Value::try_from(value)? {
        Value::Nested(doc) => Ok(doc),
        other => Err(SiftError::SchemaMismatch {
            field: String::new(),
            expected: "object".to_string(),
            found: other.kind().to_string(),
        }),
    }
}

/// Looks up a value by dotted path (`author.name`).
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;

    for part in parts {
        match current {
            Value::Nested(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }

    Some(current)
}

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Full-text indexed.
    String,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// Nested object with its own schema.
    Nested(Schema),
}

impl FieldType {
    /// Name of the type, as used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Nested(_) => "object",
        }
    }
}

/// Schema descriptor: field name to declared type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Declared fields.
    pub fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Create a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Checks that every declared property present in `doc` has the declared
    /// type. Missing properties are allowed; undeclared ones are stored but
    /// never indexed.
    ///
    /// Numbers must be finite anywhere in the document, declared or not, since
    /// JSON has no encoding for NaN or infinity.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        check_finite(doc, "")?;
        self.validate_at(doc, "")
    }

    fn validate_at(&self, doc: &Document, prefix: &str) -> Result<()> {
        for (name, field_type) in &self.fields {
            let Some(value) = doc.get(name) else {
                continue;
            };
            let path = join_path(prefix, name);

            match (field_type, value) {
                (FieldType::String, Value::String(_))
                | (FieldType::Number, Value::Number(_))
                | (FieldType::Boolean, Value::Boolean(_)) => {}
                (FieldType::Nested(schema), Value::Nested(inner)) => {
                    schema.validate_at(inner, &path)?;
                }
                (expected, found) => {
                    return Err(SiftError::SchemaMismatch {
                        field: path,
                        expected: expected.name().to_string(),
                        found: found.kind().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Dotted paths of every string property, in sorted order.
    ///
    /// Each of these owns one radix tree in the index.
    pub fn string_properties(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_string_properties("", &mut out);
        out
    }

    fn collect_string_properties(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, field_type) in &self.fields {
            let path = join_path(prefix, name);
            match field_type {
                FieldType::String => out.push(path),
                FieldType::Nested(schema) => schema.collect_string_properties(&path, out),
                _ => {}
            }
        }
    }
}

fn check_finite(doc: &Document, prefix: &str) -> Result<()> {
    for (name, value) in doc {
        match value {
            Value::Number(n) if !n.is_finite() => {
                return Err(SiftError::SchemaMismatch {
                    field: join_path(prefix, name),
                    expected: "finite number".to_string(),
                    found: n.to_string(),
                });
            }
            Value::Nested(inner) => check_finite(inner, &join_path(prefix, name))?,
            _ => {}
        }
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Builder for schemas.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: BTreeMap<String, FieldType>,
}

impl SchemaBuilder {
    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Declare a string field.
    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::String)
    }

    /// Declare a number field.
    pub fn number(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Number)
    }

    /// Declare a boolean field.
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Boolean)
    }

    /// Declare a nested object field.
    pub fn nested(self, name: impl Into<String>, schema: Schema) -> Self {
        self.field(name, FieldType::Nested(schema))
    }

    /// Build the schema.
    pub fn build(self) -> Schema {
        Schema {
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::builder()
            .string("title")
            .number("year")
            .nested("author", Schema::builder().string("name").boolean("alive").build())
            .build()
    }

    #[test]
    fn test_string_properties_are_flattened() {
        assert_eq!(schema().string_properties(), vec!["author.name", "title"]);
    }

    #[test]
    fn test_validate_accepts_partial_documents() {
        let doc = parse_document(json!({ "title": "Dune" })).unwrap();
        assert!(schema().validate(&doc).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_nested_type() {
        let doc = parse_document(json!({
            "title": "Dune",
            "author": { "name": 42 }
        }))
        .unwrap();

        match schema().validate(&doc) {
            Err(SiftError::SchemaMismatch { field, expected, found }) => {
                assert_eq!(field, "author.name");
                assert_eq!(expected, "string");
                assert_eq!(found, "number");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_non_finite_numbers() {
        let doc = Document::from([("year".to_string(), Value::from(f64::NAN))]);
        assert!(matches!(
            schema().validate(&doc),
            Err(SiftError::SchemaMismatch { field, .. }) if field == "year"
        ));

        let mut extra = Document::new();
        extra.insert("title".to_string(), Value::from("Dune"));
        extra.insert(
            "stats".to_string(),
            Value::Nested(Document::from([("ratio".to_string(), Value::from(f64::INFINITY))])),
        );
        assert!(matches!(
            schema().validate(&extra),
            Err(SiftError::SchemaMismatch { field, .. }) if field == "stats.ratio"
        ));
    }

    #[test]
    fn test_parse_document_rejects_arrays() {
        assert!(parse_document(json!({ "tags": ["a", "b"] })).is_err());
        assert!(parse_document(json!("not an object")).is_err());
    }

    #[test]
    fn test_lookup_dotted_path() {
        let doc = parse_document(json!({ "author": { "name": "Frank" } })).unwrap();
        assert_eq!(lookup(&doc, "author.name"), Some(&Value::from("Frank")));
        assert_eq!(lookup(&doc, "author.missing"), None);
        assert_eq!(lookup(&doc, "title"), None);
    }

    #[test]
    fn test_value_roundtrips_through_serde_untagged() {
        let doc = parse_document(json!({ "name": "Jane", "age": 25, "ok": true })).unwrap();
        let text = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(doc, back);
    }
}
