//! JSON Schema documents (the draft-07 / 2020-12 subset that configuration
//! schemas use).

use super::{Check, Schema, SchemaAdapter, SchemaNode, union_of as union};
use crate::error::{ErrorCode, Result, ZenfigError};
use serde_json::{Map, Value};

/// Nesting limit for `$ref` chains; recursive schemas cannot describe a
/// finite key space.
const MAX_REF_DEPTH: usize = 32;

pub struct JsonSchemaAdapter;

impl SchemaAdapter for JsonSchemaAdapter {
    fn name(&self) -> &'static str {
        "json-schema"
    }

    fn is_schema(&self, source: &str) -> bool {
        match serde_json::from_str::<Value>(source) {
            Ok(Value::Object(doc)) => {
                doc.get("type").and_then(Value::as_str) == Some("object")
                    || (doc.get("type").is_none() && doc.contains_key("properties"))
            }
            _ => false,
        }
    }

    fn load(&self, source: &str) -> Result<Schema> {
        let doc: Value = serde_json::from_str(source)?;
        let root = Lowering { doc: &doc }.lower(&doc, 0)?;
        Schema::new(root)
    }
}

impl JsonSchemaAdapter {
    /// Lower an already-parsed document.
    pub fn load_value(&self, doc: &Value) -> Result<Schema> {
        Schema::new(Lowering { doc }.lower(doc, 0)?)
    }
}

struct Lowering<'d> {
    doc: &'d Value,
}

impl Lowering<'_> {
    fn lower(&self, node: &Value, depth: usize) -> Result<SchemaNode> {
        let obj = match node {
            Value::Bool(_) => return Ok(SchemaNode::Any),
            Value::Object(obj) => obj,
            other => return Err(invalid(format!("Expected a schema object, found {}", other))),
        };

        let mut lowered = self.lower_base(obj, depth)?;
        for check in checks(obj) {
            lowered = lowered.refine(check);
        }
        if let Some(default) = obj.get("default") {
            lowered = lowered.with_default(default.clone());
        }
        Ok(lowered)
    }

    fn lower_base(&self, obj: &Map<String, Value>, depth: usize) -> Result<SchemaNode> {
        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return self.lower_ref(reference, depth);
        }
        if let Some(constant) = obj.get("const") {
            return Ok(SchemaNode::Literal(constant.clone()));
        }
        if let Some(Value::Array(options)) = obj.get("enum") {
            let strings: Option<Vec<String>> =
                options.iter().map(|v| v.as_str().map(str::to_string)).collect();
            return Ok(match strings {
                Some(strings) => SchemaNode::Enum(strings),
                None => union(options.iter().cloned().map(SchemaNode::Literal).collect()),
            });
        }
        for keyword in ["anyOf", "oneOf"] {
            if let Some(Value::Array(branches)) = obj.get(keyword) {
                let branches = branches
                    .iter()
                    .map(|b| self.lower(b, depth))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(union(branches));
            }
        }
        if let Some(Value::Array(parts)) = obj.get("allOf") {
            return match parts.as_slice() {
                [single] => self.lower(single, depth),
                _ => Err(invalid("allOf with more than one member is not supported")),
            };
        }

        match obj.get("type") {
            Some(Value::String(kind)) => self.lower_type(kind, obj, depth),
            Some(Value::Array(kinds)) => {
                let mut branches = Vec::new();
                let mut nullable = false;
                for kind in kinds {
                    match kind.as_str() {
                        Some("null") => nullable = true,
                        Some(kind) => branches.push(self.lower_type(kind, obj, depth)?),
                        None => return Err(invalid("'type' entries must be strings")),
                    }
                }
                if nullable {
                    branches.push(SchemaNode::Null);
                }
                Ok(union(branches))
            }
            Some(other) => Err(invalid(format!("Invalid 'type': {}", other))),
            None if obj.contains_key("properties") => self.lower_type("object", obj, depth),
            None => Ok(SchemaNode::Any),
        }
    }

    fn lower_type(&self, kind: &str, obj: &Map<String, Value>, depth: usize) -> Result<SchemaNode> {
        match kind {
            "object" => self.lower_object(obj, depth),
            "array" => {
                let items = match obj.get("items") {
                    Some(items @ (Value::Object(_) | Value::Bool(_))) => self.lower(items, depth)?,
                    Some(Value::Array(tuple)) => union(
                        tuple
                            .iter()
                            .map(|t| self.lower(t, depth))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    _ => SchemaNode::Any,
                };
                Ok(SchemaNode::Array(Box::new(items)))
            }
            "string" => Ok(SchemaNode::String),
            "integer" => Ok(SchemaNode::integer()),
            "number" => Ok(SchemaNode::Number),
            "boolean" => Ok(SchemaNode::Boolean),
            "null" => Ok(SchemaNode::Null),
            other => Err(invalid(format!("Unsupported type '{}'", other))),
        }
    }

    fn lower_object(&self, obj: &Map<String, Value>, depth: usize) -> Result<SchemaNode> {
        let properties = obj.get("properties").and_then(Value::as_object);
        let additional = obj.get("additionalProperties").filter(|v| v.is_object());

        match (properties, additional) {
            (None, Some(values)) => Ok(SchemaNode::Record(Box::new(self.lower(values, depth)?))),
            (properties, _) => {
                let required: Vec<&str> = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|r| r.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let mut lowered = Vec::new();
                for (name, schema) in properties.into_iter().flatten() {
                    let mut node = self.lower(schema, depth)?;
                    if !required.contains(&name.as_str()) {
                        node = node.optional();
                    }
                    lowered.push((name.clone(), node));
                }
                Ok(SchemaNode::object(lowered))
            }
        }
    }

    fn lower_ref(&self, reference: &str, depth: usize) -> Result<SchemaNode> {
        if depth >= MAX_REF_DEPTH {
            return Err(invalid(format!(
                "$ref '{}' nests too deeply; recursive schemas are not supported",
                reference
            )));
        }
        let target = ["#/definitions/", "#/$defs/"]
            .iter()
            .find_map(|prefix| {
                let name = reference.strip_prefix(prefix)?;
                let section = &prefix[2..prefix.len() - 1];
                self.doc.get(section)?.get(name)
            })
            .ok_or_else(|| invalid(format!("Cannot resolve $ref '{}'", reference)))?;
        self.lower(target, depth + 1)
    }
}

fn checks(obj: &Map<String, Value>) -> Vec<Check> {
    let mut out = Vec::new();
    let number = |key: &str| obj.get(key).and_then(Value::as_f64);
    let count = |key: &str| obj.get(key).and_then(Value::as_u64).map(|n| n as usize);

    if let Some(step) = number("multipleOf") {
        if step == 1.0 {
            out.push(Check::Int);
        } else {
            out.push(Check::MultipleOf(step));
        }
    }
    if let Some(min) = number("minimum") {
        out.push(Check::Minimum(min));
    }
    if let Some(max) = number("maximum") {
        out.push(Check::Maximum(max));
    }
    if let Some(min) = number("exclusiveMinimum") {
        out.push(Check::ExclusiveMinimum(min));
    }
    if let Some(max) = number("exclusiveMaximum") {
        out.push(Check::ExclusiveMaximum(max));
    }
    if let Some(min) = count("minLength") {
        out.push(Check::MinLength(min));
    }
    if let Some(max) = count("maxLength") {
        out.push(Check::MaxLength(max));
    }
    if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
        out.push(Check::Pattern(pattern.to_string()));
    }
    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        out.push(Check::Format(format.to_string()));
    }
    if let Some(min) = count("minItems") {
        out.push(Check::MinItems(min));
    }
    if let Some(max) = count("maxItems") {
        out.push(Check::MaxItems(max));
    }
    out
}

fn invalid(message: impl Into<String>) -> ZenfigError {
    ZenfigError::new(
        ErrorCode::InvalidFormat,
        format!("Invalid JSON Schema: {}", message.into()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::describe;
    use serde_json::json;

    const SCHEMA: &str = r##"{
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "database": {
                "type": "object",
                "properties": {
                    "host": { "type": "string", "default": "localhost" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
                    "replicas": { "type": "array", "items": { "type": "string", "format": "hostname" } }
                },
                "required": ["host", "port"]
            },
            "api": { "$ref": "#/definitions/Api" },
            "stage": { "const": "prod" },
            "level": { "enum": ["debug", "info"] },
            "timeout": { "type": ["integer", "null"] },
            "limits": { "type": "object", "additionalProperties": { "type": "number" } }
        },
        "required": ["database", "api"],
        "definitions": {
            "Api": {
                "type": "object",
                "properties": {
                    "maxRetries": { "type": "number", "multipleOf": 1, "default": 3 }
                }
            }
        }
    }"##;

    #[test]
    fn test_is_schema() {
        assert!(JsonSchemaAdapter.is_schema(SCHEMA));
        assert!(JsonSchemaAdapter.is_schema(r#"{"properties": {}}"#));
        assert!(!JsonSchemaAdapter.is_schema(r#"{"type": "string"}"#));
        assert!(!JsonSchemaAdapter.is_schema("[database]\nhost = 1"));
    }

    #[test]
    fn test_lowering() {
        let adapter = JsonSchemaAdapter;
        let schema = adapter.load(SCHEMA).unwrap();

        let port = adapter.resolve_path(&schema, "database.port").unwrap();
        assert_eq!(describe(port.schema), "integer");
        assert!(!port.schema.normalize().optional);
        assert_eq!(port.schema.normalize().checks.len(), 3);

        let host = adapter.resolve_path(&schema, "database.host").unwrap();
        assert_eq!(host.schema.normalize().default, Some(&json!("localhost")));

        let replicas = adapter.resolve_path(&schema, "database.replicas").unwrap();
        assert!(replicas.schema.normalize().optional);
        assert_eq!(describe(replicas.schema), "array<string>");

        let retries = adapter.resolve_path(&schema, "api.maxRetries").unwrap();
        assert_eq!(describe(retries.schema), "integer");

        let stage = adapter.resolve_path(&schema, "stage").unwrap();
        assert_eq!(describe(stage.schema), "literal \"prod\"");

        let level = adapter.resolve_path(&schema, "level").unwrap();
        assert_eq!(describe(level.schema), "enum (debug | info)");

        let timeout = adapter.resolve_path(&schema, "timeout").unwrap();
        assert_eq!(describe(timeout.schema), "union (integer | null)");

        let limits = adapter.resolve_path(&schema, "limits").unwrap();
        assert_eq!(describe(limits.schema), "record<string, number>");
    }

    #[test]
    fn test_root_must_be_object() {
        let err = JsonSchemaAdapter.load(r#"{"type": "string"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_unresolvable_ref() {
        let err = JsonSchemaAdapter
            .load(r##"{"type":"object","properties":{"a":{"$ref":"#/definitions/Missing"}}}"##)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_recursive_ref_is_rejected() {
        let err = JsonSchemaAdapter
            .load(
                r##"{"type":"object","properties":{"a":{"$ref":"#/$defs/Node"}},
                    "$defs":{"Node":{"type":"object","properties":{"next":{"$ref":"#/$defs/Node"}}}}}"##,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }
}
