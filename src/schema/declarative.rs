//! Declarative TOML schemas.
//!
//! Keys are declared as inline tables carrying a `type`; any table without a
//! string `type` is a nested object:
//!
//! ```toml
//! [database]
//! host = { type = "string", default = "localhost", description = "Primary host" }
//! port = { type = "integer", min = 1, max = 65535 }
//! password = { type = "string", required = false, min = 12 }
//!
//! [api]
//! mode = { type = "enum", values = ["fast", "safe"], optional = true }
//! tags = { type = "array", items = "string" }
//! limits = { type = "record", values = { type = "integer", min = 0 } }
//! timeout = { type = "union", variants = ["integer", { type = "literal", value = "none" }] }
//! ```

use super::{Check, Schema, SchemaAdapter, SchemaNode, union_of};
use crate::error::{ErrorCode, Result, ZenfigError};
use crate::tree::number_value;
use serde_json::Value;
use toml::Table;

pub struct DeclarativeSchemaAdapter;

impl SchemaAdapter for DeclarativeSchemaAdapter {
    fn name(&self) -> &'static str {
        "declarative"
    }

    fn is_schema(&self, source: &str) -> bool {
        match toml::from_str::<Table>(source) {
            Ok(table) => !table.is_empty() && declares_a_field(&table),
            Err(_) => false,
        }
    }

    fn load(&self, source: &str) -> Result<Schema> {
        let table: Table = toml::from_str(source)?;
        Schema::new(lower_table(&table, "")?)
    }
}

fn declares_a_field(table: &Table) -> bool {
    table.values().any(|value| match value {
        toml::Value::Table(inner) => is_field(inner) || declares_a_field(inner),
        _ => false,
    })
}

fn is_field(table: &Table) -> bool {
    matches!(table.get("type"), Some(toml::Value::String(_)))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn lower_table(table: &Table, path: &str) -> Result<SchemaNode> {
    let mut properties = Vec::new();
    for (key, value) in table {
        let child_path = join(path, key);
        let node = match value {
            toml::Value::Table(inner) if is_field(inner) => lower_field(inner, &child_path)?,
            toml::Value::Table(inner) => lower_table(inner, &child_path)?,
            _ => {
                return Err(invalid(
                    &child_path,
                    "Expected a field table such as { type = \"string\" } or a nested table",
                ));
            }
        };
        properties.push((key.clone(), node));
    }
    Ok(SchemaNode::object(properties))
}

/// A type reference: either a bare type name or a field table.
fn lower_type_ref(value: &toml::Value, path: &str) -> Result<SchemaNode> {
    match value {
        toml::Value::String(kind) => {
            let mut spec = Table::new();
            spec.insert("type".to_string(), toml::Value::String(kind.clone()));
            lower_field(&spec, path)
        }
        toml::Value::Table(spec) if is_field(spec) => lower_field(spec, path),
        _ => Err(invalid(path, "Expected a type name or a table with a 'type' key")),
    }
}

fn lower_field(spec: &Table, path: &str) -> Result<SchemaNode> {
    let kind = spec
        .get("type")
        .and_then(toml::Value::as_str)
        .ok_or_else(|| invalid(path, "Missing 'type'"))?;

    let base = match kind {
        "string" => SchemaNode::String,
        "integer" => SchemaNode::integer(),
        "number" => SchemaNode::Number,
        "boolean" => SchemaNode::Boolean,
        "null" => SchemaNode::Null,
        "any" => SchemaNode::Any,
        "array" => SchemaNode::Array(Box::new(match spec.get("items") {
            Some(items) => lower_type_ref(items, path)?,
            None => SchemaNode::Any,
        })),
        "record" => SchemaNode::Record(Box::new(match spec.get("values") {
            Some(values) => lower_type_ref(values, path)?,
            None => SchemaNode::Any,
        })),
        "enum" => {
            let values = spec
                .get("values")
                .and_then(toml::Value::as_array)
                .ok_or_else(|| invalid(path, "An enum needs a 'values' array"))?;
            let strings = values
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid(path, "Enum values must be strings"))?;
            SchemaNode::Enum(strings)
        }
        "literal" => {
            let value = spec
                .get("value")
                .ok_or_else(|| invalid(path, "A literal needs a 'value'"))?;
            SchemaNode::Literal(to_json(value))
        }
        "union" => {
            let variants = spec
                .get("variants")
                .and_then(toml::Value::as_array)
                .ok_or_else(|| invalid(path, "A union needs a 'variants' array"))?;
            union_of(
                variants
                    .iter()
                    .map(|v| lower_type_ref(v, path))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        "object" => match spec.get("properties") {
            Some(toml::Value::Table(properties)) => lower_table(properties, path)?,
            None => SchemaNode::object(Vec::<(String, SchemaNode)>::new()),
            Some(_) => return Err(invalid(path, "'properties' must be a table")),
        },
        other => return Err(invalid(path, format!("Unknown type '{}'", other))),
    };

    let mut node = base;
    for check in checks(kind, spec, path)? {
        node = node.refine(check);
    }
    if let Some(default) = spec.get("default") {
        node = node.with_default(to_json(default));
    }
    let optional = spec.get("optional").and_then(toml::Value::as_bool) == Some(true)
        || spec.get("required").and_then(toml::Value::as_bool) == Some(false);
    if optional {
        node = node.optional();
    }
    Ok(node)
}

/// `min`/`max` bound the value for numbers, the length for strings and the
/// item count for arrays.
fn checks(kind: &str, spec: &Table, path: &str) -> Result<Vec<Check>> {
    let mut out = Vec::new();
    let number = |key: &str| -> Option<f64> {
        match spec.get(key)? {
            toml::Value::Integer(i) => Some(*i as f64),
            toml::Value::Float(f) => Some(*f),
            _ => None,
        }
    };
    let count = |key: &str| -> Result<Option<usize>> {
        match spec.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(i)) if *i >= 0 => Ok(Some(*i as usize)),
            Some(_) => Err(invalid(path, format!("'{}' must be a non-negative integer", key))),
        }
    };

    match kind {
        "integer" | "number" => {
            out.extend(number("min").map(Check::Minimum));
            out.extend(number("max").map(Check::Maximum));
        }
        "string" => {
            out.extend(count("min")?.map(Check::MinLength));
            out.extend(count("max")?.map(Check::MaxLength));
        }
        "array" => {
            out.extend(count("min")?.map(Check::MinItems));
            out.extend(count("max")?.map(Check::MaxItems));
        }
        _ => {}
    }
    out.extend(count("min_length")?.map(Check::MinLength));
    out.extend(count("max_length")?.map(Check::MaxLength));
    if let Some(pattern) = spec.get("pattern").and_then(toml::Value::as_str) {
        if regex::Regex::new(pattern).is_err() {
            return Err(invalid(path, format!("Invalid pattern '{}'", pattern)));
        }
        out.push(Check::Pattern(pattern.to_string()));
    }
    if let Some(format) = spec.get("format").and_then(toml::Value::as_str) {
        out.push(Check::Format(format.to_string()));
    }
    Ok(out)
}

fn to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => number_value(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}

fn invalid(path: &str, message: impl Into<String>) -> ZenfigError {
    let err = ZenfigError::new(
        ErrorCode::InvalidFormat,
        format!("Invalid declarative schema: {}", message.into()),
    );
    if path.is_empty() { err } else { err.with_path(path) }
}
