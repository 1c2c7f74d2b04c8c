//! Conversion between stored strings and typed values.
//!
//! Stored values are always strings. Parsing is directed by the schema node
//! (or by an explicit [`ParseMode`]) and never coerces: `"yes"` is not a
//! boolean and `"1.0"` is not an integer.

use super::{SchemaNode, describe, validate};
use crate::error::{ErrorCode, Result, ZenfigError};
use crate::tree::{format_number, number_value};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How to interpret a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Follow the schema node
    #[default]
    Auto,
    String,
    Int,
    Float,
    Bool,
    Json,
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ParseMode::Auto),
            "string" | "str" => Ok(ParseMode::String),
            "int" | "integer" => Ok(ParseMode::Int),
            "float" | "number" => Ok(ParseMode::Float),
            "bool" | "boolean" => Ok(ParseMode::Bool),
            "json" => Ok(ParseMode::Json),
            other => Err(format!(
                "unknown value type '{}' (expected auto, string, int, float, bool or json)",
                other
            )),
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseMode::Auto => "auto",
            ParseMode::String => "string",
            ParseMode::Int => "int",
            ParseMode::Float => "float",
            ParseMode::Bool => "bool",
            ParseMode::Json => "json",
        };
        f.write_str(name)
    }
}

/// Parse `raw` for the schema location `path`.
pub fn parse_value(raw: &str, node: &SchemaNode, path: &str, mode: ParseMode) -> Result<Value> {
    match mode {
        ParseMode::String => Ok(Value::String(raw.to_string())),
        ParseMode::Int => parse_int(raw, path),
        ParseMode::Float => parse_float(raw, path, "number"),
        ParseMode::Bool => parse_bool(raw, path),
        ParseMode::Json => parse_json(raw, path, "JSON"),
        ParseMode::Auto => parse_auto(raw, node, path),
    }
}

fn parse_auto(raw: &str, node: &SchemaNode, path: &str) -> Result<Value> {
    let normalized = node.normalize();
    match normalized.node {
        SchemaNode::String | SchemaNode::Enum(_) | SchemaNode::Any => {
            Ok(Value::String(raw.to_string()))
        }
        SchemaNode::Boolean => parse_bool(raw, path),
        SchemaNode::Number if normalized.is_integer() => parse_int(raw, path),
        SchemaNode::Number => parse_float(raw, path, "number"),
        SchemaNode::Null => {
            if raw == "null" {
                Ok(Value::Null)
            } else {
                Err(mismatch(path, "null", raw))
            }
        }
        SchemaNode::Object(_) | SchemaNode::Array(_) | SchemaNode::Record(_) => {
            parse_json(raw, path, &describe(node))
        }
        SchemaNode::Literal(literal) => match literal {
            Value::String(_) => Ok(Value::String(raw.to_string())),
            Value::Number(_) => parse_float(raw, path, &describe(node)),
            Value::Bool(_) => parse_bool(raw, path),
            Value::Null if raw == "null" => Ok(Value::Null),
            Value::Null => Err(mismatch(path, "null", raw)),
            Value::Array(_) | Value::Object(_) => parse_json(raw, path, &describe(node)),
        },
        SchemaNode::Union(branches) => {
            // "null" is how a stored null reads back, even next to a string branch.
            let nullable = branches
                .iter()
                .any(|branch| matches!(branch.normalize().node, SchemaNode::Null));
            if raw == "null" && nullable {
                return Ok(Value::Null);
            }
            for branch in branches {
                if let Ok(value) = parse_auto(raw, branch, path) {
                    if validate::validate_node(&value, branch, path).is_ok() {
                        return Ok(value);
                    }
                }
            }
            // No branch accepted the value; validation decides later.
            Ok(Value::String(raw.to_string()))
        }
        SchemaNode::Optional(_) | SchemaNode::Default(..) | SchemaNode::Refine(..) => {
            unreachable!("normalize strips wrappers")
        }
    }
}

fn parse_int(raw: &str, path: &str) -> Result<Value> {
    if raw.contains('.') {
        return Err(mismatch(path, "integer", raw)
            .with_problem("Integers cannot contain a decimal point"));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Value::from(u));
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(number_value(f)),
        Ok(f) if !f.is_finite() => {
            Err(mismatch(path, "integer", raw).with_problem("Value is not finite"))
        }
        Ok(_) => Err(mismatch(path, "integer", raw).with_problem("Value is not integral")),
        Err(_) => Err(mismatch(path, "integer", raw)),
    }
}

fn parse_float(raw: &str, path: &str, expected: &str) -> Result<Value> {
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(number_value(f)),
        Ok(_) => Err(mismatch(path, expected, raw).with_problem("Value is not finite")),
        Err(_) => Err(mismatch(path, expected, raw)),
    }
}

fn parse_bool(raw: &str, path: &str) -> Result<Value> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(Value::Bool(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(Value::Bool(false))
    } else {
        Err(mismatch(path, "boolean", raw).with_example("true"))
    }
}

fn parse_json(raw: &str, path: &str, expected: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|err| {
        mismatch(path, expected, raw).with_problem(format!("Invalid JSON: {}", err))
    })
}

fn mismatch(path: &str, expected: &str, raw: &str) -> ZenfigError {
    ZenfigError::validation(
        ErrorCode::TypeMismatch,
        path,
        format!("Cannot parse {:?} as {}", raw, expected),
    )
    .with_expected(expected)
    .with_received(format!("{:?}", raw))
}

/// Render a typed value as the string that gets stored.
///
/// `null` is stored as `"null"` so it parses back, containers become compact
/// JSON and integral numbers are printed without a fractional part.
pub fn serialize_value(value: &Value, node: &SchemaNode) -> String {
    let container = matches!(
        node.normalize().node,
        SchemaNode::Object(_) | SchemaNode::Array(_) | SchemaNode::Record(_)
    );
    match value {
        _ if container => value.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::Array(_) | Value::Object(_) | Value::Null => value.to_string(),
    }
}
