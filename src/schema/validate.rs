//! Validation of assembled value trees.
//!
//! The walk never stops at the first problem: every violation is collected
//! with its path, and the returned value has schema defaults filled in and
//! keys unknown to the schema stripped.

use super::{Check, Normalized, Schema, SchemaNode, describe};
use crate::error::{ErrorCode, Result, ZenfigError};
use crate::tree::{self, values_equal};
use serde_json::{Map, Value};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Outcome of [`validate_all`].
#[derive(Debug)]
pub struct ValidationReport {
    /// Input with defaults applied and unknown keys removed
    pub value: Value,
    pub errors: Vec<ZenfigError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate and return the first violation, if any.
pub fn validate(value: &Value, schema: &Schema) -> Result<Value> {
    let report = validate_all(value, schema);
    match report.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(report.value),
    }
}

/// Validate and collect every violation.
pub fn validate_all(value: &Value, schema: &Schema) -> ValidationReport {
    let mut errors = Vec::new();
    let value = check(value, schema.root(), "", &mut errors);
    ValidationReport { value, errors }
}

/// Validate a single value against one node, first violation wins.
pub fn validate_node(value: &Value, node: &SchemaNode, path: &str) -> Result<Value> {
    let mut errors = Vec::new();
    let value = check(value, node, path, &mut errors);
    match errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

/// Dot paths present in `value` that the schema does not describe.
/// Records accept any key, so nothing below a record is reported.
pub fn unknown_keys(value: &Value, schema: &Schema) -> Vec<String> {
    let mut out = Vec::new();
    collect_unknown(value, schema.root(), "", &mut out);
    out
}

fn collect_unknown(value: &Value, node: &SchemaNode, path: &str, out: &mut Vec<String>) {
    let (Value::Object(map), Some(properties)) = (value, node.normalize().properties()) else {
        return;
    };
    for (key, child) in map {
        let child_path = join(path, key);
        match properties.iter().find(|p| &p.name == key) {
            Some(property) => collect_unknown(child, &property.node, &child_path, out),
            None => out.push(child_path),
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn check(value: &Value, node: &SchemaNode, path: &str, errors: &mut Vec<ZenfigError>) -> Value {
    let normalized = node.normalize();
    match normalized.node {
        SchemaNode::Object(properties) => {
            let Value::Object(map) = value else {
                errors.push(type_mismatch(path, node, value));
                return value.clone();
            };
            let mut out = Map::new();
            for property in properties {
                let child_path = join(path, &property.name);
                let child = property.node.normalize();
                match map.get(&property.name) {
                    Some(child_value) => {
                        let checked = check(child_value, &property.node, &child_path, errors);
                        out.insert(property.name.clone(), checked);
                    }
                    None => {
                        if let Some(default) = child.default {
                            out.insert(property.name.clone(), default.clone());
                        } else if child.optional {
                            continue;
                        } else if child.is_object() {
                            // Descend so defaults fill in and each missing
                            // leaf is reported at its own path.
                            let empty = Value::Object(Map::new());
                            let checked = check(&empty, &property.node, &child_path, errors);
                            out.insert(property.name.clone(), checked);
                        } else {
                            errors.push(
                                ZenfigError::validation(
                                    ErrorCode::MissingRequired,
                                    &child_path,
                                    format!("Required value '{}' is missing", child_path),
                                )
                                .with_expected(describe(&property.node))
                                .with_remediation(format!(
                                    "Set it with: zenfig upsert {} <value>",
                                    child_path
                                )),
                            );
                        }
                    }
                }
            }
            Value::Object(out)
        }
        SchemaNode::Array(items) => {
            let Value::Array(elements) = value else {
                errors.push(type_mismatch(path, node, value));
                return value.clone();
            };
            check_refinements(value, &normalized, path, errors);
            Value::Array(
                elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| check(element, items, &format!("{}[{}]", path, i), errors))
                    .collect(),
            )
        }
        SchemaNode::Record(values) => {
            let Value::Object(map) = value else {
                errors.push(type_mismatch(path, node, value));
                return value.clone();
            };
            Value::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), check(child, values, &join(path, key), errors)))
                    .collect(),
            )
        }
        SchemaNode::String => {
            if value.is_string() {
                check_refinements(value, &normalized, path, errors);
            } else {
                errors.push(type_mismatch(path, node, value));
            }
            value.clone()
        }
        SchemaNode::Number => {
            if value.is_number() {
                check_refinements(value, &normalized, path, errors);
            } else {
                errors.push(type_mismatch(path, node, value));
            }
            value.clone()
        }
        SchemaNode::Boolean => {
            if !value.is_boolean() {
                errors.push(type_mismatch(path, node, value));
            }
            value.clone()
        }
        SchemaNode::Null => {
            if !value.is_null() {
                errors.push(type_mismatch(path, node, value));
            }
            value.clone()
        }
        SchemaNode::Any => value.clone(),
        SchemaNode::Literal(literal) => {
            if !values_equal(literal, value) {
                errors.push(
                    ZenfigError::validation(
                        ErrorCode::ConstraintViolation,
                        path,
                        format!("Value must be exactly {}", literal),
                    )
                    .with_expected(describe(node))
                    .with_received(received(value)),
                );
            }
            value.clone()
        }
        SchemaNode::Enum(options) => {
            match value {
                Value::String(s) if options.contains(s) => {}
                Value::String(_) => errors.push(
                    ZenfigError::validation(
                        ErrorCode::ConstraintViolation,
                        path,
                        "Value is not one of the allowed options",
                    )
                    .with_expected(format!("one of: {}", options.join(", ")))
                    .with_received(received(value)),
                ),
                _ => errors.push(type_mismatch(path, node, value)),
            }
            value.clone()
        }
        SchemaNode::Union(branches) => {
            for branch in branches {
                let mut branch_errors = Vec::new();
                let checked = check(value, branch, path, &mut branch_errors);
                if branch_errors.is_empty() {
                    return checked;
                }
            }
            errors.push(type_mismatch(path, node, value));
            value.clone()
        }
        SchemaNode::Optional(_) | SchemaNode::Default(..) | SchemaNode::Refine(..) => {
            unreachable!("normalize strips wrappers")
        }
    }
}

fn check_refinements(
    value: &Value,
    normalized: &Normalized<'_>,
    path: &str,
    errors: &mut Vec<ZenfigError>,
) {
    for check in &normalized.checks {
        if let Some(problem) = violation(value, check) {
            let err = if **check == Check::Int {
                ZenfigError::validation(ErrorCode::TypeMismatch, path, "Expected an integer")
                    .with_expected("integer")
            } else {
                ZenfigError::validation(ErrorCode::ConstraintViolation, path, problem)
            };
            errors.push(err.with_received(received(value)));
        }
    }
}

/// Describe how `value` breaks `check`, or `None` when it holds.
fn violation(value: &Value, check: &Check) -> Option<String> {
    match (check, value) {
        (Check::Int, Value::Number(n)) => {
            let integral = n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0);
            (!integral).then(|| "Value must be an integer".to_string())
        }
        (Check::Minimum(min), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f < min)
            .map(|_| format!("Value must be at least {}", min)),
        (Check::Maximum(max), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f > max)
            .map(|_| format!("Value must be at most {}", max)),
        (Check::ExclusiveMinimum(min), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f <= min)
            .map(|_| format!("Value must be greater than {}", min)),
        (Check::ExclusiveMaximum(max), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f >= max)
            .map(|_| format!("Value must be less than {}", max)),
        (Check::MultipleOf(step), Value::Number(n)) => n
            .as_f64()
            .filter(|f| *step != 0.0 && ((f / step) - (f / step).round()).abs() > 1e-9)
            .map(|_| format!("Value must be a multiple of {}", step)),
        (Check::MinLength(min), Value::String(s)) => (s.chars().count() < *min)
            .then(|| format!("Value must be at least {} characters long", min)),
        (Check::MaxLength(max), Value::String(s)) => (s.chars().count() > *max)
            .then(|| format!("Value must be at most {} characters long", max)),
        (Check::Pattern(pattern), Value::String(s)) => match regex::Regex::new(pattern) {
            Ok(re) if re.is_match(s) => None,
            Ok(_) => Some(format!("Value must match pattern {}", pattern)),
            Err(_) => Some(format!("Schema pattern {} is not a valid regular expression", pattern)),
        },
        (Check::Format(format), Value::String(s)) => {
            (!matches_format(format, s)).then(|| format!("Value must be a valid {}", format))
        }
        (Check::MinItems(min), Value::Array(items)) => (items.len() < *min)
            .then(|| format!("Array must have at least {} items", min)),
        (Check::MaxItems(max), Value::Array(items)) => (items.len() > *max)
            .then(|| format!("Array must have at most {} items", max)),
        _ => None,
    }
}

/// Known string formats. Unknown formats are annotations and always pass.
fn matches_format(format: &str, s: &str) -> bool {
    match format {
        "email" => match s.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.contains('@')
            }
            None => false,
        },
        "uri" | "url" => url::Url::parse(s).is_ok(),
        "ipv4" => s.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => s.parse::<Ipv6Addr>().is_ok(),
        "hostname" => {
            !s.is_empty()
                && s.len() <= 253
                && s.split('.').all(|label| {
                    !label.is_empty()
                        && label.len() <= 63
                        && !label.starts_with('-')
                        && !label.ends_with('-')
                        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                })
        }
        "uuid" => {
            s.len() == 36
                && s.char_indices().all(|(i, c)| match i {
                    8 | 13 | 18 | 23 => c == '-',
                    _ => c.is_ascii_hexdigit(),
                })
        }
        _ => true,
    }
}

fn type_mismatch(path: &str, node: &SchemaNode, value: &Value) -> ZenfigError {
    let expected = describe(node);
    ZenfigError::validation(
        ErrorCode::TypeMismatch,
        path,
        format!("Expected {}, received {}", expected, type_name(value)),
    )
    .with_expected(expected)
    .with_received(received(value))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn received(value: &Value) -> String {
    tree::canonical_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(SchemaNode::object([
            (
                "database",
                SchemaNode::object([
                    ("host", SchemaNode::String.with_default(json!("localhost"))),
                    (
                        "port",
                        SchemaNode::integer()
                            .refine(Check::Minimum(1.0))
                            .refine(Check::Maximum(65535.0)),
                    ),
                ]),
            ),
            (
                "api",
                SchemaNode::object([
                    ("maxRetries", SchemaNode::integer().with_default(json!(3))),
                    (
                        "mode",
                        SchemaNode::Enum(vec!["fast".into(), "safe".into()]).optional(),
                    ),
                    (
                        "url",
                        SchemaNode::String
                            .refine(Check::Format("url".into()))
                            .optional(),
                    ),
                ]),
            ),
            ("debug", SchemaNode::Boolean.optional()),
        ]))
        .unwrap()
    }

    #[test]
    fn test_valid_value_gets_defaults() {
        let value = validate(&json!({ "database": { "port": 5432 } }), &schema()).unwrap();
        assert_eq!(
            value,
            json!({
                "database": { "host": "localhost", "port": 5432 },
                "api": { "maxRetries": 3 }
            })
        );
    }

    #[test]
    fn test_validate_all_collects_every_error() {
        let report = validate_all(
            &json!({
                "database": { "host": 1, "port": 70000 },
                "api": { "mode": "slow", "url": "not a url" },
                "debug": "yes"
            }),
            &schema(),
        );
        let mut found: Vec<(String, ErrorCode)> = report
            .errors
            .iter()
            .map(|e| (e.path().unwrap_or_default().to_string(), e.code()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            found,
            vec![
                ("api.mode".to_string(), ErrorCode::ConstraintViolation),
                ("api.url".to_string(), ErrorCode::ConstraintViolation),
                ("database.host".to_string(), ErrorCode::TypeMismatch),
                ("database.port".to_string(), ErrorCode::ConstraintViolation),
                ("debug".to_string(), ErrorCode::TypeMismatch),
            ]
        );
        assert!(!report.is_valid());
    }

    #[test]
    fn test_missing_required_leaf() {
        let err = validate(&json!({}), &schema()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingRequired);
        assert_eq!(err.path(), Some("database.port"));
    }

    #[test]
    fn test_non_integer_number_is_type_mismatch() {
        let err = validate(&json!({ "database": { "port": 54.5 } }), &schema()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
        assert_eq!(err.path(), Some("database.port"));
    }

    #[test]
    fn test_unknown_keys_are_stripped_and_reportable() {
        let input = json!({ "database": { "port": 1, "extra": true }, "extra": { "path": "x" } });
        let value = validate(&input, &schema()).unwrap();
        assert!(value.get("extra").is_none());
        assert!(value["database"].get("extra").is_none());
        assert_eq!(unknown_keys(&input, &schema()), vec!["database.extra", "extra"]);
    }

    #[test]
    fn test_union_and_literal() {
        let node = SchemaNode::Union(vec![SchemaNode::Literal(json!("auto")), SchemaNode::integer()]);
        assert!(validate_node(&json!("auto"), &node, "k").is_ok());
        assert!(validate_node(&json!(4), &node, "k").is_ok());
        assert_eq!(
            validate_node(&json!("manual"), &node, "k").unwrap_err().code(),
            ErrorCode::TypeMismatch
        );
        assert_eq!(
            validate_node(&json!(4.0), &SchemaNode::Literal(json!(4)), "k").unwrap(),
            json!(4.0)
        );
    }

    #[test]
    fn test_formats() {
        assert!(matches_format("email", "ops@example.com"));
        assert!(!matches_format("email", "ops.example.com"));
        assert!(matches_format("ipv4", "10.0.0.1"));
        assert!(!matches_format("ipv4", "10.0.0.256"));
        assert!(matches_format("uuid", "123e4567-e89b-12d3-a456-426614174000"));
        assert!(matches_format("hostname", "db.internal"));
        assert!(matches_format("made-up", "anything"));
    }

    #[test]
    fn test_array_items_and_bounds() {
        let node = SchemaNode::Array(Box::new(SchemaNode::String)).refine(Check::MaxItems(2));
        assert!(validate_node(&json!(["a", "b"]), &node, "tags").is_ok());
        let err = validate_node(&json!(["a", 1]), &node, "tags").unwrap_err();
        assert_eq!(err.path(), Some("tags[1]"));
        let err = validate_node(&json!(["a", "b", "c"]), &node, "tags").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstraintViolation);
    }
}
