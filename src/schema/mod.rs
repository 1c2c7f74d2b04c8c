//! # Schema adapters
//!
//! zenfig understands three schema systems. Each one is wrapped by a
//! [`SchemaAdapter`] that lowers the system's native document into the shared
//! [`SchemaNode`] tree, after which path resolution, value parsing,
//! serialization and validation behave identically no matter which system
//! described the configuration.
//!
//! | format        | adapter                                   | native representation          |
//! |---------------|-------------------------------------------|--------------------------------|
//! | `json-schema` | [`json_schema::JsonSchemaAdapter`]        | JSON Schema document           |
//! | `schemars`    | [`derived::DerivedSchemaAdapter`]         | `schemars::schema::RootSchema` |
//! | `declarative` | [`declarative::DeclarativeSchemaAdapter`] | TOML table tree                |
//!
//! Only one adapter is active per invocation; it is picked from
//! `[schema] format` with [`adapter_for`].

use crate::error::{ErrorCode, Result, ZenfigError};
use crate::tree;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub mod declarative;
pub mod derived;
pub mod json_schema;
pub mod path;
pub mod validate;
pub mod value;

pub use path::{LeafPath, ResolvedPath};
pub use validate::ValidationReport;
pub use value::ParseMode;

/// One element of a schema tree.
///
/// Structural variants describe the shape of a value. `Optional`, `Default`
/// and `Refine` are wrappers: they carry metadata about the node they wrap
/// and must be peeled with [`SchemaNode::normalize`] before dispatching on
/// the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object(Vec<Property>),
    Array(Box<SchemaNode>),
    /// String-keyed map whose values all share one schema
    Record(Box<SchemaNode>),
    String,
    Number,
    Boolean,
    Null,
    /// Accepts anything
    Any,
    Literal(Value),
    Enum(Vec<String>),
    Union(Vec<SchemaNode>),
    Optional(Box<SchemaNode>),
    Default(Box<SchemaNode>, Value),
    Refine(Box<SchemaNode>, Check),
}

/// A named property of an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub node: SchemaNode,
}

/// Refinements attached to a node with [`SchemaNode::Refine`].
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// Number must be integral
    Int,
    Minimum(f64),
    Maximum(f64),
    ExclusiveMinimum(f64),
    ExclusiveMaximum(f64),
    MultipleOf(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    Format(String),
    MinItems(usize),
    MaxItems(usize),
}

/// A node with its wrappers peeled off.
#[derive(Debug, Clone)]
pub struct Normalized<'a> {
    /// The structural node underneath all wrappers
    pub node: &'a SchemaNode,
    pub optional: bool,
    pub default: Option<&'a Value>,
    pub checks: Vec<&'a Check>,
}

impl<'a> Normalized<'a> {
    /// Whether a numeric node is refined to integers.
    pub fn is_integer(&self) -> bool {
        matches!(self.node, SchemaNode::Number) && self.checks.iter().any(|c| **c == Check::Int)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.node, SchemaNode::Object(_))
    }

    /// Properties of an object node, `None` for every other kind.
    pub fn properties(&self) -> Option<&'a [Property]> {
        match self.node {
            SchemaNode::Object(properties) => Some(properties),
            _ => None,
        }
    }
}

impl SchemaNode {
    /// Integer node: a number refined with [`Check::Int`].
    pub fn integer() -> Self {
        SchemaNode::Number.refine(Check::Int)
    }

    /// Object node from `(name, node)` pairs.
    pub fn object<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = (S, SchemaNode)>,
        S: Into<String>,
    {
        SchemaNode::Object(
            properties
                .into_iter()
                .map(|(name, node)| Property {
                    name: name.into(),
                    node,
                })
                .collect(),
        )
    }

    pub fn optional(self) -> Self {
        SchemaNode::Optional(Box::new(self))
    }

    pub fn with_default(self, value: Value) -> Self {
        SchemaNode::Default(Box::new(self), value)
    }

    pub fn refine(self, check: Check) -> Self {
        SchemaNode::Refine(Box::new(self), check)
    }

    /// Strip every wrapper, collecting what they said.
    ///
    /// The outermost default wins when several are stacked.
    pub fn normalize(&self) -> Normalized<'_> {
        let mut node = self;
        let mut optional = false;
        let mut default = None;
        let mut checks = Vec::new();
        loop {
            match node {
                SchemaNode::Optional(inner) => {
                    optional = true;
                    node = inner;
                }
                SchemaNode::Default(inner, value) => {
                    if default.is_none() {
                        default = Some(value);
                    }
                    node = inner;
                }
                SchemaNode::Refine(inner, check) => {
                    checks.push(check);
                    node = inner;
                }
                _ => {
                    return Normalized {
                        node,
                        optional,
                        default,
                        checks,
                    };
                }
            }
        }
    }
}

/// Human label for a node: `string`, `integer`, `literal "prod"`, ...
pub fn describe(node: &SchemaNode) -> String {
    let normalized = node.normalize();
    match normalized.node {
        SchemaNode::Object(_) => "object".to_string(),
        SchemaNode::Array(items) => format!("array<{}>", describe(items)),
        SchemaNode::Record(values) => format!("record<string, {}>", describe(values)),
        SchemaNode::String => "string".to_string(),
        SchemaNode::Number if normalized.is_integer() => "integer".to_string(),
        SchemaNode::Number => "number".to_string(),
        SchemaNode::Boolean => "boolean".to_string(),
        SchemaNode::Null => "null".to_string(),
        SchemaNode::Any => "unknown".to_string(),
        SchemaNode::Literal(value) => format!("literal {}", value),
        SchemaNode::Enum(values) => format!("enum ({})", values.join(" | ")),
        SchemaNode::Union(branches) => format!(
            "union ({})",
            branches.iter().map(describe).collect::<Vec<_>>().join(" | ")
        ),
        SchemaNode::Optional(_) | SchemaNode::Default(..) | SchemaNode::Refine(..) => {
            unreachable!("normalize strips wrappers")
        }
    }
}

/// Content hash of a schema tree, `sha256:<hex>`.
///
/// Computed over a canonical rendering of the normalized tree: properties
/// sorted by name, refinements sorted, wrapper order ignored. Two schemas
/// built independently with the same structure hash identically.
pub fn schema_hash(node: &SchemaNode) -> String {
    let mut canonical = String::new();
    fingerprint(node, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

fn fingerprint(node: &SchemaNode, out: &mut String) {
    let normalized = node.normalize();
    out.push('{');
    if normalized.optional {
        out.push_str("?;");
    }
    if let Some(default) = normalized.default {
        out.push_str("default=");
        out.push_str(&tree::canonical_json(default));
        out.push(';');
    }
    let mut checks: Vec<String> = normalized.checks.iter().map(|c| format!("{:?}", c)).collect();
    checks.sort();
    checks.dedup();
    for check in checks {
        out.push_str(&check);
        out.push(';');
    }
    match normalized.node {
        SchemaNode::Object(properties) => {
            out.push_str("object:");
            let mut sorted: Vec<&Property> = properties.iter().collect();
            sorted.sort_by(|a, b| a.name.cmp(&b.name));
            for property in sorted {
                out.push_str(&serde_json::Value::String(property.name.clone()).to_string());
                out.push('=');
                fingerprint(&property.node, out);
                out.push(',');
            }
        }
        SchemaNode::Array(items) => {
            out.push_str("array:");
            fingerprint(items, out);
        }
        SchemaNode::Record(values) => {
            out.push_str("record:");
            fingerprint(values, out);
        }
        SchemaNode::String => out.push_str("string"),
        SchemaNode::Number => out.push_str("number"),
        SchemaNode::Boolean => out.push_str("boolean"),
        SchemaNode::Null => out.push_str("null"),
        SchemaNode::Any => out.push_str("any"),
        SchemaNode::Literal(value) => {
            out.push_str("literal:");
            out.push_str(&tree::canonical_json(value));
        }
        SchemaNode::Enum(values) => {
            out.push_str("enum:");
            out.push_str(&Value::from(values.clone()).to_string());
        }
        SchemaNode::Union(branches) => {
            out.push_str("union:");
            for branch in branches {
                fingerprint(branch, out);
                out.push(',');
            }
        }
        SchemaNode::Optional(_) | SchemaNode::Default(..) | SchemaNode::Refine(..) => {
            unreachable!("normalize strips wrappers")
        }
    }
    out.push('}');
}

/// Build a union from lowered branches.
///
/// A single branch is returned as is. A nullable object (`[object, null]`)
/// becomes an optional object so its keys stay addressable.
pub(crate) fn union_of(mut branches: Vec<SchemaNode>) -> SchemaNode {
    if branches.len() == 1 {
        return branches.remove(0);
    }
    if let [first, SchemaNode::Null] = branches.as_slice() {
        if first.normalize().is_object() {
            return branches.remove(0).optional();
        }
    }
    SchemaNode::Union(branches)
}

/// A loaded schema. The root is always an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    root: SchemaNode,
}

impl Schema {
    pub fn new(root: SchemaNode) -> Result<Self> {
        let normalized = root.normalize();
        if !normalized.is_object() {
            return Err(ZenfigError::new(
                ErrorCode::InvalidFormat,
                format!(
                    "Schema root must be an object, found {}",
                    describe(&root)
                ),
            )
            .with_remediation("Wrap your configuration keys in a top-level object"));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }
}

/// The capability set every schema system provides.
///
/// Implementors supply the system-specific parts (`name`, `is_schema`,
/// `load`); everything else works on the lowered [`SchemaNode`] tree and has
/// a shared default implementation.
pub trait SchemaAdapter: Send + Sync {
    /// Name used in `[schema] format`.
    fn name(&self) -> &'static str;

    /// Whether `source` is a document of this schema system with an object root.
    fn is_schema(&self, source: &str) -> bool;

    /// Parse and lower a schema document.
    fn load(&self, source: &str) -> Result<Schema>;

    fn compute_schema_hash(&self, schema: &Schema) -> String {
        schema_hash(schema.root())
    }

    fn describe_node(&self, node: &SchemaNode) -> String {
        describe(node)
    }

    fn resolve_path<'s>(&self, schema: &'s Schema, path: &str) -> Result<ResolvedPath<'s>> {
        path::resolve_path(schema, path)
    }

    fn get_all_leaf_paths<'s>(&self, schema: &'s Schema) -> Vec<LeafPath<'s>> {
        path::leaf_paths(schema)
    }

    fn parse_value(
        &self,
        raw: &str,
        node: &SchemaNode,
        path: &str,
        mode: ParseMode,
    ) -> Result<Value> {
        value::parse_value(raw, node, path, mode)
    }

    fn serialize_value(&self, value: &Value, node: &SchemaNode) -> String {
        value::serialize_value(value, node)
    }

    fn validate(&self, value: &Value, schema: &Schema) -> Result<Value> {
        validate::validate(value, schema)
    }

    fn validate_all(&self, value: &Value, schema: &Schema) -> ValidationReport {
        validate::validate_all(value, schema)
    }
}

/// Every adapter, in the order `[schema] format` lists them.
pub fn adapters() -> Vec<Box<dyn SchemaAdapter>> {
    vec![
        Box::new(json_schema::JsonSchemaAdapter),
        Box::new(derived::DerivedSchemaAdapter),
        Box::new(declarative::DeclarativeSchemaAdapter),
    ]
}

/// Pick the adapter configured by `[schema] format`.
pub fn adapter_for(format: &str) -> Result<Box<dyn SchemaAdapter>> {
    adapters()
        .into_iter()
        .find(|adapter| adapter.name() == format)
        .ok_or_else(|| {
            ZenfigError::new(
                ErrorCode::InvalidArgument,
                format!("Unknown schema format '{}'", format),
            )
            .with_available_keys(adapters().iter().map(|a| a.name().to_string()).collect())
        })
}

/// Load `source` with `adapter`, pointing at the right format when the
/// document clearly belongs to a different schema system.
pub fn load_with(adapter: &dyn SchemaAdapter, source: &str) -> Result<Schema> {
    match adapter.load(source) {
        Ok(schema) => Ok(schema),
        Err(err) => {
            let other = adapters()
                .into_iter()
                .find(|candidate| candidate.name() != adapter.name() && candidate.is_schema(source));
            match other {
                Some(other) => Err(err.with_remediation(format!(
                    "This document looks like a '{}' schema; set [schema] format = \"{}\"",
                    other.name(),
                    other.name()
                ))),
                None => Err(err),
            }
        }
    }
}
