//! Dot-path resolution against a schema tree.

use super::{Schema, SchemaNode, describe};
use crate::error::{ErrorCode, Result, ZenfigError};
use serde_json::Value;

/// A path that was found in the schema. The canonical path always uses the
/// schema's casing, whatever the caller typed.
#[derive(Debug, Clone)]
pub struct ResolvedPath<'s> {
    pub canonical_path: String,
    pub schema: &'s SchemaNode,
    pub segments: Vec<String>,
}

/// A leaf of the schema: any node that is not an object.
#[derive(Debug, Clone)]
pub struct LeafPath<'s> {
    pub path: String,
    pub schema: &'s SchemaNode,
    /// True when the leaf or any of its ancestors is optional
    pub is_optional: bool,
    pub has_default: bool,
    pub default_value: Option<Value>,
}

/// Resolve a dot path segment by segment, matching names exactly first and
/// case-insensitively second.
pub fn resolve_path<'s>(schema: &'s Schema, path: &str) -> Result<ResolvedPath<'s>> {
    if path.is_empty() {
        return Err(ZenfigError::new(ErrorCode::UnknownKey, "Path cannot be empty")
            .with_remediation("Use dot notation to address a key")
            .with_example("database.host"));
    }

    let mut current = schema.root();
    let mut segments: Vec<String> = Vec::new();

    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(ZenfigError::validation(
                ErrorCode::UnknownKey,
                path,
                format!("Path '{}' contains an empty segment", path),
            )
            .with_example("database.host"));
        }

        let normalized = current.normalize();
        let Some(properties) = normalized.properties() else {
            let prefix = segments.join(".");
            return Err(ZenfigError::validation(
                ErrorCode::UnknownKey,
                path,
                format!("Cannot descend into '{}'", segment),
            )
            .with_problem(format!(
                "'{}' is a {}, not an object",
                prefix,
                describe(current)
            )));
        };

        let found = properties
            .iter()
            .find(|p| p.name == segment)
            .or_else(|| {
                let folded = segment.to_lowercase();
                properties.iter().find(|p| p.name.to_lowercase() == folded)
            });

        match found {
            Some(property) => {
                segments.push(property.name.clone());
                current = &property.node;
            }
            None => {
                let prefix = segments.join(".");
                let problem = if prefix.is_empty() {
                    format!("'{}' is not a top-level key", segment)
                } else {
                    format!("'{}' does not exist under '{}'", segment, prefix)
                };
                return Err(ZenfigError::validation(
                    ErrorCode::UnknownKey,
                    path,
                    format!("Unknown key '{}'", path),
                )
                .with_problem(problem)
                .with_remediation("Check the key against the schema")
                .with_available_keys(properties.iter().map(|p| p.name.clone()).collect()));
            }
        }
    }

    Ok(ResolvedPath {
        canonical_path: segments.join("."),
        schema: current,
        segments,
    })
}

/// Every leaf under the root, depth first in schema order.
pub fn leaf_paths(schema: &Schema) -> Vec<LeafPath<'_>> {
    let mut out = Vec::new();
    collect_leaves(schema.root(), "", false, &mut out);
    out
}

fn collect_leaves<'s>(
    node: &'s SchemaNode,
    prefix: &str,
    parent_optional: bool,
    out: &mut Vec<LeafPath<'s>>,
) {
    let Some(properties) = node.normalize().properties() else {
        return;
    };
    for property in properties {
        let path = if prefix.is_empty() {
            property.name.clone()
        } else {
            format!("{}.{}", prefix, property.name)
        };
        let child = property.node.normalize();
        let optional = parent_optional || child.optional;
        if child.is_object() {
            collect_leaves(&property.node, &path, optional, out);
        } else {
            out.push(LeafPath {
                path,
                schema: &property.node,
                is_optional: optional,
                has_default: child.default.is_some(),
                default_value: child.default.cloned(),
            });
        }
    }
}
