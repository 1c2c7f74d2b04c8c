//! Conversion between flat provider key/values and nested value trees.

use crate::error::{ErrorCode, Result, ZenfigError};
use crate::provider::{Guards, Provider, ProviderContext, ProviderKv};
use crate::schema::{ParseMode, Schema, SchemaAdapter};
use crate::tree::{self, MergeOptions, Override};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result of walking a [`ProviderKv`] through a schema.
#[derive(Debug)]
pub struct ParsedKv {
    /// Nested tree of every key that resolved and parsed
    pub value: Value,
    /// Stored keys with no counterpart in the schema
    pub unknown_keys: Vec<String>,
    /// Parse failures, one per key
    pub errors: Vec<ZenfigError>,
}

/// Resolve and parse every stored key. Never fails as a whole; problems are
/// reported per key.
pub fn parse_kv(adapter: &dyn SchemaAdapter, schema: &Schema, kv: &ProviderKv) -> ParsedKv {
    let mut value = Value::Object(Map::new());
    let mut unknown_keys = Vec::new();
    let mut errors = Vec::new();

    for (key, raw) in kv {
        let resolved = match adapter.resolve_path(schema, key) {
            Ok(resolved) => resolved,
            Err(_) => {
                unknown_keys.push(key.clone());
                continue;
            }
        };
        if resolved.canonical_path != *key {
            debug!(key = %key, canonical = %resolved.canonical_path, "stored key differs in case");
        }
        match adapter.parse_value(raw, resolved.schema, &resolved.canonical_path, ParseMode::Auto) {
            Ok(parsed) => tree::set_path(&mut value, &resolved.segments, parsed),
            Err(err) => errors.push(err),
        }
    }

    ParsedKv {
        value,
        unknown_keys,
        errors,
    }
}

/// Serialize every schema leaf present in `value` to its stored string.
/// `null` leaves are skipped: a tree-level null means "not set", and a
/// leaf that is not nullable would read `"null"` back as something else.
pub fn serialize_kv(adapter: &dyn SchemaAdapter, schema: &Schema, value: &Value) -> ProviderKv {
    adapter
        .get_all_leaf_paths(schema)
        .into_iter()
        .filter_map(|leaf| {
            let leaf_value = tree::get_path(value, &leaf.path)?;
            if leaf_value.is_null() {
                return None;
            }
            Some((leaf.path, adapter.serialize_value(leaf_value, leaf.schema)))
        })
        .collect()
}

/// Nested tree holding every schema default.
pub fn defaults_tree(adapter: &dyn SchemaAdapter, schema: &Schema) -> Value {
    let mut value = Value::Object(Map::new());
    for leaf in adapter.get_all_leaf_paths(schema) {
        if let Some(default) = leaf.default_value {
            tree::set_path(&mut value, &tree::segments(&leaf.path), default);
        }
    }
    value
}

/// What to read from the store and how strictly.
#[derive(Debug, Clone, Copy)]
pub struct StoredRequest<'a> {
    pub prefix: &'a str,
    pub env: &'a str,
    pub services: &'a [String],
    pub guards: Option<&'a Guards>,
    /// Unknown keys and cross-service conflicts become errors
    pub strict: bool,
}

/// Stored configuration of one or more services merged into one tree.
#[derive(Debug)]
pub struct StoredTree {
    pub value: Value,
    /// `(service, key)` pairs that are not part of the schema
    pub unknown_keys: Vec<(String, String)>,
    /// Stored values that do not parse against their schema node
    pub errors: Vec<ZenfigError>,
    /// Leaves a later service replaced with a different value
    pub overrides: Vec<Override>,
    pub warnings: Vec<String>,
}

/// Guard-check the provider, fetch every service, parse each against the
/// schema and merge them in order, the last service winning.
///
/// In strict mode the first unknown key fails with VAL004 and conflicting
/// values fail with VAL005; otherwise both only produce warnings.
pub async fn load_stored(
    provider: &dyn Provider,
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    request: StoredRequest<'_>,
) -> Result<StoredTree> {
    provider.check_guards(request.guards).await?;

    let mut sources = Vec::with_capacity(request.services.len());
    let mut unknown_keys = Vec::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for service in request.services {
        let ctx = ProviderContext::new(request.prefix, service.as_str(), request.env);
        let kv = provider.fetch(&ctx).await?;
        debug!(context = %ctx, keys = kv.len(), "loaded stored values");

        let parsed = parse_kv(adapter, schema, &kv);
        for key in parsed.unknown_keys {
            if request.strict {
                return Err(unknown_key_error(adapter, schema, service, &key));
            }
            warn!(service = %service, key = %key, "stored key is not in the schema");
            warnings.push(format!(
                "Unknown key '{}' in service '{}' is not in the schema",
                key, service
            ));
            unknown_keys.push((service.clone(), key));
        }
        errors.extend(parsed.errors);
        sources.push((service.clone(), parsed.value));
    }

    let merged = tree::merge_sources(
        &sources,
        MergeOptions {
            strict: request.strict,
        },
    )?;
    for o in &merged.overrides {
        warnings.push(format!(
            "'{}' from service '{}' is overridden by service '{}'",
            o.key, o.previous_source, o.source
        ));
    }

    Ok(StoredTree {
        value: merged.value,
        unknown_keys,
        errors,
        overrides: merged.overrides,
        warnings,
    })
}

/// VAL004 for a stored key that does not resolve, carrying the resolver's
/// hints about where the path went wrong.
pub fn unknown_key_error(
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    service: &str,
    key: &str,
) -> ZenfigError {
    let err = match adapter.resolve_path(schema, key) {
        Err(err) => err,
        Ok(_) => ZenfigError::validation(ErrorCode::UnknownKey, key, "Key is not in the schema"),
    };
    err.with_path(key)
        .with_problem(format!(
            "Service '{}' stores a key the schema does not declare",
            service
        ))
        .with_remediation(format!(
            "Remove it with `zenfig delete {} --service {} --force` or add it to the schema",
            key, service
        ))
}
