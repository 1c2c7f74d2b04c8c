//! Compare what is stored against what the template renders.

use crate::error::Result;
use crate::kv::{self, StoredRequest};
use crate::provider::Provider;
use crate::render::{RenderRequest, Renderer};
use crate::schema::{Schema, SchemaAdapter};
use crate::tree;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl DiffStatus {
    fn marker(&self) -> &'static str {
        match self {
            DiffStatus::Added => "+",
            DiffStatus::Removed => "-",
            DiffStatus::Modified => "~",
            DiffStatus::Unchanged => " ",
        }
    }
}

/// One key present in the stored tree, the rendered tree, or both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub key: String,
    pub stored: Option<Value>,
    pub rendered: Option<Value>,
    pub status: DiffStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub has_changes: bool,
    pub unknown_keys: Vec<String>,
    pub warnings: Vec<String>,
}

impl DiffResult {
    pub fn count(&self, status: DiffStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiffRequest<'a> {
    pub stored: StoredRequest<'a>,
    pub template: &'a Path,
}

/// Classify every key of the flattened stored and rendered trees.
///
/// Entries come out sorted by key and cover the union of both key sets.
pub fn compute_diff(stored: &Value, rendered: &Value) -> Vec<DiffEntry> {
    let stored = tree::flatten(stored);
    let rendered = tree::flatten(rendered);
    let keys: BTreeSet<&String> = stored.keys().chain(rendered.keys()).collect();

    keys.into_iter()
        .map(|key| {
            let before = stored.get(key);
            let after = rendered.get(key);
            let status = match (before, after) {
                (None, Some(_)) => DiffStatus::Added,
                (Some(_), None) => DiffStatus::Removed,
                (Some(a), Some(b)) if tree::values_equal(a, b) => DiffStatus::Unchanged,
                _ => DiffStatus::Modified,
            };
            DiffEntry {
                key: key.clone(),
                stored: before.cloned(),
                rendered: after.cloned(),
                status,
            }
        })
        .collect()
}

/// Fetch, parse and merge the stored services, render the template with the
/// merged tree and the schema defaults, and diff the two.
pub async fn execute_diff(
    provider: &dyn Provider,
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    renderer: &dyn Renderer,
    request: DiffRequest<'_>,
) -> Result<DiffResult> {
    let stored = kv::load_stored(provider, adapter, schema, request.stored).await?;
    if let Some(err) = stored.errors.into_iter().next() {
        return Err(err);
    }

    let defaults = kv::defaults_tree(adapter, schema);
    let rendered = renderer
        .render(RenderRequest {
            template: request.template,
            env: request.stored.env,
            secrets: &stored.value,
            defaults: Some(&defaults),
        })
        .await?;

    let entries = compute_diff(&stored.value, &rendered);
    let has_changes = entries.iter().any(|e| e.status != DiffStatus::Unchanged);
    debug!(entries = entries.len(), has_changes, "diff computed");

    Ok(DiffResult {
        entries,
        has_changes,
        unknown_keys: stored.unknown_keys.into_iter().map(|(_, key)| key).collect(),
        warnings: stored.warnings,
    })
}

/// Human-readable diff. Unchanged keys are summarised, not listed. Values are
/// replaced by `***` unless `show_values` is set.
pub fn format_diff(result: &DiffResult, show_values: bool, color: bool) -> String {
    let shown = |value: &Option<Value>| -> String {
        match value {
            Some(_) if !show_values => "***".to_string(),
            Some(v) => tree::canonical_json(v),
            None => String::new(),
        }
    };

    let mut out = String::new();
    for entry in result.entries.iter().filter(|e| e.status != DiffStatus::Unchanged) {
        let line = match entry.status {
            DiffStatus::Added => format!("+ {} = {}", entry.key, shown(&entry.rendered)),
            DiffStatus::Removed => format!("- {} = {}", entry.key, shown(&entry.stored)),
            DiffStatus::Modified if show_values => format!(
                "~ {}: {} -> {}",
                entry.key,
                shown(&entry.stored),
                shown(&entry.rendered)
            ),
            _ => format!("{} {}", entry.status.marker(), entry.key),
        };
        let line = if color {
            match entry.status {
                DiffStatus::Added => line.green().to_string(),
                DiffStatus::Removed => line.red().to_string(),
                _ => line.yellow().to_string(),
            }
        } else {
            line
        };
        out.push_str(&line);
        out.push('\n');
    }

    if !result.has_changes {
        out.push_str("No differences.\n");
    }
    out.push_str(&format!(
        "{} added, {} modified, {} removed, {} unchanged\n",
        result.count(DiffStatus::Added),
        result.count(DiffStatus::Modified),
        result.count(DiffStatus::Removed),
        result.count(DiffStatus::Unchanged),
    ));
    out
}

/// Values are only revealed on an interactive terminal, and only on request.
pub fn reveal_values(unlock: bool) -> bool {
    use std::io::IsTerminal;
    reveal(unlock, std::io::stdout().is_terminal())
}

/// Whether `--unlock` takes effect for output going to a terminal or not.
pub fn reveal(unlock: bool, is_tty: bool) -> bool {
    unlock && is_tty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::provider::ProviderContext;
    use crate::provider::tests::MockProvider;
    use crate::schema::SchemaNode;
    use crate::schema::json_schema::JsonSchemaAdapter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed tree and records what it was given.
    struct FixedRenderer {
        output: Value,
        seen: Mutex<Option<(Value, String, Option<Value>)>>,
    }

    impl FixedRenderer {
        fn new(output: Value) -> Self {
            Self {
                output,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Renderer for FixedRenderer {
        async fn render(&self, request: RenderRequest<'_>) -> Result<Value> {
            *self.seen.lock().unwrap() = Some((
                request.secrets.clone(),
                request.env.to_string(),
                request.defaults.cloned(),
            ));
            Ok(self.output.clone())
        }

        async fn version(&self) -> Result<String> {
            Ok("fixed".into())
        }
    }

    fn schema() -> Schema {
        Schema::new(SchemaNode::object([
            (
                "database",
                SchemaNode::object([("host", SchemaNode::String), ("port", SchemaNode::integer())]),
            ),
            (
                "api",
                SchemaNode::object([("maxRetries", SchemaNode::integer().with_default(json!(3)))])
                    .optional(),
            ),
        ]))
        .unwrap()
    }

    #[test]
    fn test_compute_diff_worked_example() {
        let stored = json!({ "database": { "host": "localhost", "port": 5432 } });
        let rendered = json!({
            "database": { "host": "prod", "port": 5432 },
            "api": { "maxRetries": 3 }
        });
        let entries = compute_diff(&stored, &rendered);
        let status: Vec<(&str, DiffStatus)> =
            entries.iter().map(|e| (e.key.as_str(), e.status)).collect();
        assert_eq!(
            status,
            vec![
                ("api.maxRetries", DiffStatus::Added),
                ("database.host", DiffStatus::Modified),
                ("database.port", DiffStatus::Unchanged),
            ]
        );
        assert_eq!(entries[1].stored, Some(json!("localhost")));
        assert_eq!(entries[1].rendered, Some(json!("prod")));
    }

    #[test]
    fn test_compute_diff_partitions_keys() {
        let stored = json!({ "a": 1, "b": { "c": true }, "d": [1, 2] });
        let rendered = json!({ "a": 1.0, "b": { "c": false }, "e": "x" });
        let entries = compute_diff(&stored, &rendered);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].status, DiffStatus::Unchanged);
        assert_eq!(entries[1].status, DiffStatus::Modified);
        assert_eq!(entries[2].status, DiffStatus::Removed);
        assert_eq!(entries[3].status, DiffStatus::Added);

        assert!(compute_diff(&stored, &stored)
            .iter()
            .all(|e| e.status == DiffStatus::Unchanged));
    }

    #[tokio::test]
    async fn test_execute_diff() {
        let ctx = ProviderContext::new("/zenfig", "api", "prod");
        let provider = MockProvider::new().with_values(
            &ctx,
            &[("database.host", "localhost"), ("database.port", "5432")],
        );
        let renderer = FixedRenderer::new(json!({
            "database": { "host": "prod", "port": 5432 },
            "api": { "maxRetries": 3 }
        }));
        let services = vec!["api".to_string()];

        let result = execute_diff(
            &provider,
            &JsonSchemaAdapter,
            &schema(),
            &renderer,
            DiffRequest {
                stored: StoredRequest {
                    prefix: "/zenfig",
                    env: "prod",
                    services: &services,
                    guards: None,
                    strict: false,
                },
                template: Path::new("config.jsonnet"),
            },
        )
        .await
        .unwrap();

        assert!(result.has_changes);
        assert_eq!(result.count(DiffStatus::Added), 1);
        assert_eq!(result.count(DiffStatus::Modified), 1);
        assert_eq!(result.count(DiffStatus::Unchanged), 1);

        let (secrets, env, defaults) = renderer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(secrets, json!({ "database": { "host": "localhost", "port": 5432 } }));
        assert_eq!(env, "prod");
        assert_eq!(defaults, Some(json!({ "api": { "maxRetries": 3 } })));
    }

    #[tokio::test]
    async fn test_execute_diff_unknown_keys_warn_or_fail() {
        let ctx = ProviderContext::new("/zenfig", "api", "prod");
        let provider = MockProvider::new().with_values(
            &ctx,
            &[("database.host", "h"), ("database.port", "1"), ("extra.path", "x")],
        );
        let renderer = FixedRenderer::new(json!({ "database": { "host": "h", "port": 1 } }));
        let services = vec!["api".to_string()];
        let request = |strict| DiffRequest {
            stored: StoredRequest {
                prefix: "/zenfig",
                env: "prod",
                services: &services,
                guards: None,
                strict,
            },
            template: Path::new("config.jsonnet"),
        };

        let result = execute_diff(&provider, &JsonSchemaAdapter, &schema(), &renderer, request(false))
            .await
            .unwrap();
        assert!(!result.has_changes);
        assert_eq!(result.unknown_keys, vec!["extra.path"]);
        assert_eq!(result.warnings.len(), 1);

        let err = execute_diff(&provider, &JsonSchemaAdapter, &schema(), &renderer, request(true))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownKey);
    }

    #[test]
    fn test_format_diff_redacts_by_default() {
        let entries = compute_diff(
            &json!({ "database": { "host": "localhost" } }),
            &json!({ "database": { "host": "prod" }, "api": { "maxRetries": 3 } }),
        );
        let result = DiffResult {
            has_changes: true,
            entries,
            unknown_keys: vec![],
            warnings: vec![],
        };

        let hidden = format_diff(&result, false, false);
        assert!(hidden.contains("+ api.maxRetries = ***"));
        assert!(hidden.contains("~ database.host\n"));
        assert!(!hidden.contains("prod"));
        assert!(hidden.ends_with("1 added, 1 modified, 0 removed, 0 unchanged\n"));

        let shown = format_diff(&result, true, false);
        assert!(shown.contains("~ database.host: \"localhost\" -> \"prod\""));
        assert!(shown.contains("+ api.maxRetries = 3"));
    }

    #[test]
    fn test_reveal_requires_unlock_and_terminal() {
        assert!(reveal(true, true));
        assert!(!reveal(true, false));
        assert!(!reveal(false, true));
        assert!(!reveal(false, false));
        assert!(!reveal_values(false));
    }
}
