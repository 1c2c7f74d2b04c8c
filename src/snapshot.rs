//! Versioned snapshots of stored configuration, and replaying them.
//!
//! A snapshot captures the raw stored strings of each service together with
//! the hash of the schema they were stored under. Restoring compares that
//! hash with the current schema, shows every change it is about to make and
//! then writes sequentially. There is no rollback: when a write fails the
//! keys written before it stay written.

use crate::error::{ErrorCode, Result, ZenfigError};
use crate::fsutil::write_owner_only;
use crate::provider::{Guards, Provider, ProviderContext, ProviderKv};
use crate::schema::{Schema, SchemaAdapter};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const STORED_LAYER: &str = "stored";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotV1 {
    pub version: u32,
    pub layer: String,
    pub meta: SnapshotMeta,
    /// service -> stored key/values
    pub data: BTreeMap<String, ProviderKv>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub timestamp: DateTime<Utc>,
    pub env: String,
    pub provider: String,
    pub prefix: String,
    pub schema_hash: String,
    pub services: Vec<String>,
}

/// Where and what to snapshot.
#[derive(Debug, Clone)]
pub struct SaveOptions<'a> {
    pub prefix: &'a str,
    pub env: &'a str,
    pub services: &'a [String],
    pub guards: Option<&'a Guards>,
    /// Directory for timestamped files, used when `output` is unset
    pub dir: PathBuf,
    pub output: Option<PathBuf>,
}

#[derive(Debug)]
pub struct SavedSnapshot {
    pub path: PathBuf,
    pub snapshot: SnapshotV1,
    pub warnings: Vec<String>,
}

/// Fetch every service and write the snapshot with owner-only permissions.
pub async fn save_snapshot(
    provider: &dyn Provider,
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    options: SaveOptions<'_>,
) -> Result<SavedSnapshot> {
    provider.check_guards(options.guards).await?;

    let mut data = BTreeMap::new();
    for service in options.services {
        let ctx = ProviderContext::new(options.prefix, service.as_str(), options.env);
        let kv = provider.fetch(&ctx).await?;
        debug!(context = %ctx, keys = kv.len(), "captured service");
        data.insert(service.clone(), kv);
    }

    let timestamp = Utc::now();
    let snapshot = SnapshotV1 {
        version: SNAPSHOT_VERSION,
        layer: STORED_LAYER.to_string(),
        meta: SnapshotMeta {
            timestamp,
            env: options.env.to_string(),
            provider: provider.name().to_string(),
            prefix: options.prefix.to_string(),
            schema_hash: adapter.compute_schema_hash(schema),
            services: options.services.to_vec(),
        },
        data,
    };

    let path = match options.output {
        Some(path) => path,
        None => options.dir.join(format!(
            "{}-{}.json",
            options.env,
            timestamp.format("%Y%m%dT%H%M%S%3fZ")
        )),
    };
    let content = serde_json::to_string_pretty(&snapshot)?;
    write_owner_only(&path, content.as_bytes()).map_err(|e| {
        ZenfigError::new(
            ErrorCode::FileSystem,
            format!("Cannot write snapshot {}: {}", path.display(), e),
        )
        .with_source(e)
    })?;
    info!(path = %path.display(), "snapshot saved");

    let mut warnings = Vec::new();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !is_vcs_ignored(dir) {
        warnings.push(format!(
            "{} is not ignored by git; snapshots contain secrets, add it to .gitignore",
            dir.display()
        ));
    }

    Ok(SavedSnapshot {
        path,
        snapshot,
        warnings,
    })
}

/// Read a snapshot, rejecting versions and layers this build does not know.
pub fn load_snapshot(path: &Path) -> Result<SnapshotV1> {
    let content = fs::read_to_string(path).map_err(|e| {
        ZenfigError::new(
            ErrorCode::FileSystem,
            format!("Cannot read snapshot {}: {}", path.display(), e),
        )
        .with_source(e)
    })?;
    let raw: Value = serde_json::from_str(&content)
        .map_err(|e| ZenfigError::from(e).with_path(path.display().to_string()))?;

    let version = raw.get("version").and_then(Value::as_u64);
    if version != Some(u64::from(SNAPSHOT_VERSION)) {
        return Err(ZenfigError::new(
            ErrorCode::InvalidFormat,
            "Unsupported snapshot version",
        )
        .with_path(path.display().to_string())
        .with_expected(SNAPSHOT_VERSION.to_string())
        .with_received(
            raw.get("version")
                .map(Value::to_string)
                .unwrap_or_else(|| "none".to_string()),
        ));
    }
    if raw.get("layer").and_then(Value::as_str) != Some(STORED_LAYER) {
        return Err(
            ZenfigError::new(ErrorCode::InvalidFormat, "Unsupported snapshot layer")
                .with_path(path.display().to_string())
                .with_expected(STORED_LAYER),
        );
    }

    serde_json::from_value(raw)
        .map_err(|e| ZenfigError::from(e).with_path(path.display().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Update,
}

/// One write a restore would perform.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub service: String,
    pub key: String,
    pub action: ChangeAction,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct RestorePlan {
    pub changes: Vec<Change>,
    pub unchanged: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RestoreOptions<'a> {
    pub prefix: &'a str,
    /// Target environment; the snapshot's own when unset
    pub env: Option<&'a str>,
    /// Only these services; all of the snapshot's when empty
    pub services: &'a [String],
    pub guards: Option<&'a Guards>,
    /// Restore despite a schema hash mismatch
    pub force: bool,
    pub dry_run: bool,
    pub confirm: bool,
    pub ci: bool,
}

impl RestoreOptions<'_> {
    fn target_env<'s>(&'s self, snapshot: &'s SnapshotV1) -> &'s str {
        self.env.unwrap_or(&snapshot.meta.env)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub planned: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub dry_run: bool,
    pub cancelled: bool,
}

/// Asks the operator to approve a restore.
pub trait Confirmer {
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// y/N prompt on the terminal. Escape or Ctrl-C count as "no".
pub struct PromptConfirmer;

impl Confirmer for PromptConfirmer {
    fn confirm(&self, message: &str) -> Result<bool> {
        match inquire::Confirm::new(message).with_default(false).prompt() {
            Ok(answer) => Ok(answer),
            Err(
                inquire::InquireError::OperationCanceled
                | inquire::InquireError::OperationInterrupted,
            ) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Work out the writes needed to bring the store back to the snapshot.
///
/// Keys already holding the snapshot value are skipped. Keys that no longer
/// resolve in the schema are skipped with a warning.
pub async fn plan_restore(
    provider: &dyn Provider,
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    snapshot: &SnapshotV1,
    options: &RestoreOptions<'_>,
) -> Result<RestorePlan> {
    let mut plan = RestorePlan::default();

    let current_hash = adapter.compute_schema_hash(schema);
    if snapshot.meta.schema_hash != current_hash {
        if !options.force {
            return Err(ZenfigError::new(
                ErrorCode::SnapshotSchemaMismatch,
                "Snapshot was taken with a different schema",
            )
            .with_expected(current_hash)
            .with_received(snapshot.meta.schema_hash.clone())
            .with_remediation("Review the schema changes, then rerun with --force-schema-mismatch"));
        }
        plan.warnings.push(format!(
            "Schema hash differs from the snapshot ({} vs {}); restoring anyway",
            snapshot.meta.schema_hash, current_hash
        ));
    }

    if snapshot.meta.prefix != options.prefix {
        plan.warnings.push(format!(
            "Snapshot was taken under prefix '{}'; restoring under '{}'",
            snapshot.meta.prefix, options.prefix
        ));
    }

    for service in options.services {
        if !snapshot.data.contains_key(service) {
            plan.warnings.push(format!(
                "Service '{}' is not in the snapshot; skipping it",
                service
            ));
        }
    }

    let env = options.target_env(snapshot);
    for (service, kv) in &snapshot.data {
        if !options.services.is_empty() && !options.services.contains(service) {
            continue;
        }
        let ctx = ProviderContext::new(options.prefix, service.as_str(), env);
        let current = provider.fetch(&ctx).await?;

        for (key, value) in kv {
            if adapter.resolve_path(schema, key).is_err() {
                plan.warnings.push(format!(
                    "Key '{}' of service '{}' is no longer in the schema; skipping it",
                    key, service
                ));
                continue;
            }
            let action = match current.get(key) {
                None => ChangeAction::Add,
                Some(existing) if existing != value => ChangeAction::Update,
                Some(_) => {
                    plan.unchanged += 1;
                    continue;
                }
            };
            plan.changes.push(Change {
                service: service.clone(),
                key: key.clone(),
                action,
                value: value.clone(),
            });
        }
    }

    Ok(plan)
}

/// Print the plan, gate on confirmation and apply it key by key.
pub async fn restore_snapshot(
    provider: &dyn Provider,
    adapter: &dyn SchemaAdapter,
    schema: &Schema,
    snapshot: &SnapshotV1,
    options: &RestoreOptions<'_>,
    confirmer: &dyn Confirmer,
    out: &mut dyn Write,
) -> Result<RestoreReport> {
    provider.check_guards(options.guards).await?;
    let plan = plan_restore(provider, adapter, schema, snapshot, options).await?;
    let env = options.target_env(snapshot);

    for warning in &plan.warnings {
        writeln!(out, "{} {}", "!".yellow(), warning)?;
    }
    print_changes(&plan, env, out)?;

    let mut report = RestoreReport {
        planned: plan.changes.len(),
        unchanged: plan.unchanged,
        dry_run: options.dry_run,
        ..Default::default()
    };

    if plan.changes.is_empty() {
        writeln!(out, "Nothing to restore.")?;
        return Ok(report);
    }
    if options.dry_run {
        writeln!(out, "Dry run: no changes applied.")?;
        return Ok(report);
    }
    if !options.confirm {
        if options.ci {
            return Err(ZenfigError::new(
                ErrorCode::ConfirmationRequired,
                "--confirm flag required in CI mode",
            )
            .with_remediation("Review the changes above, then rerun with --confirm"));
        }
        let question = format!("Apply {} changes to '{}'?", plan.changes.len(), env);
        if !confirmer.confirm(&question)? {
            writeln!(out, "Cancelled.")?;
            report.cancelled = true;
            return Ok(report);
        }
    }

    for change in &plan.changes {
        let ctx = ProviderContext::new(options.prefix, change.service.as_str(), env);
        if let Err(err) = provider.upsert(&ctx, &change.key, &change.value).await {
            return Err(err.with_problem(format!(
                "{} of {} changes were applied before this failure and were not rolled back",
                report.applied,
                plan.changes.len()
            )));
        }
        report.applied += 1;
        info!(service = %change.service, key = %change.key, "restored");
    }

    writeln!(
        out,
        "{} Restored {} keys ({} unchanged)",
        "✓".green(),
        report.applied,
        report.unchanged
    )?;
    Ok(report)
}

fn print_changes(plan: &RestorePlan, env: &str, out: &mut dyn Write) -> io::Result<()> {
    if plan.changes.is_empty() {
        return Ok(());
    }
    writeln!(out, "Changes to '{}':", env)?;
    for change in &plan.changes {
        let line = match change.action {
            ChangeAction::Add => format!("  + {}/{} (add)", change.service, change.key).green(),
            ChangeAction::Update => {
                format!("  ~ {}/{} (update)", change.service, change.key).yellow()
            }
        };
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Whether `dir` is matched by a `.gitignore` in it or one of its ancestors,
/// up to the repository root. Only plain directory patterns are understood.
pub fn is_vcs_ignored(dir: &Path) -> bool {
    let dir = match std::path::absolute(dir) {
        Ok(dir) => dir,
        Err(_) => return false,
    };

    for ancestor in dir.ancestors() {
        let rel = match dir.strip_prefix(ancestor) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => continue,
        };
        if let Ok(content) = fs::read_to_string(ancestor.join(".gitignore")) {
            let ignored = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
                .map(|line| {
                    line.trim_start_matches('/')
                        .trim_end_matches("/**")
                        .trim_end_matches("/*")
                        .trim_end_matches('/')
                })
                .any(|pattern| {
                    pattern == "*"
                        || (!rel.is_empty()
                            && (rel == pattern || rel.starts_with(&format!("{}/", pattern))))
                });
            if ignored {
                return true;
            }
        }
        if ancestor.join(".git").exists() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::MockProvider;
    use crate::schema::SchemaNode;
    use crate::schema::json_schema::JsonSchemaAdapter;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct Answer {
        yes: bool,
        asked: Cell<bool>,
    }

    impl Answer {
        fn new(yes: bool) -> Self {
            Self {
                yes,
                asked: Cell::new(false),
            }
        }
    }

    impl Confirmer for Answer {
        fn confirm(&self, _message: &str) -> Result<bool> {
            self.asked.set(true);
            Ok(self.yes)
        }
    }

    fn schema() -> Schema {
        Schema::new(SchemaNode::object([(
            "database",
            SchemaNode::object([("host", SchemaNode::String), ("port", SchemaNode::integer())]),
        )]))
        .unwrap()
    }

    fn services() -> Vec<String> {
        vec!["api".to_string()]
    }

    fn dev() -> ProviderContext {
        ProviderContext::new("/zenfig", "api", "dev")
    }

    async fn saved(provider: &MockProvider, dir: &TempDir) -> SavedSnapshot {
        let services = services();
        save_snapshot(
            provider,
            &JsonSchemaAdapter,
            &schema(),
            SaveOptions {
                prefix: "/zenfig",
                env: "dev",
                services: &services,
                guards: None,
                dir: dir.path().join("snapshots"),
                output: None,
            },
        )
        .await
        .unwrap()
    }

    fn options(services: &[String]) -> RestoreOptions<'_> {
        RestoreOptions {
            prefix: "/zenfig",
            env: None,
            services,
            guards: None,
            force: false,
            dry_run: false,
            confirm: true,
            ci: false,
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let provider =
            MockProvider::new().with_values(&dev(), &[("database.host", "h"), ("database.port", "5432")]);
        let saved = saved(&provider, &dir).await;

        assert!(saved.path.starts_with(dir.path().join("snapshots")));
        assert!(saved.path.file_name().unwrap().to_string_lossy().starts_with("dev-"));
        assert_eq!(saved.warnings.len(), 1);

        let loaded = load_snapshot(&saved.path).unwrap();
        assert_eq!(loaded, saved.snapshot);
        assert_eq!(loaded.data["api"]["database.port"], "5432");
        assert_eq!(loaded.meta.provider, "mock");
        assert!(loaded.meta.schema_hash.starts_with("sha256:"));

        let raw: Value = serde_json::from_str(&fs::read_to_string(&saved.path).unwrap()).unwrap();
        assert!(raw["meta"]["schemaHash"].is_string());
        assert_eq!(raw["layer"], "stored");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&saved.path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_rejects_unknown_version_and_layer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snap.json");

        fs::write(&path, r#"{"version": 2, "layer": "stored", "meta": {}, "data": {}}"#).unwrap();
        assert_eq!(load_snapshot(&path).unwrap_err().code(), ErrorCode::InvalidFormat);

        fs::write(&path, r#"{"version": 1, "layer": "rendered", "meta": {}, "data": {}}"#).unwrap();
        assert_eq!(load_snapshot(&path).unwrap_err().code(), ErrorCode::InvalidFormat);

        assert_eq!(
            load_snapshot(&dir.path().join("missing.json")).unwrap_err().code(),
            ErrorCode::FileSystem
        );
    }

    #[tokio::test]
    async fn test_restore_plans_adds_and_updates() {
        let dir = TempDir::new().unwrap();
        let provider =
            MockProvider::new().with_values(&dev(), &[("database.host", "h"), ("database.port", "5432")]);
        let snapshot = saved(&provider, &dir).await.snapshot;

        let target = MockProvider::new().with_values(&dev(), &[("database.host", "other")]);
        let services = services();
        let plan = plan_restore(&target, &JsonSchemaAdapter, &schema(), &snapshot, &options(&services))
            .await
            .unwrap();
        let actions: Vec<(&str, ChangeAction)> =
            plan.changes.iter().map(|c| (c.key.as_str(), c.action)).collect();
        assert_eq!(
            actions,
            vec![
                ("database.host", ChangeAction::Update),
                ("database.port", ChangeAction::Add),
            ]
        );
        assert!(plan.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_restore_warns_on_other_prefix() {
        let dir = TempDir::new().unwrap();
        let source = MockProvider::new().with_values(&dev(), &[("database.host", "h")]);
        let mut snapshot = saved(&source, &dir).await.snapshot;
        snapshot.meta.prefix = "/legacy".to_string();

        let target = MockProvider::new();
        let services = services();
        let plan = plan_restore(&target, &JsonSchemaAdapter, &schema(), &snapshot, &options(&services))
            .await
            .unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("'/legacy'"));
        assert!(plan.warnings[0].contains("'/zenfig'"));
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let dir = TempDir::new().unwrap();
        let source = MockProvider::new().with_values(&dev(), &[("database.host", "h")]);
        let snapshot = saved(&source, &dir).await.snapshot;

        let target = MockProvider::new();
        let services = services();
        let mut opts = options(&services);
        opts.dry_run = true;
        let mut out = Vec::new();
        let report = restore_snapshot(
            &target,
            &JsonSchemaAdapter,
            &schema(),
            &snapshot,
            &opts,
            &Answer::new(true),
            &mut out,
        )
        .await
        .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.planned, 1);
        assert_eq!(report.applied, 0);
        assert!(target.writes().is_empty());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("api/database.host (add)"));
        assert!(printed.contains("Dry run"));
    }

    #[tokio::test]
    async fn test_hash_mismatch_refuses_unless_forced() {
        let dir = TempDir::new().unwrap();
        let source = MockProvider::new().with_values(&dev(), &[("database.host", "h")]);
        let mut snapshot = saved(&source, &dir).await.snapshot;
        snapshot.meta.schema_hash = "sha256:0000".to_string();

        let target = MockProvider::new();
        let services = services();
        let err = plan_restore(&target, &JsonSchemaAdapter, &schema(), &snapshot, &options(&services))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SnapshotSchemaMismatch);
        assert_eq!(err.exit_code(), 5);

        let mut opts = options(&services);
        opts.force = true;
        let plan = plan_restore(&target, &JsonSchemaAdapter, &schema(), &snapshot, &opts)
            .await
            .unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert!(plan.warnings[0].contains("sha256:0000"));
    }

    #[tokio::test]
    async fn test_ci_requires_confirm_and_prompt_can_decline() {
        let dir = TempDir::new().unwrap();
        let source = MockProvider::new().with_values(&dev(), &[("database.host", "h")]);
        let snapshot = saved(&source, &dir).await.snapshot;
        let target = MockProvider::new();
        let services = services();

        let mut opts = options(&services);
        opts.confirm = false;
        opts.ci = true;
        let answer = Answer::new(true);
        let err = restore_snapshot(
            &target,
            &JsonSchemaAdapter,
            &schema(),
            &snapshot,
            &opts,
            &answer,
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfirmationRequired);
        assert_eq!(err.to_string(), "--confirm flag required in CI mode");
        assert!(!answer.asked.get());

        opts.ci = false;
        let answer = Answer::new(false);
        let report = restore_snapshot(
            &target,
            &JsonSchemaAdapter,
            &schema(),
            &snapshot,
            &opts,
            &answer,
            &mut Vec::new(),
        )
        .await
        .unwrap();
        assert!(answer.asked.get());
        assert!(report.cancelled);
        assert!(target.writes().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_reports_applied_count() {
        let dir = TempDir::new().unwrap();
        let source = MockProvider::new()
            .with_values(&dev(), &[("database.host", "h"), ("database.port", "1")]);
        let snapshot = saved(&source, &dir).await.snapshot;
        let target = MockProvider::new().failing_writes_after(1);
        let services = services();

        let err = restore_snapshot(
            &target,
            &JsonSchemaAdapter,
            &schema(),
            &snapshot,
            &options(&services),
            &Answer::new(true),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderUnavailable);
        assert!(err.diagnostic().problem.as_deref().unwrap().starts_with("1 of 2"));
        assert_eq!(target.writes(), vec!["upsert /zenfig/dev/api/database.host=h"]);
    }

    #[tokio::test]
    async fn test_restore_filters_services_and_skips_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let worker = ProviderContext::new("/zenfig", "worker", "dev");
        let source = MockProvider::new()
            .with_values(&dev(), &[("database.host", "h"), ("gone.key", "x")])
            .with_values(&worker, &[("database.host", "w")]);
        let all = vec!["api".to_string(), "worker".to_string()];
        let snapshot = save_snapshot(
            &source,
            &JsonSchemaAdapter,
            &schema(),
            SaveOptions {
                prefix: "/zenfig",
                env: "dev",
                services: &all,
                guards: None,
                dir: dir.path().to_path_buf(),
                output: Some(dir.path().join("snap.json")),
            },
        )
        .await
        .unwrap()
        .snapshot;

        let target = MockProvider::new();
        let only_api = services();
        let mut opts = options(&only_api);
        opts.env = Some("staging");
        let report = restore_snapshot(
            &target,
            &JsonSchemaAdapter,
            &schema(),
            &snapshot,
            &opts,
            &Answer::new(true),
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(target.writes(), vec!["upsert /zenfig/staging/api/database.host=h"]);
    }

    #[test]
    fn test_vcs_ignore_detection() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let snapshots = dir.path().join(".zenfig/snapshots");
        fs::create_dir_all(&snapshots).unwrap();
        assert!(!is_vcs_ignored(&snapshots));

        fs::write(dir.path().join(".gitignore"), "target/\n/.zenfig/\n").unwrap();
        assert!(is_vcs_ignored(&snapshots));

        fs::write(dir.path().join(".gitignore"), "# nothing\n.zenfig/snapshots/**\n").unwrap();
        assert!(is_vcs_ignored(&snapshots));
    }
}
