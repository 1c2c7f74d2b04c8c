//! Template rendering through an external Jsonnet-compatible binary.
//!
//! The renderer is invoked as
//!
//! ```text
//! <bin> --ext-code-file secrets=<tmpfile> --ext-str env=<env> [--ext-code defaults=<json>] <template>
//! ```
//!
//! and must print a single JSON object on stdout.

use crate::error::{ErrorCode, Result, ZenfigError};
use async_trait::async_trait;
use serde_json::Value;
use std::io::{self, Write};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Inputs of one render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub template: &'a Path,
    pub env: &'a str,
    /// Stored configuration, exposed to the template as `std.extVar('secrets')`
    pub secrets: &'a Value,
    /// Schema defaults, exposed as `std.extVar('defaults')`
    pub defaults: Option<&'a Value>,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the template into the desired configuration tree.
    async fn render(&self, request: RenderRequest<'_>) -> Result<Value>;

    /// Version string of the underlying tool, used by `doctor`.
    async fn version(&self) -> Result<String>;
}

/// Runs a Jsonnet binary as a subprocess with a hard timeout.
#[derive(Debug, Clone)]
pub struct JsonnetRenderer {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl JsonnetRenderer {
    /// `bin` may carry leading arguments, e.g. `"jsonnet -J vendor"`.
    pub fn new(bin: &str, timeout: Duration) -> Self {
        let mut parts = bin.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            leading_args: parts.collect(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: io::Error) -> ZenfigError {
        if err.kind() == io::ErrorKind::NotFound {
            ZenfigError::new(
                ErrorCode::RendererNotFound,
                format!("Renderer '{}' is not installed or not on PATH", self.program),
            )
            .with_remediation("Install jsonnet (or go-jsonnet) or set [render] bin in zenfig.toml")
            .with_example("bin = \"jsonnet\"")
            .with_source(err)
        } else {
            ZenfigError::new(
                ErrorCode::RendererNotFound,
                format!("Cannot start renderer '{}': {}", self.program, err),
            )
            .with_source(err)
        }
    }
}

#[async_trait]
impl Renderer for JsonnetRenderer {
    async fn render(&self, request: RenderRequest<'_>) -> Result<Value> {
        if !request.template.is_file() {
            return Err(ZenfigError::new(
                ErrorCode::FileSystem,
                format!("Template {} not found", request.template.display()),
            )
            .with_remediation("Set [render] template in zenfig.toml or pass --template"));
        }

        // Owner-only temp file, removed when dropped.
        let mut secrets_file = tempfile::Builder::new()
            .prefix("zenfig-secrets-")
            .suffix(".json")
            .tempfile()?;
        secrets_file.write_all(serde_json::to_string(request.secrets)?.as_bytes())?;
        secrets_file.flush()?;

        let mut cmd = self.command();
        cmd.arg("--ext-code-file")
            .arg(format!("secrets={}", secrets_file.path().display()))
            .arg("--ext-str")
            .arg(format!("env={}", request.env));
        if let Some(defaults) = request.defaults {
            cmd.arg("--ext-code")
                .arg(format!("defaults={}", serde_json::to_string(defaults)?));
        }
        cmd.arg(request.template);

        debug!(program = %self.program, template = %request.template.display(), "rendering");
        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(ZenfigError::new(
                    ErrorCode::RenderTimeout,
                    format!(
                        "Renderer did not finish within {} ms",
                        self.timeout.as_millis()
                    ),
                )
                .with_remediation("Raise [render] timeout_ms or simplify the template"));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(stderr.trim()));
        }

        parse_output(&output.stdout)
    }

    async fn version(&self) -> Result<String> {
        let mut cmd = self.command();
        cmd.arg("--version");
        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let output = tokio::time::timeout(Duration::from_secs(5), child.wait_with_output())
            .await
            .map_err(|_| ZenfigError::new(ErrorCode::RenderTimeout, "Renderer --version timed out"))??;
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }
}

/// Map a renderer's stderr to the matching `RND` code.
pub(crate) fn classify_failure(stderr: &str) -> ZenfigError {
    let lower = stderr.to_lowercase();
    let (code, summary, remediation) = if lower.contains("undefined external variable") {
        (
            ErrorCode::MissingExternalVariable,
            "Template references an external variable that is not provided",
            "Only 'secrets', 'env' and 'defaults' are passed to the template",
        )
    } else if lower.contains("static error") || lower.contains("syntax error") {
        (
            ErrorCode::TemplateSyntax,
            "Template has a syntax error",
            "Fix the template; `jsonnet fmt --test` helps spot syntax problems",
        )
    } else {
        (
            ErrorCode::TemplateRuntime,
            "Template failed while evaluating",
            "Check the template logic against the stored values",
        )
    };
    ZenfigError::new(code, summary)
        .with_problem(stderr.lines().next().unwrap_or("").to_string())
        .with_remediation(remediation)
}

fn parse_output(stdout: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(stdout).map_err(|e| {
        ZenfigError::new(ErrorCode::RenderOutput, "Renderer output is not valid JSON")
            .with_problem(e.to_string())
    })?;
    if !value.is_object() {
        return Err(
            ZenfigError::new(ErrorCode::RenderOutput, "Renderer output must be a JSON object")
                .with_expected("object")
                .with_received(match value {
                    Value::Array(_) => "array",
                    Value::String(_) => "string",
                    Value::Number(_) => "number",
                    Value::Bool(_) => "boolean",
                    _ => "null",
                }),
        );
    }
    Ok(value)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    /// Fake renderer: a shell script run through `sh` so the freshly written
    /// file never needs to be executable.
    fn fake_renderer(dir: &TempDir, body: &str, timeout: Duration) -> JsonnetRenderer {
        let script = dir.path().join("fake-jsonnet.sh");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        JsonnetRenderer::new(&format!("sh {}", script.display()), timeout)
    }

    fn template(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("config.jsonnet");
        fs::write(&path, "{}").unwrap();
        path
    }

    async fn run(renderer: &JsonnetRenderer, template: &Path) -> Result<Value> {
        renderer
            .render(RenderRequest {
                template,
                env: "prod",
                secrets: &json!({ "database": { "host": "db" } }),
                defaults: Some(&json!({ "api": { "maxRetries": 3 } })),
            })
            .await
    }

    #[tokio::test]
    async fn test_passes_secrets_env_and_defaults() {
        let dir = TempDir::new().unwrap();
        // $2 = secrets=<file>, $4 = env=<env>, $6 = defaults=<json>
        let renderer = fake_renderer(
            &dir,
            r#"printf '{"env":"%s","secrets":%s,"defaults":%s}' "${4#env=}" "$(cat "${2#secrets=}")" "${6#defaults=}""#,
            Duration::from_secs(10),
        );
        let rendered = run(&renderer, &template(&dir)).await.unwrap();
        assert_eq!(
            rendered,
            json!({
                "env": "prod",
                "secrets": { "database": { "host": "db" } },
                "defaults": { "api": { "maxRetries": 3 } }
            })
        );
    }

    #[tokio::test]
    async fn test_failures_are_classified() {
        let dir = TempDir::new().unwrap();
        let tpl = template(&dir);
        let cases = [
            (
                "echo 'STATIC ERROR: config.jsonnet:1:3: expected token' >&2; exit 1",
                ErrorCode::TemplateSyntax,
            ),
            (
                "echo 'RUNTIME ERROR: undefined external variable: region' >&2; exit 1",
                ErrorCode::MissingExternalVariable,
            ),
            (
                "echo 'RUNTIME ERROR: division by zero.' >&2; exit 1",
                ErrorCode::TemplateRuntime,
            ),
            ("echo '[1, 2]'", ErrorCode::RenderOutput),
            ("echo 'not json'", ErrorCode::RenderOutput),
        ];
        for (body, expected) in cases {
            let renderer = fake_renderer(&dir, body, Duration::from_secs(10));
            let err = run(&renderer, &tpl).await.unwrap_err();
            assert_eq!(err.code(), expected, "script: {}", body);
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let renderer = fake_renderer(&dir, "sleep 5", Duration::from_millis(100));
        let err = run(&renderer, &template(&dir)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RenderTimeout);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = TempDir::new().unwrap();
        let renderer = JsonnetRenderer::new("zenfig-no-such-renderer", Duration::from_secs(1));
        let err = run(&renderer, &template(&dir)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RendererNotFound);
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = TempDir::new().unwrap();
        let renderer = fake_renderer(&dir, "echo '{}'", Duration::from_secs(1));
        let err = run(&renderer, &dir.path().join("nope.jsonnet")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileSystem);
    }

    #[tokio::test]
    async fn test_version() {
        let dir = TempDir::new().unwrap();
        let renderer = fake_renderer(&dir, "echo 'Jsonnet commandline interpreter v0.20.0'", Duration::from_secs(1));
        assert!(renderer.version().await.unwrap().contains("v0.20.0"));
    }
}
