use super::{print_warnings, use_color};
use crate::error::{ErrorCode, Result, ZenfigError, format_error};
use crate::kv::{self, StoredRequest};
use crate::provider::Provider;
use crate::schema::validate::unknown_keys;
use crate::zenfig::Zenfig;
use colored::Colorize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ValidateOptions<'a> {
    pub env: Option<&'a str>,
    pub services: &'a [String],
    pub strict: bool,
}

impl Zenfig {
    /// Validate the stored configuration, reporting every problem.
    pub async fn validate_stored(
        &self,
        provider: &dyn Provider,
        options: &ValidateOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let env = self.resolve_env(options.env)?;
        let services = self.resolve_services(options.services)?;
        let strict = self.strict(options.strict);
        let stored = kv::load_stored(
            provider,
            self.adapter(),
            self.schema(),
            StoredRequest {
                prefix: self.prefix(),
                env: &env,
                services: &services,
                guards: self.guards(),
                strict: false,
            },
        )
        .await?;

        // Collect unknown keys and conflicts as errors here rather than
        // failing on the first.
        let mut errors = stored.errors;
        let mut warnings = stored.warnings;
        if strict {
            for (service, key) in &stored.unknown_keys {
                errors.push(kv::unknown_key_error(self.adapter(), self.schema(), service, key));
            }
            errors.extend(stored.overrides.iter().map(|o| o.to_error()));
        }
        self.report_validation(&stored.value, errors, warnings, out)
    }

    /// Validate a local JSON document instead of the store.
    pub fn validate_file(&self, path: &Path, strict: bool, out: &mut dyn Write) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            ZenfigError::new(
                ErrorCode::FileSystem,
                format!("Cannot read {}: {}", path.display(), e),
            )
            .with_source(e)
        })?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| ZenfigError::from(e).with_path(path.display().to_string()))?;

        let strict = self.strict(strict);
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for key in unknown_keys(&value, self.schema()) {
            if strict {
                errors.push(
                    ZenfigError::validation(ErrorCode::UnknownKey, &key, "Key is not in the schema")
                        .with_problem(format!("{} declares a key the schema does not", path.display())),
                );
            } else {
                warnings.push(format!("Unknown key '{}' is not in the schema", key));
            }
        }
        self.report_validation(&value, errors, warnings, out)
    }

    fn report_validation(
        &self,
        value: &Value,
        mut errors: Vec<ZenfigError>,
        warnings: Vec<String>,
        out: &mut dyn Write,
    ) -> Result<()> {
        print_warnings(&warnings);
        // A value that failed to parse is absent from the tree; its parse
        // error already covers it.
        let unparsed: HashSet<String> = errors
            .iter()
            .filter_map(|e| e.path().map(str::to_string))
            .collect();
        errors.extend(
            self.adapter()
                .validate_all(value, self.schema())
                .errors
                .into_iter()
                .filter(|e| {
                    e.code() != ErrorCode::MissingRequired
                        || !e.path().is_some_and(|p| unparsed.contains(p))
                }),
        );

        if errors.is_empty() {
            writeln!(out, "{} Configuration is valid", "✓".green())?;
            return Ok(());
        }

        let color = use_color();
        for err in &errors {
            writeln!(out, "{}", format_error(err, color))?;
        }
        Err(ZenfigError::new(
            errors[0].code(),
            format!("Validation failed with {} error(s)", errors.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ExportOptions, testing};
    use crate::provider::ProviderContext;
    use crate::provider::tests::MockProvider;
    use tempfile::TempDir;

    fn provider(values: &[(&str, &str)]) -> MockProvider {
        MockProvider::new().with_values(&ProviderContext::new("/zenfig", "api", "dev"), values)
    }

    #[tokio::test]
    async fn test_validate_reports_every_error() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let provider = provider(&[("database.port", "not-a-number"), ("api.debug", "yes")]);

        let mut out = Vec::new();
        let err = app
            .validate_stored(&provider, &ValidateOptions::default(), &mut out)
            .await
            .unwrap_err();
        let printed = String::from_utf8(out).unwrap();

        // Two parse failures, then the missing host; the unparsed port is
        // reported once.
        assert!(err.to_string().contains("3 error(s)"));
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
        assert!(printed.contains("[VAL001]: database.port"));
        assert!(printed.contains("[VAL001]: api.debug"));
        assert!(printed.contains("[VAL003]: database.host"));
        assert!(!printed.contains("[VAL003]: database.port"));
    }

    #[tokio::test]
    async fn test_validate_unknown_key_strictness() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let provider = provider(&[
            ("database.host", "h"),
            ("database.port", "5432"),
            ("extra.path", "x"),
        ]);

        let mut out = Vec::new();
        app.validate_stored(&provider, &ValidateOptions::default(), &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Configuration is valid"));

        let err = app
            .validate_stored(
                &provider,
                &ValidateOptions {
                    strict: true,
                    ..Default::default()
                },
                &mut Vec::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownKey);
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_validate_strict_reports_conflicts_like_export() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let provider = MockProvider::new()
            .with_values(
                &ProviderContext::new("/zenfig", "api", "dev"),
                &[("database.host", "api-db"), ("database.port", "5432")],
            )
            .with_values(
                &ProviderContext::new("/zenfig", "worker", "dev"),
                &[("database.host", "worker-db")],
            );
        let services = vec!["api".to_string(), "worker".to_string()];

        // Without strict the later service wins.
        let mut out = Vec::new();
        app.validate_stored(
            &provider,
            &ValidateOptions {
                services: &services,
                ..Default::default()
            },
            &mut out,
        )
        .await
        .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Configuration is valid"));

        let mut out = Vec::new();
        let err = app
            .validate_stored(
                &provider,
                &ValidateOptions {
                    services: &services,
                    strict: true,
                    ..Default::default()
                },
                &mut out,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MergeConflict);
        assert!(err.to_string().contains("1 error(s)"));
        assert!(String::from_utf8(out).unwrap().contains("[VAL005]: database.host"));

        let export_err = app
            .export_value(
                &provider,
                &ExportOptions {
                    services: &services,
                    strict: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(export_err.code(), err.code());
    }

    #[test]
    fn test_validate_file() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"database": {"host": "h", "port": 5432}, "extra": {"path": 1}}"#)
            .unwrap();
        app.validate_file(&path, false, &mut Vec::new()).unwrap();
        let err = app.validate_file(&path, true, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownKey);

        fs::write(&path, r#"{"database": {"host": "h", "port": 0}}"#).unwrap();
        let err = app.validate_file(&path, false, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstraintViolation);

        fs::write(&path, "not json").unwrap();
        let err = app.validate_file(&path, false, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidFormat);
    }
}
