use crate::error::Result;
use crate::provider::Provider;
use crate::zenfig::Zenfig;
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions<'a> {
    pub env: Option<&'a str>,
    pub service: Option<&'a str>,
    pub key: &'a str,
    /// Delete a key verbatim even when the schema does not know it
    pub force: bool,
}

impl Zenfig {
    /// Remove one stored key. Returns the key that was deleted.
    pub async fn delete(
        &self,
        provider: &dyn Provider,
        options: DeleteOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<String> {
        let env = self.resolve_env(options.env)?;
        let service = self.resolve_service(options.service)?;
        let key = match self.adapter().resolve_path(self.schema(), options.key) {
            Ok(resolved) => resolved.canonical_path,
            Err(_) if options.force => options.key.to_string(),
            Err(err) => {
                return Err(err.with_remediation(
                    "Pass --force to delete a stored key that is not in the schema",
                ));
            }
        };

        provider.check_guards(self.guards()).await?;
        let ctx = self.context(&service, &env);
        provider.delete(&ctx, &key).await?;
        writeln!(out, "{} Deleted {} from {}", "✓".green(), key, ctx)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::error::ErrorCode;
    use crate::provider::ProviderContext;
    use crate::provider::tests::MockProvider;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_delete_known_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let ctx = ProviderContext::new("/zenfig", "api", "dev");
        let provider =
            MockProvider::new().with_values(&ctx, &[("database.host", "h"), ("legacy.flag", "1")]);

        let key = app
            .delete(
                &provider,
                DeleteOptions {
                    key: "Database.Host",
                    ..Default::default()
                },
                &mut Vec::new(),
            )
            .await
            .unwrap();
        assert_eq!(key, "database.host");

        let err = app
            .delete(
                &provider,
                DeleteOptions {
                    key: "legacy.flag",
                    ..Default::default()
                },
                &mut Vec::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownKey);

        app.delete(
            &provider,
            DeleteOptions {
                key: "legacy.flag",
                force: true,
                ..Default::default()
            },
            &mut Vec::new(),
        )
        .await
        .unwrap();
        assert!(provider.stored().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_parameter() {
        let dir = TempDir::new().unwrap();
        let app = testing::app(&dir);
        let err = app
            .delete(
                &MockProvider::new(),
                DeleteOptions {
                    key: "database.host",
                    ..Default::default()
                },
                &mut Vec::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParameterNotFound);
    }
}
