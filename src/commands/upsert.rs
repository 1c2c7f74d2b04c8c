use super::print_warnings;
use crate::error::{ErrorCode, Result, ZenfigError};
use crate::provider::Provider;
use crate::schema::ParseMode;
use crate::schema::validate::validate_node;
use crate::zenfig::Zenfig;
use colored::Colorize;
use std::io::Write;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct UpsertOptions<'a> {
    pub env: Option<&'a str>,
    pub service: Option<&'a str>,
    pub key: &'a str,
    /// Prompted for with hidden input when `None`
    pub value: Option<String>,
    pub mode: ParseMode,
}

impl Zenfig {
    /// Parse, validate and store one value. Returns the canonical key.
    pub async fn upsert(
        &self,
        provider: &dyn Provider,
        options: UpsertOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<String> {
        let env = self.resolve_env(options.env)?;
        let service = self.resolve_service(options.service)?;
        let resolved = self.adapter().resolve_path(self.schema(), options.key)?;
        let key = resolved.canonical_path.clone();

        if let Some(children) = resolved.schema.normalize().properties() {
            return Err(ZenfigError::validation(
                ErrorCode::TypeMismatch,
                &key,
                format!("'{}' is an object; set its keys one at a time", key),
            )
            .with_available_keys(
                children
                    .iter()
                    .map(|p| format!("{}.{}", key, p.name))
                    .collect(),
            ));
        }

        let raw = match options.value {
            Some(value) => value,
            None => rpassword::prompt_password(format!(
                "Enter value for {} ({}/{}): ",
                key, env, service
            ))?,
        };

        let parsed = self
            .adapter()
            .parse_value(&raw, resolved.schema, &key, options.mode)?;
        let valid = validate_node(&parsed, resolved.schema, &key)?;
        let stored = self.adapter().serialize_value(&valid, resolved.schema);
        debug!(key = %key, node = %self.adapter().describe_node(resolved.schema), "upserting");

        provider.check_guards(self.guards()).await?;
        let ctx = self.context(&service, &env);
        provider.upsert(&ctx, &key, &stored).await?;

        if !provider.capabilities().secure_write {
            print_warnings(&[format!(
                "Provider '{}' stores values unencrypted",
                provider.name()
            )]);
        }
        writeln!(
            out,
            "{} Stored {} in {} ({})",
            "✓".green(),
            key,
            ctx,
            provider.name()
        )?;
        Ok(key)
    }
}
