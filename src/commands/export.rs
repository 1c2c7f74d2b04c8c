use super::print_warnings;
use crate::error::Result;
use crate::kv::{self, StoredRequest};
use crate::provider::Provider;
use crate::tree;
use crate::zenfig::Zenfig;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    /// Nested JSON document
    #[default]
    Json,
    /// `KEY=value` lines, one per leaf
    Env,
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions<'a> {
    pub env: Option<&'a str>,
    pub services: &'a [String],
    pub strict: bool,
    pub format: ExportFormat,
}

impl Zenfig {
    /// The merged, validated configuration with schema defaults applied.
    pub async fn export_value(
        &self,
        provider: &dyn Provider,
        options: &ExportOptions<'_>,
    ) -> Result<Value> {
        let env = self.resolve_env(options.env)?;
        let services = self.resolve_services(options.services)?;
        let stored = kv::load_stored(
            provider,
            self.adapter(),
            self.schema(),
            StoredRequest {
                prefix: self.prefix(),
                env: &env,
                services: &services,
                guards: self.guards(),
                strict: self.strict(options.strict),
            },
        )
        .await?;
        if let Some(err) = stored.errors.into_iter().next() {
            return Err(err);
        }
        print_warnings(&stored.warnings);

        self.adapter().validate(&stored.value, self.schema())
    }

    pub async fn export(
        &self,
        provider: &dyn Provider,
        options: &ExportOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let value = self.export_value(provider, options).await?;
        match options.format {
            ExportFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
            ExportFormat::Env => {
                for (name, raw) in self.env_pairs(&value) {
                    writeln!(out, "{}={}", name, shell_quote(&raw))?;
                }
            }
        }
        Ok(())
    }

    /// Every non-null schema leaf in `value` as an environment variable,
    /// sorted by name.
    fn env_pairs(&self, value: &Value) -> BTreeMap<String, String> {
        self.adapter()
            .get_all_leaf_paths(self.schema())
            .into_iter()
            .filter_map(|leaf| {
                let leaf_value = tree::get_path(value, &leaf.path).filter(|v| !v.is_null())?;
                Some((
                    env_var_name(&leaf.path),
                    self.adapter().serialize_value(leaf_value, leaf.schema),
                ))
            })
            .collect()
    }
}

/// `database.maxRetries` -> `DATABASE_MAX_RETRIES`
pub fn env_var_name(path: &str) -> String {
    let mut name = String::with_capacity(path.len() + 4);
    let mut previous: Option<char> = None;
    for c in path.chars() {
        match c {
            '.' | '-' => name.push('_'),
            c if c.is_ascii_uppercase()
                && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) =>
            {
                name.push('_');
                name.push(c);
            }
            c if c.is_ascii_alphanumeric() || c == '_' => name.push(c.to_ascii_uppercase()),
            _ => name.push('_'),
        }
        previous = Some(c);
    }
    name
}

fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@,+".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
