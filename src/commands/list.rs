use crate::error::Result;
use crate::provider::Provider;
use crate::zenfig::Zenfig;
use colored::Colorize;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct ListOptions<'a> {
    pub env: Option<&'a str>,
    pub services: &'a [String],
    /// Print values instead of `***`
    pub show_values: bool,
}

/// One stored key as `list` shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedKey {
    pub service: String,
    pub key: String,
    pub value: String,
    pub known: bool,
}

impl Zenfig {
    /// Stored keys of each service, canonicalized where the schema knows
    /// them and marked where it does not.
    pub async fn list(
        &self,
        provider: &dyn Provider,
        options: &ListOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<Vec<ListedKey>> {
        let env = self.resolve_env(options.env)?;
        let services = self.resolve_services(options.services)?;
        provider.check_guards(self.guards()).await?;

        let mut listed = Vec::new();
        for service in &services {
            let ctx = self.context(service, &env);
            let kv = provider.fetch(&ctx).await?;
            writeln!(out, "{} ({} keys)", ctx.to_string().bold(), kv.len())?;

            for (key, value) in kv {
                let (key, known) = match self.adapter().resolve_path(self.schema(), &key) {
                    Ok(resolved) => (resolved.canonical_path, true),
                    Err(_) => (key, false),
                };
                let shown = if options.show_values { value.as_str() } else { "***" };
                if known {
                    writeln!(out, "  {} = {}", key, shown)?;
                } else {
                    writeln!(out, "  {} = {} {}", key, shown, "(not in schema)".yellow())?;
                }
                listed.push(ListedKey {
                    service: service.clone(),
                    key,
                    value,
                    known,
                });
            }
        }
        Ok(listed)
    }
}
