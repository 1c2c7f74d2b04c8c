use super::{print_warnings, use_color};
use crate::diff::{self, DiffRequest, DiffResult};
use crate::error::Result;
use crate::kv::StoredRequest;
use crate::provider::Provider;
use crate::render::Renderer;
use crate::zenfig::Zenfig;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DiffOptions<'a> {
    pub env: Option<&'a str>,
    pub services: &'a [String],
    pub strict: bool,
    /// Overrides `[render] template`
    pub template: Option<&'a Path>,
    pub show_values: bool,
    /// Print the result as JSON instead of a listing
    pub json: bool,
}

impl Zenfig {
    /// Compare the stored configuration with what the template renders.
    pub async fn diff(
        &self,
        provider: &dyn Provider,
        renderer: &dyn Renderer,
        options: &DiffOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<DiffResult> {
        let env = self.resolve_env(options.env)?;
        let services = self.resolve_services(options.services)?;
        let template = self.template(options.template)?;

        let mut result = diff::execute_diff(
            provider,
            self.adapter(),
            self.schema(),
            renderer,
            DiffRequest {
                stored: StoredRequest {
                    prefix: self.prefix(),
                    env: &env,
                    services: &services,
                    guards: self.guards(),
                    strict: self.strict(options.strict),
                },
                template: &template,
            },
        )
        .await?;
        print_warnings(&result.warnings);

        if options.json {
            if !options.show_values {
                for entry in &mut result.entries {
                    entry.stored = None;
                    entry.rendered = None;
                }
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        } else {
            write!(
                out,
                "{}",
                diff::format_diff(&result, options.show_values, use_color())
            )?;
        }
        Ok(result)
    }
}
