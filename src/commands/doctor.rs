use crate::error::Result;
use crate::render::Renderer;
use crate::snapshot::is_vcs_ignored;
use crate::zenfig::{CONFIG_FILE, Zenfig, project_root};
use colored::Colorize;
use std::convert::TryFrom;
use std::io::Write;
use std::path::Path;
use zenfig_core::{Config, GlobalConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    /// False when any check failed; warnings do not count.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    pub fn status_of(&self, name: &str) -> Option<CheckStatus> {
        self.checks.iter().find(|c| c.name == name).map(|c| c.status)
    }

    fn record(
        &mut self,
        out: &mut dyn Write,
        name: &'static str,
        status: CheckStatus,
        detail: impl Into<String>,
    ) -> Result<()> {
        let detail = detail.into();
        let mark = match status {
            CheckStatus::Pass => "✓".green(),
            CheckStatus::Warn => "○".yellow(),
            CheckStatus::Fail => "✗".red(),
        };
        writeln!(out, "{} {} - {}", mark, name, detail)?;
        self.checks.push(DoctorCheck {
            name,
            status,
            detail,
        });
        Ok(())
    }
}

/// Check the project, schema, provider, guards, renderer and snapshot
/// directory, printing one line per check. Stops early when the project or
/// schema cannot be loaded since every later check depends on them.
pub async fn doctor(
    config_path: Option<&Path>,
    provider_arg: Option<&str>,
    out: &mut dyn Write,
) -> Result<DoctorReport> {
    use CheckStatus::*;

    let mut report = DoctorReport::default();
    let path = config_path.unwrap_or_else(|| Path::new(CONFIG_FILE));

    let config = match Config::try_from(path) {
        Ok(config) => {
            report.record(
                out,
                "config",
                Pass,
                format!("{} (project {})", path.display(), config.project.name),
            )?;
            config
        }
        Err(e) => {
            report.record(out, "config", Fail, format!("{}: {}", path.display(), e))?;
            return Ok(report);
        }
    };

    let global_config = match GlobalConfig::load() {
        Ok(global) => global,
        Err(e) => {
            report.record(out, "global config", Warn, e.to_string())?;
            None
        }
    };

    let app = match Zenfig::new(config, project_root(path), global_config) {
        Ok(app) => {
            let leaves = app.adapter().get_all_leaf_paths(app.schema()).len();
            report.record(
                out,
                "schema",
                Pass,
                format!(
                    "{} with {} keys, {}",
                    app.adapter().name(),
                    leaves,
                    app.adapter().compute_schema_hash(app.schema())
                ),
            )?;
            app
        }
        Err(e) => {
            report.record(out, "schema", Fail, e.to_string())?;
            return Ok(report);
        }
    };

    match app.provider(provider_arg) {
        Ok(provider) => {
            let caps = provider.capabilities();
            report.record(
                out,
                "provider",
                if caps.secure_write { Pass } else { Warn },
                format!(
                    "{} (secure write: {}, encryption check: {}, transactions: {})",
                    provider.name(),
                    yes_no(caps.secure_write),
                    yes_no(caps.encryption_verification),
                    yes_no(caps.transactions)
                ),
            )?;
            match app.guards() {
                None => report.record(out, "guards", Warn, "no [provider.guards] declared")?,
                Some(guards) => match provider.check_guards(Some(guards)).await {
                    Ok(()) => report.record(out, "guards", Pass, "live identity matches")?,
                    Err(e) => report.record(out, "guards", Fail, e.to_string())?,
                },
            }
        }
        Err(e) => report.record(out, "provider", Fail, e.to_string())?,
    }

    let renderer = app.renderer();
    match renderer.version().await {
        Ok(version) => report.record(out, "renderer", Pass, version)?,
        Err(e) => report.record(out, "renderer", Fail, e.to_string())?,
    }
    match app.template(None) {
        Ok(template) if template.is_file() => {
            report.record(out, "template", Pass, template.display().to_string())?
        }
        Ok(template) => report.record(
            out,
            "template",
            Fail,
            format!("{} does not exist", template.display()),
        )?,
        Err(_) => report.record(out, "template", Warn, "no [render] template; diff is unavailable")?,
    }

    let dir = app.snapshot_dir();
    if is_vcs_ignored(&dir) {
        report.record(out, "snapshots", Pass, format!("{} is git-ignored", dir.display()))?;
    } else {
        report.record(
            out,
            "snapshots",
            Warn,
            format!("{} is not in .gitignore", dir.display()),
        )?;
    }

    Ok(report)
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
