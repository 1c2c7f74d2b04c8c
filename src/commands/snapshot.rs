use super::print_warnings;
use crate::error::Result;
use crate::provider::Provider;
use crate::snapshot::{
    self, Confirmer, RestoreOptions, RestoreReport, SaveOptions, SavedSnapshot,
};
use crate::zenfig::Zenfig;
use colored::Colorize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SnapshotSaveOptions<'a> {
    pub env: Option<&'a str>,
    pub services: &'a [String],
    /// Write here instead of a timestamped file in `[snapshot] dir`
    pub output: Option<&'a Path>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotRestoreOptions<'a> {
    /// Restore into this env instead of the snapshot's own
    pub env: Option<&'a str>,
    pub services: &'a [String],
    pub force_schema_mismatch: bool,
    pub dry_run: bool,
    pub confirm: bool,
    pub ci: bool,
}

impl Zenfig {
    pub async fn snapshot_save(
        &self,
        provider: &dyn Provider,
        options: &SnapshotSaveOptions<'_>,
        out: &mut dyn Write,
    ) -> Result<SavedSnapshot> {
        let env = self.resolve_env(options.env)?;
        let services = self.resolve_services(options.services)?;
        let saved = snapshot::save_snapshot(
            provider,
            self.adapter(),
            self.schema(),
            SaveOptions {
                prefix: self.prefix(),
                env: &env,
                services: &services,
                guards: self.guards(),
                dir: self.snapshot_dir(),
                output: options.output.map(Path::to_path_buf),
            },
        )
        .await?;
        print_warnings(&saved.warnings);

        let keys: usize = saved.snapshot.data.values().map(|kv| kv.len()).sum();
        writeln!(
            out,
            "{} Saved {} keys from {} service(s) to {}",
            "✓".green(),
            keys,
            services.len(),
            saved.path.display()
        )?;
        Ok(saved)
    }

    pub async fn snapshot_restore(
        &self,
        provider: &dyn Provider,
        file: &Path,
        options: &SnapshotRestoreOptions<'_>,
        confirmer: &dyn Confirmer,
        out: &mut dyn Write,
    ) -> Result<RestoreReport> {
        let env = options.env.map(|e| self.resolve_env(Some(e))).transpose()?;
        let snapshot = snapshot::load_snapshot(file)?;
        snapshot::restore_snapshot(
            provider,
            self.adapter(),
            self.schema(),
            &snapshot,
            &RestoreOptions {
                prefix: self.prefix(),
                env: env.as_deref(),
                services: options.services,
                guards: self.guards(),
                force: options.force_schema_mismatch,
                dry_run: options.dry_run,
                confirm: options.confirm,
                ci: options.ci,
            },
            confirmer,
            out,
        )
        .await
    }
}
