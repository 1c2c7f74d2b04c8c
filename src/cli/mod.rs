use crate::commands::{
    self, DeleteOptions, DiffOptions, ExportFormat, ExportOptions, ListOptions,
    SnapshotRestoreOptions, SnapshotSaveOptions, UpsertOptions, ValidateOptions,
};
use crate::diff::reveal_values;
use crate::error::{Result, format_error};
use crate::schema::ParseMode;
use crate::snapshot::PromptConfirmer;
use crate::zenfig::{Zenfig, is_ci};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Main CLI structure for the zenfig application.
#[derive(Parser)]
#[command(name = "zenfig")]
#[command(about = "Typed configuration and secrets for every environment", long_about = None)]
#[command(version)]
struct Cli {
    /// Project file to use instead of ./zenfig.toml
    #[arg(short, long, global = true, env = "ZENFIG_CONFIG")]
    config: Option<PathBuf>,
    /// Log more (-v debug, -vv trace); ZENFIG_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Non-interactive mode; also enabled by the CI environment variable
    #[arg(long, global = true)]
    ci: bool,
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Where a command reads from or writes to.
#[derive(Args)]
struct Target {
    /// Environment to use
    #[arg(short, long, env = "ZENFIG_ENV")]
    env: Option<String>,
    /// Services to read, later ones overriding earlier ones
    #[arg(short = 's', long = "service", env = "ZENFIG_SERVICES", value_delimiter = ',')]
    services: Vec<String>,
    /// Provider URI to use
    #[arg(short, long, env = "ZENFIG_PROVIDER")]
    provider: Option<String>,
}

/// Like [`Target`], for commands that write to exactly one service.
#[derive(Args)]
struct SingleTarget {
    /// Environment to use
    #[arg(short, long, env = "ZENFIG_ENV")]
    env: Option<String>,
    /// Service to write to
    #[arg(short, long, env = "ZENFIG_SERVICE")]
    service: Option<String>,
    /// Provider URI to use
    #[arg(short, long, env = "ZENFIG_PROVIDER")]
    provider: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged, validated configuration
    Export {
        #[command(flatten)]
        target: Target,
        #[arg(short, long, value_enum, default_value_t)]
        format: ExportFormat,
        /// Fail on keys that are not in the schema
        #[arg(long)]
        strict: bool,
    },
    /// Set one value
    Upsert {
        /// Dotted key, e.g. database.port
        key: String,
        /// Value to store (will prompt if not provided)
        value: Option<String>,
        /// How to read the value: auto, string, int, float, bool or json
        #[arg(short = 't', long = "type", default_value = "auto")]
        mode: ParseMode,
        #[command(flatten)]
        target: SingleTarget,
    },
    /// Remove one value
    Delete {
        key: String,
        /// Delete even when the key is not in the schema
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        target: SingleTarget,
    },
    /// List stored keys
    List {
        #[command(flatten)]
        target: Target,
        /// Show values instead of ***
        #[arg(long)]
        unlock: bool,
    },
    /// Validate the stored configuration, or a local JSON file
    Validate {
        #[command(flatten)]
        target: Target,
        /// Validate this JSON document instead of the store
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        strict: bool,
    },
    /// Compare the stored configuration with the rendered template
    Diff {
        #[command(flatten)]
        target: Target,
        /// Template to render instead of [render] template
        #[arg(long)]
        template: Option<PathBuf>,
        /// Show values (interactive terminals only)
        #[arg(long)]
        unlock: bool,
        #[arg(long)]
        strict: bool,
        /// Print the diff as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save or restore snapshots of the stored configuration
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Check the project, provider and renderer setup
    Doctor {
        /// Provider URI to check
        #[arg(short, long, env = "ZENFIG_PROVIDER")]
        provider: Option<String>,
    },
    /// Configure user settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Write the stored configuration of the services to a file
    Save {
        #[command(flatten)]
        target: Target,
        /// File to write instead of a timestamped one in [snapshot] dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a snapshot back to the store
    Restore {
        /// Snapshot file
        file: PathBuf,
        /// Restore into this environment instead of the snapshot's
        #[arg(short, long)]
        env: Option<String>,
        /// Only restore these services
        #[arg(short = 's', long = "service", value_delimiter = ',')]
        services: Vec<String>,
        #[arg(short, long, env = "ZENFIG_PROVIDER")]
        provider: Option<String>,
        /// Show the changes without applying them
        #[arg(long)]
        dry_run: bool,
        /// Apply without prompting
        #[arg(long)]
        confirm: bool,
        /// Restore even though the schema changed since the snapshot
        #[arg(long)]
        force_schema_mismatch: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize user configuration
    Init,
    /// Show current configuration
    Show,
}

/// Main entry point for the zenfig CLI application.
///
/// Exits with the code of the error's family when a command fails.
pub fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(run(cli)) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{}", format_error(&err, commands::use_color()));
            std::process::exit(err.exit_code());
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env("ZENFIG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "zenfig=debug",
            _ => "trace",
        })
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Run one command, returning the process exit code.
async fn run(cli: Cli) -> Result<i32> {
    let mut out = io::stdout();
    let ci = is_ci(cli.ci);

    let command = match cli.command {
        Commands::Config { action } => {
            match action {
                ConfigAction::Init => commands::config::config_init(&mut out)?,
                ConfigAction::Show => commands::config::config_show(&mut out)?,
            }
            return Ok(0);
        }
        Commands::Doctor { provider } => {
            let report =
                commands::doctor(cli.config.as_deref(), provider.as_deref(), &mut out).await?;
            return Ok(if report.passed() { 0 } else { 1 });
        }
        command => command,
    };

    let app = Zenfig::load(cli.config.as_deref())?;
    match command {
        Commands::Export {
            target,
            format,
            strict,
        } => {
            let provider = app.provider(target.provider.as_deref())?;
            app.export(
                provider.as_ref(),
                &ExportOptions {
                    env: target.env.as_deref(),
                    services: &target.services,
                    strict,
                    format,
                },
                &mut out,
            )
            .await?;
        }
        Commands::Upsert {
            key,
            value,
            mode,
            target,
        } => {
            let provider = app.provider(target.provider.as_deref())?;
            app.upsert(
                provider.as_ref(),
                UpsertOptions {
                    env: target.env.as_deref(),
                    service: target.service.as_deref(),
                    key: &key,
                    value,
                    mode,
                },
                &mut out,
            )
            .await?;
        }
        Commands::Delete { key, force, target } => {
            let provider = app.provider(target.provider.as_deref())?;
            app.delete(
                provider.as_ref(),
                DeleteOptions {
                    env: target.env.as_deref(),
                    service: target.service.as_deref(),
                    key: &key,
                    force,
                },
                &mut out,
            )
            .await?;
        }
        Commands::List { target, unlock } => {
            let provider = app.provider(target.provider.as_deref())?;
            app.list(
                provider.as_ref(),
                &ListOptions {
                    env: target.env.as_deref(),
                    services: &target.services,
                    show_values: reveal_values(unlock),
                },
                &mut out,
            )
            .await?;
        }
        Commands::Validate {
            target,
            file,
            strict,
        } => match file {
            Some(file) => app.validate_file(&file, strict, &mut out)?,
            None => {
                let provider = app.provider(target.provider.as_deref())?;
                app.validate_stored(
                    provider.as_ref(),
                    &ValidateOptions {
                        env: target.env.as_deref(),
                        services: &target.services,
                        strict,
                    },
                    &mut out,
                )
                .await?;
            }
        },
        Commands::Diff {
            target,
            template,
            unlock,
            strict,
            json,
        } => {
            let provider = app.provider(target.provider.as_deref())?;
            app.diff(
                provider.as_ref(),
                &app.renderer(),
                &DiffOptions {
                    env: target.env.as_deref(),
                    services: &target.services,
                    strict,
                    template: template.as_deref(),
                    show_values: reveal_values(unlock),
                    json,
                },
                &mut out,
            )
            .await?;
        }
        Commands::Snapshot { action } => match action {
            SnapshotAction::Save { target, output } => {
                let provider = app.provider(target.provider.as_deref())?;
                app.snapshot_save(
                    provider.as_ref(),
                    &SnapshotSaveOptions {
                        env: target.env.as_deref(),
                        services: &target.services,
                        output: output.as_deref(),
                    },
                    &mut out,
                )
                .await?;
            }
            SnapshotAction::Restore {
                file,
                env,
                services,
                provider,
                dry_run,
                confirm,
                force_schema_mismatch,
            } => {
                let provider = app.provider(provider.as_deref())?;
                app.snapshot_restore(
                    provider.as_ref(),
                    &file,
                    &SnapshotRestoreOptions {
                        env: env.as_deref(),
                        services: &services,
                        force_schema_mismatch,
                        dry_run,
                        confirm,
                        ci,
                    },
                    &PromptConfirmer,
                    &mut out,
                )
                .await?;
            }
        },
        Commands::Config { .. } | Commands::Doctor { .. } => {}
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_services_and_type() {
        let cli = Cli::try_parse_from([
            "zenfig", "upsert", "api.maxRetries", "5", "--type", "int", "-s", "api", "-e", "prod",
        ])
        .unwrap();
        match cli.command {
            Commands::Upsert {
                key, value, mode, target,
            } => {
                assert_eq!(key, "api.maxRetries");
                assert_eq!(value.as_deref(), Some("5"));
                assert_eq!(mode, ParseMode::Int);
                assert_eq!(target.service.as_deref(), Some("api"));
                assert_eq!(target.env.as_deref(), Some("prod"));
            }
            _ => panic!("expected upsert"),
        }

        let cli = Cli::try_parse_from(["zenfig", "export", "-s", "api,worker", "--format", "env"])
            .unwrap();
        match cli.command {
            Commands::Export { target, format, .. } => {
                assert_eq!(target.services, vec!["api", "worker"]);
                assert_eq!(format, ExportFormat::Env);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_rejects_unknown_value_type() {
        assert!(Cli::try_parse_from(["zenfig", "upsert", "k", "v", "--type", "yaml"]).is_err());
    }
}
