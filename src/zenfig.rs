//! The application context shared by every command.

use crate::error::{ErrorCode, Result, ZenfigError};
use crate::provider::{Guards, Provider, ProviderContext};
use crate::render::JsonnetRenderer;
use crate::schema::{self, Schema, SchemaAdapter};
use std::convert::TryFrom;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use zenfig_core::{Config, GlobalConfig, is_valid_segment};

/// Name of the project file looked up in the working directory.
pub const CONFIG_FILE: &str = "zenfig.toml";

/// A loaded project: its configuration, the user's global defaults, and the
/// schema read through the configured adapter.
///
/// Settings resolve in the order command line, `ZENFIG_*` environment
/// variables (handled by the CLI), project file, global config.
pub struct Zenfig {
    config: Config,
    root: PathBuf,
    global_config: Option<GlobalConfig>,
    adapter: Box<dyn SchemaAdapter>,
    schema: Schema,
}

impl Zenfig {
    /// Load `zenfig.toml` (or `config_path`), the global config and the schema.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        let config = Config::try_from(path)?;
        let global_config = GlobalConfig::load()?;
        Self::new(config, project_root(path), global_config)
    }

    /// Build a context from an already parsed configuration. Relative paths
    /// in `config` resolve against `root`.
    pub fn new(config: Config, root: PathBuf, global_config: Option<GlobalConfig>) -> Result<Self> {
        let adapter = schema::adapter_for(&config.schema.format)?;
        let schema_path = config.resolve_relative(&root, &config.schema.path);
        let source = fs::read_to_string(&schema_path).map_err(|e| {
            ZenfigError::new(
                ErrorCode::FileSystem,
                format!("Cannot read schema {}: {}", schema_path.display(), e),
            )
            .with_remediation("Check [schema] path in zenfig.toml")
            .with_source(e)
        })?;
        let schema = schema::load_with(adapter.as_ref(), &source)
            .map_err(|e| e.with_path(schema_path.display().to_string()))?;
        debug!(
            format = adapter.name(),
            path = %schema_path.display(),
            "schema loaded"
        );

        Ok(Self {
            config,
            root,
            global_config,
            adapter,
            schema,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn global_config(&self) -> Option<&GlobalConfig> {
        self.global_config.as_ref()
    }

    pub fn adapter(&self) -> &dyn SchemaAdapter {
        self.adapter.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn prefix(&self) -> &str {
        &self.config.provider.prefix
    }

    /// Declared guards, or `None` when none are set.
    pub fn guards(&self) -> Option<&Guards> {
        self.config.provider.guards.as_ref().filter(|g| !g.is_empty())
    }

    pub fn strict(&self, flag: bool) -> bool {
        flag || self.config.defaults.strict
    }

    pub fn resolve_env(&self, env: Option<&str>) -> Result<String> {
        let env = env
            .map(str::to_string)
            .or_else(|| self.config.defaults.env.clone())
            .or_else(|| {
                self.global_config
                    .as_ref()
                    .and_then(|gc| gc.defaults.env.clone())
            })
            .ok_or_else(|| {
                ZenfigError::new(ErrorCode::MissingArgument, "No environment selected")
                    .with_remediation("Pass --env, set ZENFIG_ENV, or set [defaults] env in zenfig.toml")
                    .with_example("zenfig export --env prod --service api")
            })?;
        check_segment("environment", &env)?;
        Ok(env)
    }

    pub fn resolve_services(&self, services: &[String]) -> Result<Vec<String>> {
        let services = if services.is_empty() {
            self.config.defaults.services.clone()
        } else {
            services.to_vec()
        };
        if services.is_empty() {
            return Err(
                ZenfigError::new(ErrorCode::MissingArgument, "No service selected")
                    .with_remediation(
                        "Pass --service, set ZENFIG_SERVICES, or set [defaults] services in zenfig.toml",
                    )
                    .with_example("zenfig export --env prod --service api"),
            );
        }
        for service in &services {
            check_segment("service", service)?;
        }
        Ok(services)
    }

    /// Exactly one service, for commands that write a single key.
    pub fn resolve_service(&self, service: Option<&str>) -> Result<String> {
        let services = match service {
            Some(service) => vec![service.to_string()],
            None => self.resolve_services(&[])?,
        };
        match services.as_slice() {
            [single] => Ok(single.clone()),
            _ => Err(ZenfigError::new(
                ErrorCode::MissingArgument,
                "This command writes to a single service",
            )
            .with_remediation("Pass --service to pick one")
            .with_available_keys(services)),
        }
    }

    pub fn provider_uri(&self, provider_arg: Option<&str>) -> Result<String> {
        provider_arg
            .map(str::to_string)
            .or_else(|| self.config.provider.uri.clone())
            .or_else(|| {
                self.global_config
                    .as_ref()
                    .and_then(|gc| gc.defaults.provider.clone())
            })
            .ok_or_else(|| {
                ZenfigError::new(ErrorCode::MissingArgument, "No provider configured")
                    .with_remediation(
                        "Set [provider] uri in zenfig.toml, run 'zenfig config init', or pass --provider",
                    )
                    .with_example("uri = \"ssm://us-east-1\"")
            })
    }

    pub fn provider(&self, provider_arg: Option<&str>) -> Result<Box<dyn Provider>> {
        let uri = self.provider_uri(provider_arg)?;
        Box::<dyn Provider>::try_from(uri.as_str())
    }

    pub fn context(&self, service: &str, env: &str) -> ProviderContext {
        ProviderContext::new(self.prefix(), service, env)
    }

    pub fn template(&self, template_arg: Option<&Path>) -> Result<PathBuf> {
        match template_arg {
            Some(path) => Ok(path.to_path_buf()),
            None => self
                .config
                .render
                .template
                .as_ref()
                .map(|path| self.config.resolve_relative(&self.root, path))
                .ok_or_else(|| {
                    ZenfigError::new(ErrorCode::MissingArgument, "No template configured")
                        .with_remediation("Set [render] template in zenfig.toml or pass --template")
                }),
        }
    }

    pub fn renderer(&self) -> JsonnetRenderer {
        JsonnetRenderer::new(
            &self.config.render.bin,
            Duration::from_millis(self.config.render.timeout_ms),
        )
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.config.resolve_relative(&self.root, &self.config.snapshot.dir)
    }
}

/// Directory that relative paths in the project file resolve against.
pub(crate) fn project_root(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn check_segment(what: &str, value: &str) -> Result<()> {
    if is_valid_segment(value) {
        Ok(())
    } else {
        Err(
            ZenfigError::new(ErrorCode::InvalidArgument, format!("Invalid {} name '{}'", what, value))
                .with_problem("Names become store path segments")
                .with_remediation("Use letters, digits, '-' or '_'"),
        )
    }
}

/// CI mode: `--ci`, or a `CI` variable that is set to anything but empty,
/// `0` or `false`.
pub fn is_ci(flag: bool) -> bool {
    flag || env::var("CI")
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            !(v.is_empty() || v == "0" || v == "false")
        })
        .unwrap_or(false)
}
