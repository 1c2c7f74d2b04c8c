//! # zenfig core configuration types
//!
//! This crate provides the on-disk configuration model for zenfig: the
//! per-project `zenfig.toml` file and the per-user global configuration.
//!
//! ## Configuration Structure
//!
//! A typical `zenfig.toml` file has this structure:
//!
//! ```toml
//! [project]
//! name = "shop"
//! revision = "1.0"
//!
//! [schema]
//! path = "config.schema.json"
//! format = "json-schema"
//!
//! [provider]
//! uri = "ssm://us-east-1"
//! prefix = "/zenfig"
//!
//! [provider.guards]
//! account = "123456789012"
//! region = "us-east-1"
//!
//! [render]
//! template = "config.jsonnet"
//!
//! [defaults]
//! env = "dev"
//! services = ["api"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The configuration format revision this crate understands.
pub const SUPPORTED_REVISION: &str = "1.0";

/// Default key prefix used in the remote parameter store.
pub const DEFAULT_PREFIX: &str = "/zenfig";

/// Default renderer binary.
pub const DEFAULT_RENDERER: &str = "jsonnet";

/// Default renderer timeout in milliseconds.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 30_000;

/// Default snapshot output directory, relative to the project root.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".zenfig/snapshots";

/// Schema formats accepted in `[schema] format`.
pub const SCHEMA_FORMATS: &[&str] = &["json-schema", "schemars", "declarative"];

/// The root configuration structure for a zenfig project.
///
/// This is the top-level type that represents the entire `zenfig.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: Project,
    /// Where the schema lives and which schema system describes it
    pub schema: SchemaSection,
    /// Provider selection and store addressing
    #[serde(default)]
    pub provider: ProviderSection,
    /// External template renderer settings
    #[serde(default)]
    pub render: RenderSection,
    /// Snapshot settings
    #[serde(default)]
    pub snapshot: SnapshotSection,
    /// Defaults applied when the command line does not say otherwise
    #[serde(default)]
    pub defaults: ProjectDefaults,
}

impl Config {
    /// Validate the configuration.
    ///
    /// Ensures that:
    /// - Project name is not empty
    /// - The schema format is one of the supported systems
    /// - The provider prefix is an absolute store path
    /// - The renderer timeout is positive
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.project.name.is_empty() {
            return Err(ParseError::Validation(
                "Project name cannot be empty".into(),
            ));
        }

        if !SCHEMA_FORMATS.contains(&self.schema.format.as_str()) {
            return Err(ParseError::Validation(format!(
                "Unknown schema format '{}'. Expected one of: {}",
                self.schema.format,
                SCHEMA_FORMATS.join(", ")
            )));
        }

        if !self.provider.prefix.starts_with('/') {
            return Err(ParseError::Validation(format!(
                "Provider prefix '{}' must start with '/'",
                self.provider.prefix
            )));
        }

        if self.render.timeout_ms == 0 {
            return Err(ParseError::Validation(
                "Renderer timeout must be greater than zero".into(),
            ));
        }

        for service in &self.defaults.services {
            if !is_valid_segment(service) {
                return Err(ParseError::Validation(format!(
                    "Invalid service name '{}': use letters, digits, '-' or '_'",
                    service
                )));
            }
        }

        Ok(())
    }

    /// Resolve a path from the config file against the project directory.
    pub fn resolve_relative(&self, base_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }
}

impl FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;

        if config.project.revision != SUPPORTED_REVISION {
            return Err(ParseError::UnsupportedRevision(config.project.revision));
        }

        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<&Path> for Config {
    type Error = ParseError;

    /// Load configuration from a file path.
    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let content = fs::read_to_string(path)?;
        content.parse()
    }
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// The name of the project
    pub name: String,
    /// Configuration format revision (currently must be "1.0")
    pub revision: String,
}

/// `[schema]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSection {
    /// Path to the schema document, relative to `zenfig.toml`
    pub path: PathBuf,
    /// Schema system: `json-schema`, `schemars` or `declarative`
    #[serde(default = "default_schema_format")]
    pub format: String,
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Provider URI, e.g. `ssm://us-east-1` or `file:///tmp/store.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Store key prefix
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Expected account/region identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guards: Option<Guards>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            uri: None,
            prefix: default_prefix(),
            guards: None,
        }
    }
}

/// Guard values checked against the live environment before provider calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guards {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Guards {
    /// Returns true when no guard value is declared.
    pub fn is_empty(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSection {
    /// Template file passed to the renderer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Renderer binary
    #[serde(default = "default_renderer")]
    pub bin: String,
    /// Hard timeout for one render
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            template: None,
            bin: default_renderer(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// `[snapshot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSection {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub strict: bool,
}

fn default_schema_format() -> String {
    "json-schema".to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_renderer() -> String {
    DEFAULT_RENDERER.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RENDER_TIMEOUT_MS
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_DIR)
}

/// Check if a string is usable as one segment of a store path.
pub fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Global user configuration for zenfig.
///
/// Stored in the user's config directory; provides defaults that apply
/// across all projects.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalConfig {
    #[serde(default)]
    pub defaults: GlobalDefaults,
}

/// Default settings in the global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlobalDefaults {
    /// Default provider URI when the project does not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Default environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl GlobalConfig {
    /// Gets the path to the global configuration file,
    /// typically `~/.config/zenfig/config.toml` on Unix systems.
    pub fn path() -> Result<PathBuf, io::Error> {
        use directories::ProjectDirs;
        let dirs = ProjectDirs::from("", "", "zenfig").ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find config directory")
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Loads the global user configuration, or `None` if the file is absent.
    pub fn load() -> Result<Option<Self>, ParseError> {
        Self::load_from(&Self::path()?)
    }

    /// Loads the global configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ParseError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map(Some).map_err(ParseError::Toml)
    }

    /// Saves the global configuration to disk.
    pub fn save(&self) -> Result<(), io::Error> {
        self.save_to(&Self::path()?)
    }

    /// Saves the global configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;

        Ok(())
    }
}

/// Errors that can occur when loading zenfig configuration files.
#[derive(Debug)]
pub enum ParseError {
    /// I/O error when reading configuration files
    Io(io::Error),
    /// TOML parsing error
    Toml(toml::de::Error),
    /// Unsupported configuration revision
    UnsupportedRevision(String),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "I/O error: {}", e),
            ParseError::Toml(e) => write!(f, "TOML parsing error: {}", e),
            ParseError::UnsupportedRevision(rev) => {
                write!(
                    f,
                    "Unsupported revision '{}'. Only '{}' is supported.",
                    rev, SUPPORTED_REVISION
                )
            }
            ParseError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            ParseError::Toml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        ParseError::Io(e)
    }
}

impl From<toml::de::Error> for ParseError {
    fn from(e: toml::de::Error) -> Self {
        ParseError::Toml(e)
    }
}
