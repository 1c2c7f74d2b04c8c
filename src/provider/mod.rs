//! # Provider System
//!
//! Providers are the remote (or local) key-value stores configuration lives
//! in. Every provider addresses values the same way:
//!
//! ```text
//! <prefix>/<env>/<service>/<dot/path/with/slashes>
//! ```
//!
//! so `database.host` for service `api` in env `prod` under prefix `/zenfig`
//! is stored at `/zenfig/prod/api/database/host`. Values are always strings;
//! typing is the schema's job.
//!
//! ## Available Providers
//!
//! - [`ssm::SsmProvider`]: AWS Systems Manager Parameter Store
//! - [`file::FileProvider`]: a local JSON file using the same path scheme
//!
//! ## URI-Based Configuration
//!
//! ```text
//! ssm://us-east-1
//! ssm://eu-west-1?profile=prod
//! ssm://?endpoint=http://localhost:4566
//! file:///var/lib/zenfig/store.json
//! ```
//!
//! ```rust,ignore
//! use zenfig::provider::{Provider, ProviderContext};
//!
//! let provider = Box::<dyn Provider>::try_from("ssm://us-east-1")?;
//! let ctx = ProviderContext::new("/zenfig", "api", "prod");
//! let stored = provider.fetch(&ctx).await?;
//! ```

use crate::error::{ErrorCode, Result, ZenfigError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use url::Url;

pub use zenfig_core::Guards;

pub mod file;
pub mod ssm;
#[macro_use]
pub mod macros;


/// Flat mapping from canonical dot path to the raw stored string.
pub type ProviderKv = BTreeMap<String, String>;

/// Addressing for one service in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContext {
    pub prefix: String,
    pub service: String,
    pub env: String,
}

impl ProviderContext {
    pub fn new(prefix: impl Into<String>, service: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            service: service.into(),
            env: env.into(),
        }
    }

    /// `<prefix>/<env>/<service>/`, always with a trailing slash.
    pub fn base_path(&self) -> String {
        format!(
            "{}/{}/{}/",
            self.prefix.trim_end_matches('/'),
            self.env,
            self.service
        )
    }

    /// Store path of a dot-path key.
    pub fn parameter_name(&self, key: &str) -> String {
        format!("{}{}", self.base_path(), key.replace('.', "/"))
    }

    /// Dot-path key of a store path, `None` when the path lies outside this
    /// context.
    pub fn key_for(&self, name: &str) -> Option<String> {
        let rest = name.strip_prefix(&self.base_path())?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.replace('/', "."))
    }
}

impl fmt::Display for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_path())
    }
}

/// What a backend can promise about writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Values are encrypted at rest
    pub secure_write: bool,
    /// The encryption type of a stored value can be queried
    pub encryption_verification: bool,
    /// Multiple writes can be applied atomically
    pub transactions: bool,
}

/// Encryption of a stored value as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    SecureString,
    String,
    Unknown,
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncryptionType::SecureString => "SecureString",
            EncryptionType::String => "String",
            EncryptionType::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Information about a storage backend, used for listings and error hints.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub examples: &'static [&'static str],
}

impl ProviderInfo {
    /// "name: description (e.g., example1, example2)"
    pub fn display_with_examples(&self) -> String {
        if self.examples.is_empty() {
            format!("{}: {}", self.name, self.description)
        } else {
            format!(
                "{}: {} (e.g., {})",
                self.name,
                self.description,
                self.examples.join(", ")
            )
        }
    }
}

pub use macros::{PROVIDER_REGISTRY, ProviderRegistration};

/// Every registered backend.
pub fn providers() -> Vec<ProviderInfo> {
    PROVIDER_REGISTRY
        .iter()
        .map(|reg| reg.info.clone())
        .collect()
}

/// Capabilities of a registered backend, by name.
pub fn capabilities_of(name: &str) -> Option<Capabilities> {
    PROVIDER_REGISTRY
        .iter()
        .find(|reg| reg.info.name == name)
        .map(|reg| reg.capabilities)
}

/// A key-value configuration store.
///
/// Every remote call is asynchronous. Implementations translate their
/// backend's failures into the `PROV` error codes so callers never see
/// backend-specific errors.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Matches the name given to `register_provider!`.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Every value stored for the context, keyed by dot path. Records outside
    /// the context's base path are ignored.
    async fn fetch(&self, ctx: &ProviderContext) -> Result<ProviderKv>;

    /// Create or overwrite one value, using the most restrictive storage
    /// type the backend offers.
    async fn upsert(&self, ctx: &ProviderContext, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, ctx: &ProviderContext, key: &str) -> Result<()>;

    async fn verify_encryption(&self, _ctx: &ProviderContext, _key: &str) -> Result<EncryptionType> {
        Ok(EncryptionType::Unknown)
    }

    /// Confirm we are talking to the expected account and region.
    /// Backends without such a notion accept any guards.
    async fn check_guards(&self, _guards: Option<&Guards>) -> Result<()> {
        Ok(())
    }
}

impl TryFrom<String> for Box<dyn Provider> {
    type Error = ZenfigError;

    fn try_from(s: String) -> Result<Self> {
        Self::try_from(&s as &str)
    }
}

impl TryFrom<&str> for Box<dyn Provider> {
    type Error = ZenfigError;

    /// Accepts full URIs (`ssm://us-east-1`), bare names (`ssm`) and
    /// path shorthands (`file:/tmp/store.json`).
    fn try_from(s: &str) -> Result<Self> {
        let (scheme, rest) = match s.find(':') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => (s, ""),
        };

        if !PROVIDER_REGISTRY
            .iter()
            .any(|reg| reg.schemes.contains(&scheme))
        {
            return Err(unknown_provider(scheme));
        }

        let url_string = match rest {
            "" | ":" => format!("{}://", scheme),
            s if s.starts_with("//") => format!("{}:{}", scheme, s),
            s => format!("{}://{}", scheme, s),
        };

        let url = Url::parse(&url_string).map_err(|e| {
            ZenfigError::new(
                ErrorCode::ProviderNotFound,
                format!("Invalid provider URI '{}': {}", s, e),
            )
        })?;

        Self::try_from(&url)
    }
}

impl TryFrom<&Url> for Box<dyn Provider> {
    type Error = ZenfigError;

    fn try_from(url: &Url) -> Result<Self> {
        let scheme = url.scheme();
        let registration = PROVIDER_REGISTRY
            .iter()
            .find(|reg| reg.schemes.contains(&scheme))
            .ok_or_else(|| unknown_provider(scheme))?;
        (registration.factory)(url)
    }
}

fn unknown_provider(scheme: &str) -> ZenfigError {
    ZenfigError::new(
        ErrorCode::ProviderNotFound,
        format!("Provider '{}' not found", scheme),
    )
    .with_available_keys(providers().iter().map(|p| p.display_with_examples()).collect())
    .with_example("ssm://us-east-1")
}
