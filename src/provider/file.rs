use super::{Capabilities, EncryptionType, Provider, ProviderContext, ProviderKv};
use crate::error::{ErrorCode, Result, ZenfigError};
use crate::fsutil::write_owner_only;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Configuration for the local file provider.
///
/// ```text
/// file:///var/lib/zenfig/store.json   absolute path
/// file://store.json                   relative to the working directory
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl TryFrom<&Url> for FileConfig {
    type Error = ZenfigError;

    fn try_from(url: &Url) -> std::result::Result<Self, Self::Error> {
        if url.scheme() != "file" {
            return Err(ZenfigError::new(
                ErrorCode::ProviderNotFound,
                format!("Invalid scheme '{}' for file provider", url.scheme()),
            ));
        }

        // The host part of `file://relative/path` is the first path component.
        let path = match url.host_str().filter(|h| !h.is_empty()) {
            Some(host) if url.path() == "/" => host.to_string(),
            Some(host) => format!("{}{}", host, url.path()),
            None => url.path().to_string(),
        };
        if path.is_empty() || path == "/" {
            return Err(ZenfigError::new(
                ErrorCode::InvalidArgument,
                "The file provider needs a path",
            )
            .with_example("file:///var/lib/zenfig/store.json"));
        }
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Stores parameters in a JSON file mapping full store paths to values.
///
/// Useful offline and in tests; it shares the Parameter Store path scheme so
/// a file can stand in for a real store. Nothing is encrypted.
pub struct FileProvider {
    config: FileConfig,
    lock: Mutex<()>,
}

crate::register_provider! {
    struct: FileProvider,
    config: FileConfig,
    name: "file",
    description: "Local JSON file (unencrypted)",
    capabilities: { secure_write: false, encryption_verification: true, transactions: false },
    schemes: ["file"],
    examples: ["file:///var/lib/zenfig/store.json", "file://store.json"],
}

impl FileProvider {
    pub fn new(config: FileConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.config.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                ZenfigError::from(e).with_path(self.config.path.display().to_string())
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn save(&self, parameters: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(parameters)?;
        write_owner_only(&self.config.path, content.as_bytes()).map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, err: io::Error) -> ZenfigError {
        ZenfigError::new(
            ErrorCode::ProviderUnavailable,
            format!("Cannot access {}: {}", self.config.path.display(), err),
        )
        .with_source(err)
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        Self::PROVIDER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    async fn fetch(&self, ctx: &ProviderContext) -> Result<ProviderKv> {
        let _guard = self.lock.lock().await;
        let parameters = self.load()?;
        let kv: ProviderKv = parameters
            .iter()
            .filter_map(|(name, value)| Some((ctx.key_for(name)?, value.clone())))
            .collect();
        debug!(path = %self.config.path.display(), keys = kv.len(), "fetched parameters");
        Ok(kv)
    }

    async fn upsert(&self, ctx: &ProviderContext, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut parameters = self.load()?;
        parameters.insert(ctx.parameter_name(key), value.to_string());
        self.save(&parameters)
    }

    async fn delete(&self, ctx: &ProviderContext, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut parameters = self.load()?;
        let name = ctx.parameter_name(key);
        if parameters.remove(&name).is_none() {
            return Err(ZenfigError::new(
                ErrorCode::ParameterNotFound,
                format!("Parameter {} does not exist", name),
            )
            .with_path(key));
        }
        self.save(&parameters)
    }

    async fn verify_encryption(&self, ctx: &ProviderContext, key: &str) -> Result<EncryptionType> {
        let _guard = self.lock.lock().await;
        let name = ctx.parameter_name(key);
        if self.load()?.contains_key(&name) {
            Ok(EncryptionType::String)
        } else {
            Err(ZenfigError::new(
                ErrorCode::ParameterNotFound,
                format!("Parameter {} does not exist", name),
            )
            .with_path(key))
        }
    }
}
