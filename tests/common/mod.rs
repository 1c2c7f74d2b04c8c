#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use zenfig::{Config, Provider, Zenfig};

pub const SCHEMA: &str = r#"
[database]
host = { type = "string" }
port = { type = "integer", min = 1, max = 65535 }

[api]
max_retries = { type = "integer", default = 3 }
debug = { type = "boolean", optional = true }
"#;

/// A throwaway project: declarative schema, a `file://` store and a
/// renderer script, all inside one temporary directory.
pub struct TestFixture {
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_renderer("echo '{}'")
    }

    /// `body` becomes the renderer script, run through `sh`.
    pub fn with_renderer(body: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path().to_path_buf();

        fs::write(base_path.join("schema.toml"), SCHEMA).unwrap();
        fs::write(base_path.join("config.jsonnet"), "{}").unwrap();
        let script = base_path.join("fake-jsonnet.sh");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();

        let config = format!(
            r#"
[project]
name = "fixture"
revision = "1.0"

[schema]
path = "schema.toml"
format = "declarative"

[provider]
uri = "file://{store}"
prefix = "/zenfig"

[render]
template = "config.jsonnet"
bin = "sh {script}"
timeout_ms = 5000

[snapshot]
dir = "snapshots"

[defaults]
env = "dev"
services = ["api"]
"#,
            store = base_path.join("store.json").display(),
            script = script.display(),
        );
        fs::write(base_path.join("zenfig.toml"), config).unwrap();

        Self {
            _temp_dir: temp_dir,
            base_path,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_path.join("zenfig.toml")
    }

    /// The project context, without any global user configuration.
    pub fn app(&self) -> Zenfig {
        let config = Config::try_from(self.config_path().as_path()).unwrap();
        Zenfig::new(config, self.base_path.clone(), None).unwrap()
    }

    pub fn provider(&self, app: &Zenfig) -> Box<dyn Provider> {
        app.provider(None).unwrap()
    }
}
