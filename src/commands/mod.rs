//! Per-verb orchestration on top of [`Zenfig`](crate::Zenfig).
//!
//! Each command writes its primary output to the writer it is given and its
//! warnings to stderr, so `export` output stays machine-readable.

use colored::Colorize;

pub mod config;
pub mod delete;
pub mod diff;
pub mod doctor;
pub mod export;
pub mod list;
pub mod snapshot;
pub mod upsert;
pub mod validate;

pub use delete::DeleteOptions;
pub use diff::DiffOptions;
pub use doctor::{CheckStatus, DoctorReport, doctor};
pub use export::{ExportFormat, ExportOptions};
pub use list::ListOptions;
pub use snapshot::{SnapshotRestoreOptions, SnapshotSaveOptions};
pub use upsert::UpsertOptions;
pub use validate::ValidateOptions;

pub(crate) fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("{} {}", "!".yellow(), warning);
    }
}

pub(crate) fn use_color() -> bool {
    colored::control::SHOULD_COLORIZE.should_colorize()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::zenfig::Zenfig;
    use std::fs;
    use tempfile::TempDir;
    use zenfig_core::Config;

    pub const SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "database": {
                "type": "object",
                "properties": {
                    "host": { "type": "string" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 }
                },
                "required": ["host", "port"]
            },
            "api": {
                "type": "object",
                "properties": {
                    "maxRetries": { "type": "integer", "default": 3 },
                    "debug": { "type": "boolean" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }
        },
        "required": ["database", "api"]
    }"#;

    /// A project in `dir` using [`SCHEMA`], env `dev` and service `api`.
    pub fn app(dir: &TempDir) -> Zenfig {
        app_with_schema(dir, SCHEMA)
    }

    /// Same project layout with a JSON schema of the caller's choosing.
    pub fn app_with_schema(dir: &TempDir, schema: &str) -> Zenfig {
        fs::write(dir.path().join("schema.json"), schema).unwrap();
        let config: Config = r#"
[project]
name = "shop"
revision = "1.0"

[schema]
path = "schema.json"

[defaults]
env = "dev"
services = ["api"]
"#
        .parse()
        .unwrap();
        Zenfig::new(config, dir.path().to_path_buf(), None).unwrap()
    }
}
