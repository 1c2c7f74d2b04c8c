//! zenfig - typed configuration and secrets for every environment
//!
//! Configuration lives in a remote key-value store (AWS SSM Parameter Store,
//! or a local JSON file) under `<prefix>/<env>/<service>/<key path>`. A schema
//! declares its shape; zenfig parses stored strings against it, merges
//! services, validates the result and renders it through a Jsonnet template.
//!
//! # Features
//!
//! - **Three schema systems**: JSON Schema, schemars `RootSchema` and a
//!   declarative TOML format, all lowered to one schema tree
//! - **Typed values**: stored strings are parsed and validated per schema node
//! - **Diff**: compare the stored state with what a template renders
//! - **Snapshots**: save the stored state and restore it after review
//! - **Guards**: refuse to touch a store whose account or region is unexpected
//!
//! # Example
//!
//! ```ignore
//! use zenfig::{Zenfig, commands::ExportOptions};
//!
//! let app = Zenfig::load(None)?;
//! let provider = app.provider(None)?;
//! let value = app
//!     .export_value(provider.as_ref(), &ExportOptions { env: Some("prod"), ..Default::default() })
//!     .await?;
//! println!("{}", value["database"]["host"]);
//! ```

pub mod commands;
pub mod diff;
pub mod error;
pub mod kv;
pub mod provider;
pub mod render;
pub mod schema;
pub mod snapshot;
pub mod tree;
pub mod zenfig;

#[cfg(feature = "cli")]
pub mod cli;

mod fsutil;

pub use error::{ErrorCode, ErrorKind, Result, ZenfigError, format_error};
pub use provider::{Provider, ProviderContext};
pub use schema::{ParseMode, Schema, SchemaAdapter};
pub use zenfig::Zenfig;
pub use zenfig_core::{Config, GlobalConfig, GlobalDefaults, Guards};
