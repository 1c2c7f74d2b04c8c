//! `zenfig config init|show`: the per-user global defaults.

use crate::error::Result;
use crate::provider::providers;
use colored::Colorize;
use inquire::{Select, Text};
use std::io::Write;
use std::path::Path;
use zenfig_core::{GlobalConfig, GlobalDefaults};

/// Prompt for a default provider URI and environment and save them.
pub fn config_init(out: &mut dyn Write) -> Result<()> {
    let infos = providers();
    let choices: Vec<String> = infos.iter().map(|info| info.display_with_examples()).collect();
    let selected = Select::new("Select your default provider backend:", choices).prompt()?;

    // Choices are "name: description (e.g., ...)".
    let name = selected.split(':').next().unwrap_or("ssm");
    let example = infos
        .iter()
        .find(|info| info.name == name)
        .and_then(|info| info.examples.first().copied())
        .unwrap_or(name);
    let uri = Text::new("Provider URI:").with_default(example).prompt()?;

    let env = Text::new("Default environment:")
        .with_default("dev")
        .with_help_message("Leave empty to always pass --env")
        .prompt()?;

    let config = GlobalConfig {
        defaults: GlobalDefaults {
            provider: Some(uri),
            env: Some(env).filter(|e| !e.trim().is_empty()),
        },
    };
    let path = GlobalConfig::path()?;
    config.save_to(&path)?;
    writeln!(out, "\n{} Configuration saved to {}", "✓".green(), path.display())?;
    Ok(())
}

pub fn config_show(out: &mut dyn Write) -> Result<()> {
    config_show_from(&GlobalConfig::path()?, out)
}

pub fn config_show_from(path: &Path, out: &mut dyn Write) -> Result<()> {
    match GlobalConfig::load_from(path)? {
        Some(config) => {
            writeln!(out, "Configuration file: {}\n", path.display())?;
            writeln!(
                out,
                "Provider: {}",
                config.defaults.provider.as_deref().unwrap_or("(none)")
            )?;
            writeln!(
                out,
                "Env:      {}",
                config.defaults.env.as_deref().unwrap_or("(none)")
            )?;
        }
        None => writeln!(
            out,
            "No configuration found. Run 'zenfig config init' to create one."
        )?,
    }
    Ok(())
}
