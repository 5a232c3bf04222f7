//! Configuration management command.
//!
//! Shows the merged configuration and which layer each value came from.

use crate::cli::ConfigCommands;
use crate::cli::commands::print_json;
use crate::config::{
    CliOverrides, ConfigLayer, default_config_layer, discover_poker_dir, load_project_config,
    load_user_config,
};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum ConfigSource {
    Default,
    User,
    Project,
    Environment,
    Cli,
}

impl ConfigSource {
    const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::User => "user config",
            Self::Project => ".poker/config",
            Self::Environment => "environment",
            Self::Cli => "cli",
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    value: String,
    source: ConfigSource,
}

/// Execute the config command.
///
/// # Errors
///
/// Returns an error if the workspace is missing or a config file is invalid.
pub fn execute(command: &ConfigCommands, json: bool, cli: &CliOverrides) -> Result<()> {
    match command {
        ConfigCommands::Show => show(json, cli),
    }
}

fn show(json: bool, cli: &CliOverrides) -> Result<()> {
    let poker_dir = discover_poker_dir(None)?;
    let layers = [
        (ConfigSource::Default, default_config_layer()),
        (ConfigSource::User, load_user_config()?),
        (ConfigSource::Project, load_project_config(&poker_dir)?),
        (ConfigSource::Environment, ConfigLayer::from_env()),
        (ConfigSource::Cli, cli.as_layer()),
    ];
    let entries = collect_entries(&layers);

    if json {
        return print_json(&entries);
    }
    for (key, entry) in &entries {
        println!("{key} = {}  ({})", entry.value, entry.source.label());
    }
    Ok(())
}

/// Merge layers lowest first, remembering the winning source of each key.
fn collect_entries(layers: &[(ConfigSource, ConfigLayer)]) -> BTreeMap<String, ConfigEntry> {
    let mut entries = BTreeMap::new();
    for (source, layer) in layers {
        for (key, value) in layer.redacted() {
            entries.insert(
                key,
                ConfigEntry {
                    value,
                    source: *source,
                },
            );
        }
    }
    entries
}
