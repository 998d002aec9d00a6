use super::EngineConfig;
use crate::errors::Result;
use std::fs;
use std::path::Path;

use tracing::info;

/// Loads and parses an engine configuration file
///
/// Files ending in `.toml` are parsed as TOML, anything else as YAML.
///
/// # Arguments
///
/// * `file_path` - Path to the configuration file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub fn load_engine_config(file_path: &str) -> Result<EngineConfig> {
    let content = fs::read_to_string(file_path)?;
    let is_toml = Path::new(file_path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let config = if is_toml {
        toml::from_str(&content)?
    } else {
        parse_engine_config(&content)?
    };
    info!("Loaded engine configuration: {:?}", config.name);
    Ok(config)
}

/// Parses a YAML engine configuration
pub fn parse_engine_config(yaml_str: &str) -> Result<EngineConfig> {
    Ok(serde_yaml::from_str(yaml_str)?)
}
