use std::fs;
use std::path::Path;

use tarmac_core::{Error, PipelineConfig};

/// Reads and validates a TOML pipeline configuration.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig, Error> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to read config '{}': {}", path.display(), e),
                )
            })?;
            parse(&text)?
        }
        None => PipelineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn parse(text: &str) -> Result<PipelineConfig, Error> {
    toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))
}
