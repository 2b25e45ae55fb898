use lease_engine_core::EngineConfig;
use tracing::debug;

use super::file;

/// Load the engine configuration from `--config`, or use the defaults.
pub fn load_engine_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => {
            debug!("Loading engine configuration from {p}");
            file::read_structured::<EngineConfig>(p)?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
