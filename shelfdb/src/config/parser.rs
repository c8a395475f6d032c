use super::types::ShelfConfig;
use crate::error::{Result, ShelfDbError};
use crate::record::Level;
use std::path::Path;

/// File name of the optional configuration at the library root
pub const CONFIG_FILE_NAME: &str = "shelf.yaml";

/// Load the configuration for a library root. Anything other than a regular
/// shelf.yaml file at the root yields the defaults.
pub fn load_config(root: &Path) -> Result<ShelfConfig> {
    let path = root.join(CONFIG_FILE_NAME);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_file() => parse_config(&path),
        Ok(_) => {
            log::warn!("Ignoring {} because it is not a file", path.display());
            Ok(ShelfConfig::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ShelfConfig::default()),
        Err(e) => Err(ShelfDbError::storage(&path, e)),
    }
}

/// Parse a shelf.yaml file into a ShelfConfig
pub fn parse_config(path: &Path) -> Result<ShelfConfig> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ShelfDbError::storage(path, e))?;
    parse_config_str(&content)
}

/// Parse a configuration YAML string into a validated ShelfConfig
pub fn parse_config_str(content: &str) -> Result<ShelfConfig> {
    // An empty document deserializes to unit, not to a mapping
    if content.trim().is_empty() {
        return Ok(ShelfConfig::default());
    }
    let config: ShelfConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ShelfConfig) -> Result<()> {
    for level in [Level::Genre, Level::Author, Level::Year] {
        let count = config.levels.iter().filter(|l| **l == level).count();
        if count != 1 {
            return Err(ShelfDbError::Config(format!(
                "levels must name '{}' exactly once, found {count}",
                level.as_str()
            )));
        }
    }

    let fields = &config.leaf_fields;
    if fields.title.trim().is_empty() || fields.page_count.trim().is_empty() {
        return Err(ShelfDbError::Config(
            "leaf_fields names must not be blank".into(),
        ));
    }
    if fields.title == fields.page_count {
        return Err(ShelfDbError::Config(format!(
            "leaf_fields names must differ, both are '{}'",
            fields.title
        )));
    }

    let name = config.leaf_file_name.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ShelfDbError::Config(format!(
            "leaf_file_name '{name}' must be a plain file name"
        )));
    }

    if config.lookup.timeout_secs == 0 {
        return Err(ShelfDbError::Config(
            "lookup.timeout_secs must be greater than zero".into(),
        ));
    }

    Ok(())
}
