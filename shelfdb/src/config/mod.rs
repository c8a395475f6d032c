mod parser;
mod types;

pub use parser::{load_config, parse_config, parse_config_str, validate_config, CONFIG_FILE_NAME};
pub use types::{LeafFields, LookupConfig, ShelfConfig};
