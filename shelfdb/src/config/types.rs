use crate::record::Level;
use serde::{Deserialize, Serialize};

/// Top-level library configuration parsed from shelf.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Directory nesting order below the root, outermost first
    pub levels: [Level; 3],
    pub leaf_fields: LeafFields,
    pub leaf_file_name: String,
    pub lookup: LookupConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        ShelfConfig {
            levels: [Level::Genre, Level::Author, Level::Year],
            leaf_fields: LeafFields::default(),
            leaf_file_name: "items.csv".to_string(),
            lookup: LookupConfig::default(),
        }
    }
}

/// Column headers written as the first row of every leaf file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafFields {
    pub title: String,
    pub page_count: String,
}

impl Default for LeafFields {
    fn default() -> Self {
        LeafFields {
            title: "Título".to_string(),
            page_count: "Páginas".to_string(),
        }
    }
}

impl LeafFields {
    pub fn header(&self) -> [&str; 2] {
        [self.title.as_str(), self.page_count.as_str()]
    }
}

/// Settings for the remote book metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_results: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            timeout_secs: 10,
            max_results: 5,
        }
    }
}
