// Path resolution - classification key to leaf file location, branch creation and pruning

use crate::config::ShelfConfig;
use crate::error::{Result, ShelfDbError};
use crate::record::ClassificationKey;
use std::path::{Path, PathBuf};

/// Maps classification keys onto the directory tree under a library root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    config: ShelfConfig,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, config: ShelfConfig) -> Self {
        PathResolver {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the leaf file for `key`. No I/O.
    pub fn resolve_branch(&self, key: &ClassificationKey) -> PathBuf {
        let mut dir = self.root.clone();
        for level in self.config.levels {
            dir.push(key.segment(level));
        }
        dir
    }

    /// `root/<level 1>/<level 2>/<level 3>/<leaf file>`. No I/O.
    pub fn resolve_leaf_path(&self, key: &ClassificationKey) -> PathBuf {
        self.resolve_branch(key).join(&self.config.leaf_file_name)
    }

    /// Create every missing directory of the branch for `key` and return the
    /// leaf file path. Succeeds when the branch already exists.
    pub fn ensure_branch(&self, key: &ClassificationKey) -> Result<PathBuf> {
        let dir = self.resolve_branch(key);
        std::fs::create_dir_all(&dir).map_err(|e| ShelfDbError::storage(&dir, e))?;
        Ok(dir.join(&self.config.leaf_file_name))
    }

    /// Remove the now-empty directories above a deleted leaf file, walking up
    /// until the root or the first directory that still has entries.
    pub fn prune_branch(&self, leaf_path: &Path) {
        let mut current = leaf_path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            let is_empty = match std::fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            };
            if !is_empty {
                break;
            }
            if let Err(e) = std::fs::remove_dir(dir) {
                log::warn!("Could not prune empty directory {}: {e}", dir.display());
                break;
            }
            log::info!("Pruned empty directory {}", dir.display());
            current = dir.parent();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use tempfile::TempDir;

    fn key() -> ClassificationKey {
        ClassificationKey::new("SciFi", "Asimov", 1951)
    }

    #[test]
    fn test_resolve_leaf_path() {
        let resolver = PathResolver::new("/library", ShelfConfig::default());
        assert_eq!(
            resolver.resolve_leaf_path(&key()),
            PathBuf::from("/library/SciFi/Asimov/1951/items.csv")
        );
    }

    #[test]
    fn test_resolve_with_alternate_levels() {
        let config = ShelfConfig {
            levels: [Level::Author, Level::Year, Level::Genre],
            leaf_file_name: "books.csv".into(),
            ..ShelfConfig::default()
        };
        let resolver = PathResolver::new("/library", config);
        assert_eq!(
            resolver.resolve_leaf_path(&key()),
            PathBuf::from("/library/Asimov/1951/SciFi/books.csv")
        );
    }

    #[test]
    fn test_ensure_branch_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let resolver = PathResolver::new(tmp.path(), ShelfConfig::default());

        let first = resolver.ensure_branch(&key()).unwrap();
        let second = resolver.ensure_branch(&key()).unwrap();
        assert_eq!(first, second);
        assert!(first.parent().unwrap().is_dir());
        assert!(!first.exists(), "ensure_branch must not create the leaf file");
    }

    #[test]
    fn test_prune_stops_at_non_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let resolver = PathResolver::new(tmp.path(), ShelfConfig::default());

        let leaf = resolver.ensure_branch(&key()).unwrap();
        resolver
            .ensure_branch(&ClassificationKey::new("SciFi", "Asimov", 1952))
            .unwrap();

        resolver.prune_branch(&leaf);

        assert!(!tmp.path().join("SciFi/Asimov/1951").exists());
        assert!(tmp.path().join("SciFi/Asimov/1952").is_dir());
    }

    #[test]
    fn test_prune_removes_whole_branch_but_keeps_root() {
        let tmp = TempDir::new().unwrap();
        let resolver = PathResolver::new(tmp.path(), ShelfConfig::default());

        let leaf = resolver.ensure_branch(&key()).unwrap();
        resolver.prune_branch(&leaf);

        assert!(!tmp.path().join("SciFi").exists());
        assert!(tmp.path().is_dir());
    }
}
