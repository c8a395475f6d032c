// Tree consolidation - gather every leaf file under the root into one record list

use crate::config::ShelfConfig;
use crate::error::Result;
use crate::leaf::LeafStore;
use crate::record::{BookRecord, ClassificationKey, Level};
use std::path::{Component, Path, PathBuf};

/// Walks a library root and parses every leaf file it finds.
///
/// The walk uses an explicit stack of pending directories. Directories that
/// cannot be listed are skipped, as are files other than the configured leaf
/// file name and leaf files that do not sit exactly one directory per level
/// below the root. A leaf file that is found but cannot be read fails the
/// whole traversal, so callers never act on a partial view.
///
/// Leaves are parsed in classification-key order (genre, author, year) and
/// rows keep their in-file order, so positions in the returned list are
/// stable across calls as long as the tree is unchanged.
#[derive(Debug, Clone)]
pub struct TreeConsolidator {
    config: ShelfConfig,
    leaf_store: LeafStore,
}

impl TreeConsolidator {
    pub fn new(config: ShelfConfig) -> Self {
        let leaf_store = LeafStore::new(config.leaf_fields.clone());
        TreeConsolidator { config, leaf_store }
    }

    pub fn traverse(&self, root: &Path) -> Result<Vec<BookRecord>> {
        let mut records = Vec::new();
        for (key, path) in self.discover_leaves(root) {
            let mut leaf_records = self.leaf_store.parse_all(&path, &key)?;
            records.append(&mut leaf_records);
        }
        Ok(records)
    }

    /// Every well-placed leaf file under `root`, sorted by classification key.
    pub fn discover_leaves(&self, root: &Path) -> Vec<(ClassificationKey, PathBuf)> {
        let depth = self.config.levels.len();
        let mut leaves = Vec::new();
        let mut stack = vec![(root.to_path_buf(), 0usize)];

        while let Some((dir, dir_depth)) = stack.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::debug!("Skipping unreadable directory {}: {e}", dir.display());
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::debug!("Skipping unreadable entry in {}: {e}", dir.display());
                        continue;
                    }
                };
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(_) => continue,
                };
                let path = entry.path();

                if file_type.is_dir() {
                    // Nothing below the last level can be a valid leaf
                    if dir_depth < depth {
                        stack.push((path, dir_depth + 1));
                    }
                    continue;
                }
                if !file_type.is_file() || entry.file_name() != self.config.leaf_file_name.as_str()
                {
                    continue;
                }

                match self.key_for(root, &path) {
                    Some(key) => leaves.push((key, path)),
                    None => log::debug!("Ignoring misplaced leaf file {}", path.display()),
                }
            }
        }

        leaves.sort();
        leaves
    }

    /// Recover the classification key from the directories enclosing a leaf file.
    fn key_for(&self, root: &Path, leaf_path: &Path) -> Option<ClassificationKey> {
        let branch = leaf_path.strip_prefix(root).ok()?.parent()?;
        let segments = branch
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        if segments.len() != self.config.levels.len() {
            return None;
        }

        let mut genre = None;
        let mut author = None;
        let mut year = None;
        for (level, segment) in self.config.levels.iter().zip(segments) {
            match level {
                Level::Genre => genre = Some(segment.to_string()),
                Level::Author => author = Some(segment.to_string()),
                // Only the canonical spelling, as written by the path resolver
                Level::Year => {
                    year = segment
                        .parse::<u32>()
                        .ok()
                        .filter(|y| *y > 0 && segment == y.to_string())
                }
            }
        }

        Some(ClassificationKey {
            genre: genre?,
            author: author?,
            year: year?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelfDbError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_leaf(root: &Path, branch: &str, rows: &str) -> PathBuf {
        let dir = root.join(branch);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("items.csv");
        fs::write(&path, format!("Título,Páginas\n{rows}")).unwrap();
        path
    }

    fn summary(records: &[BookRecord]) -> Vec<(String, String, u32, String)> {
        records
            .iter()
            .map(|r| {
                (
                    r.classification.genre.clone(),
                    r.classification.author.clone(),
                    r.classification.year,
                    r.title.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_traverse_collects_all_leaves_in_key_order() {
        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "SciFi/Herbert/1965", "Dune,412\n");
        write_leaf(tmp.path(), "Drama/Lorca/1936", "La casa de Bernarda Alba,120\n");
        write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\nI Robot,253\n");

        let records = TreeConsolidator::new(ShelfConfig::default())
            .traverse(tmp.path())
            .unwrap();

        assert_eq!(
            summary(&records),
            vec![
                ("Drama".into(), "Lorca".into(), 1936, "La casa de Bernarda Alba".into()),
                ("SciFi".into(), "Asimov".into(), 1951, "Foundation".into()),
                ("SciFi".into(), "Asimov".into(), 1951, "I Robot".into()),
                ("SciFi".into(), "Herbert".into(), 1965, "Dune".into()),
            ]
        );
    }

    #[test]
    fn test_records_carry_their_leaf_path() {
        let tmp = TempDir::new().unwrap();
        let asimov = write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\n");
        let herbert = write_leaf(tmp.path(), "SciFi/Herbert/1965", "Dune,412\n");

        let records = TreeConsolidator::new(ShelfConfig::default())
            .traverse(tmp.path())
            .unwrap();

        assert_eq!(records[0].source.path(), asimov.as_path());
        assert_eq!(records[1].source.path(), herbert.as_path());
    }

    #[test]
    fn test_foreign_and_misplaced_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\n");

        // Shallow, deep and non-numeric-year leaves plus unrelated files
        fs::write(tmp.path().join("items.csv"), "Título,Páginas\nRoot,1\n").unwrap();
        fs::write(tmp.path().join("shelf.yaml"), "").unwrap();
        write_leaf(tmp.path(), "SciFi", "Shallow,1\n");
        write_leaf(tmp.path(), "SciFi/Asimov", "Shallower,1\n");
        write_leaf(tmp.path(), "SciFi/Asimov/1951/extra", "Deep,1\n");
        write_leaf(tmp.path(), "SciFi/Asimov/unknown", "NoYear,1\n");
        write_leaf(tmp.path(), "SciFi/Asimov/0", "ZeroYear,1\n");
        fs::write(tmp.path().join("SciFi/Asimov/1951/notes.txt"), "hello").unwrap();

        let records = TreeConsolidator::new(ShelfConfig::default())
            .traverse(tmp.path())
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Foundation");
    }

    #[test]
    fn test_non_canonical_year_directories_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\n");
        write_leaf(tmp.path(), "SciFi/Asimov/01951", "Padded,1\n");
        write_leaf(tmp.path(), "SciFi/Asimov/+1951", "Signed,1\n");

        let records = TreeConsolidator::new(ShelfConfig::default())
            .traverse(tmp.path())
            .unwrap();

        assert_eq!(
            summary(&records),
            vec![("SciFi".into(), "Asimov".into(), 1951, "Foundation".into())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_leaf_file_fails_traversal() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\n");
        let locked = write_leaf(tmp.path(), "SciFi/Herbert/1965", "Dune,412\n");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read the file anyway
        if fs::read(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
            return;
        }

        let result = TreeConsolidator::new(ShelfConfig::default()).traverse(tmp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        match result {
            Err(ShelfDbError::StorageUnavailable { path, .. }) => assert_eq!(path, locked),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "SciFi/Asimov/1951", "Foundation,255\n");
        write_leaf(tmp.path(), "Drama/Lorca/1936", "Yerma,96\n");
        let locked = tmp.path().join("Drama");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = TreeConsolidator::new(ShelfConfig::default()).traverse(tmp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(
            summary(&result.unwrap()),
            vec![("SciFi".into(), "Asimov".into(), 1951, "Foundation".into())]
        );
    }

    #[test]
    fn test_missing_root_yields_empty_view() {
        let tmp = TempDir::new().unwrap();
        let records = TreeConsolidator::new(ShelfConfig::default())
            .traverse(&tmp.path().join("nowhere"))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_alternate_level_order() {
        let tmp = TempDir::new().unwrap();
        write_leaf(tmp.path(), "Asimov/1951/SciFi", "Foundation,255\n");
        let config = ShelfConfig {
            levels: [Level::Author, Level::Year, Level::Genre],
            ..ShelfConfig::default()
        };

        let records = TreeConsolidator::new(config).traverse(tmp.path()).unwrap();

        assert_eq!(
            records[0].classification,
            ClassificationKey::new("SciFi", "Asimov", 1951)
        );
    }
}
