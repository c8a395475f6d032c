use crate::config::{self, ShelfConfig};
use crate::consolidate::TreeConsolidator;
use crate::error::{Result, ShelfDbError};
use crate::leaf::LeafStore;
use crate::path_resolver::PathResolver;
use crate::record::{BookInput, BookRecord, BookUpdate, LeafLocation, RecordSelector};
use crate::validation;
use crate::view::{self, RecordFilter, SortKey, SortOrder, Statistics};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The main entry point for shelfdb.
///
/// Opens a library root and provides the record operations. There is no
/// index or cache: every read rebuilds the consolidated view from the
/// directory tree, and every write touches exactly one leaf file.
pub struct Store {
    root: PathBuf,
    config: ShelfConfig,
    resolver: PathResolver,
    leaf_store: LeafStore,
    consolidator: TreeConsolidator,
}

/// A record together with its 1-based selection index in the full view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedRecord {
    pub index: usize,
    pub id: String,
    #[serde(flatten)]
    pub record: BookRecord,
}

/// Result of a delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(BookRecord),
    /// The caller did not confirm; nothing was written
    Cancelled,
}

impl Store {
    /// Open the library at `path`, creating the root directory if needed and
    /// reading shelf.yaml when present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        ensure_root(&root)?;
        let config = config::load_config(&root)?;
        Self::build(root, config)
    }

    /// Open the library at `path` with an explicit configuration, ignoring shelf.yaml.
    pub fn with_config(path: impl AsRef<Path>, config: ShelfConfig) -> Result<Self> {
        config::validate_config(&config)?;
        let root = path.as_ref().to_path_buf();
        ensure_root(&root)?;
        Self::build(root, config)
    }

    fn build(root: PathBuf, config: ShelfConfig) -> Result<Self> {
        log::debug!("Opened library at {}", root.display());
        Ok(Store {
            resolver: PathResolver::new(&root, config.clone()),
            leaf_store: LeafStore::new(config.leaf_fields.clone()),
            consolidator: TreeConsolidator::new(config.clone()),
            root,
            config,
        })
    }

    /// Get the root library directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ShelfConfig {
        &self.config
    }

    /// Rebuild the consolidated view from disk.
    fn consolidate(&self) -> Result<Vec<BookRecord>> {
        self.consolidator.traverse(&self.root)
    }

    /// Validate and store a new book, creating its classification branch if
    /// it does not exist yet.
    pub fn create(&self, input: &BookInput) -> Result<BookRecord> {
        let book = validation::validate_input(input)?;
        let leaf_path = self.resolver.ensure_branch(&book.classification)?;

        let record = BookRecord {
            title: book.title,
            page_count: book.page_count,
            classification: book.classification,
            source: LeafLocation::new(leaf_path),
        };
        self.leaf_store.append(record.source.path(), &record)?;

        log::info!("Stored '{}' under {}", record.title, record.classification);
        Ok(record)
    }

    /// All records, optionally narrowed by a fuzzy filter.
    pub fn list_all(&self, filter: Option<&RecordFilter>) -> Result<Vec<BookRecord>> {
        Ok(self
            .listing(filter)?
            .into_iter()
            .map(|listed| listed.record)
            .collect())
    }

    /// Like `list_all`, but each record keeps the selection index it has in
    /// the unfiltered view, so filtered results can be fed to update/delete.
    pub fn listing(&self, filter: Option<&RecordFilter>) -> Result<Vec<ListedRecord>> {
        let records = self.consolidate()?;
        Ok(records
            .into_iter()
            .enumerate()
            .filter(|(_, record)| filter.map_or(true, |f| f.matches(record)))
            .map(|(i, record)| ListedRecord {
                index: i + 1,
                id: record.display_id(),
                record,
            })
            .collect())
    }

    /// Look up one record.
    pub fn get(&self, selector: &RecordSelector) -> Result<BookRecord> {
        let mut records = self.consolidate()?;
        let target = resolve(&records, selector)?;
        Ok(records.swap_remove(target))
    }

    /// Change the title and/or page count of one record. Both changes are
    /// validated before anything is written; only the record's own leaf
    /// file is rewritten.
    pub fn update(&self, selector: &RecordSelector, changes: &BookUpdate) -> Result<BookRecord> {
        let mut records = self.consolidate()?;
        let target = resolve(&records, selector)?;

        let new_title = changes
            .title
            .as_deref()
            .map(validation::validate_title)
            .transpose()?;
        let new_page_count = changes
            .page_count
            .as_deref()
            .map(validation::parse_page_count)
            .transpose()?;

        if changes.is_empty() {
            return Ok(records.swap_remove(target));
        }

        let record = &mut records[target];
        if let Some(title) = new_title {
            record.title = title;
        }
        if let Some(page_count) = new_page_count {
            record.page_count = page_count;
        }

        let source = records[target].source.clone();
        let leaf: Vec<BookRecord> = records
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect();
        self.leaf_store.rewrite(source.path(), &leaf)?;

        let updated = records.swap_remove(target);
        log::info!("Updated '{}' under {}", updated.title, updated.classification);
        Ok(updated)
    }

    /// Remove one record. Without confirmation nothing is written. Removing
    /// the last record of a leaf deletes the leaf file and prunes the
    /// directories left empty.
    pub fn delete(&self, selector: &RecordSelector, confirmed: bool) -> Result<DeleteOutcome> {
        let mut records = self.consolidate()?;
        let target = resolve(&records, selector)?;

        if !confirmed {
            return Ok(DeleteOutcome::Cancelled);
        }

        let removed = records.remove(target);
        let remaining: Vec<BookRecord> = records
            .into_iter()
            .filter(|r| r.source == removed.source)
            .collect();
        self.leaf_store.rewrite(removed.source.path(), &remaining)?;
        if remaining.is_empty() {
            self.resolver.prune_branch(removed.source.path());
        }

        log::info!("Deleted '{}' from {}", removed.title, removed.classification);
        Ok(DeleteOutcome::Deleted(removed))
    }

    /// The consolidated view in a new order. Storage is not touched.
    pub fn sort_by(
        &self,
        primary: SortKey,
        secondary: Option<SortKey>,
        order: SortOrder,
    ) -> Result<Vec<BookRecord>> {
        let mut records = self.consolidate()?;
        view::sort_records(&mut records, primary, secondary, order);
        Ok(records)
    }

    /// Library-wide statistics.
    pub fn aggregate(&self) -> Result<Statistics> {
        let records = self.consolidate()?;
        Ok(view::compute_statistics(&records))
    }
}

fn ensure_root(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root).map_err(|e| ShelfDbError::storage(root, e))
}

/// Position of the selected record within one consolidated view.
fn resolve(records: &[BookRecord], selector: &RecordSelector) -> Result<usize> {
    let not_found = || ShelfDbError::NotFound {
        selector: selector.to_string(),
    };

    match selector {
        RecordSelector::Index(index) => {
            if *index == 0 || *index > records.len() {
                return Err(not_found());
            }
            Ok(index - 1)
        }
        RecordSelector::Id(id) => {
            let matches: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.display_id() == *id)
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => Err(not_found()),
                [single] => Ok(*single),
                _ => Err(ShelfDbError::AmbiguousId {
                    id: id.clone(),
                    matches: matches.len(),
                }),
            }
        }
    }
}
