// Leaf file I/O - one CSV file of (title, page count) rows per classification key

use crate::config::LeafFields;
use crate::error::{Result, ShelfDbError};
use crate::record::{BookRecord, ClassificationKey, LeafLocation};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Reads and writes the record file of a single leaf directory.
#[derive(Debug, Clone)]
pub struct LeafStore {
    fields: LeafFields,
}

impl LeafStore {
    pub fn new(fields: LeafFields) -> Self {
        LeafStore { fields }
    }

    /// Append one row. A missing or empty file gets the header row first.
    /// Existing rows are never rewritten.
    pub fn append(&self, path: &Path, record: &BookRecord) -> Result<()> {
        let needs_header = match std::fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(ShelfDbError::storage(path, e)),
        };
        let needs_newline = !needs_header
            && !ends_with_newline(path).map_err(|e| ShelfDbError::storage(path, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ShelfDbError::storage(path, e))?;
        if needs_newline {
            file.write_all(b"\n")
                .map_err(|e| ShelfDbError::storage(path, e))?;
        }

        let mut writer = csv_writer(file);
        if needs_header {
            writer
                .write_record(self.fields.header())
                .map_err(|e| ShelfDbError::storage(path, e.into()))?;
        }
        write_row(&mut writer, record).map_err(|e| ShelfDbError::storage(path, e.into()))?;
        writer.flush().map_err(|e| ShelfDbError::storage(path, e))?;

        if needs_header {
            log::info!("Created leaf file {}", path.display());
        }
        Ok(())
    }

    /// Read every well-formed row of the leaf file at `path`, tagging each
    /// record with `key` and `path`. A missing file is an empty leaf.
    /// Rows whose page count is not a positive integer are dropped.
    pub fn parse_all(&self, path: &Path, key: &ClassificationKey) -> Result<Vec<BookRecord>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ShelfDbError::storage(path, e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let header = self.fields.header();
        let mut records = Vec::new();
        for (row_number, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("Skipping unreadable row {} in {}: {e}", row_number + 1, path.display());
                    continue;
                }
            };
            if row_number == 0 && row.iter().map(str::trim).eq(header.iter().copied()) {
                continue;
            }
            match parse_row(&row) {
                Some((title, page_count)) => records.push(BookRecord {
                    title,
                    page_count,
                    classification: key.clone(),
                    source: LeafLocation::new(path),
                }),
                None => {
                    log::debug!("Skipping malformed row {} in {}", row_number + 1, path.display());
                }
            }
        }

        Ok(records)
    }

    /// Replace the leaf file with the header plus `records`, in order.
    /// An empty slice deletes the file instead of leaving a header-only leaf.
    pub fn rewrite(&self, path: &Path, records: &[BookRecord]) -> Result<()> {
        if records.is_empty() {
            return match std::fs::remove_file(path) {
                Ok(()) => {
                    log::info!("Removed empty leaf file {}", path.display());
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(ShelfDbError::storage(path, e)),
            };
        }

        let dir = path.parent().ok_or_else(|| {
            ShelfDbError::storage(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "leaf path has no parent directory"),
            )
        })?;
        let tmp = NamedTempFile::new_in(dir).map_err(|e| ShelfDbError::storage(dir, e))?;

        let mut writer = csv_writer(tmp);
        writer
            .write_record(self.fields.header())
            .map_err(|e| ShelfDbError::storage(path, e.into()))?;
        for record in records {
            debug_assert_eq!(record.source.path(), path);
            write_row(&mut writer, record).map_err(|e| ShelfDbError::storage(path, e.into()))?;
        }
        let tmp = writer
            .into_inner()
            .map_err(|e| ShelfDbError::storage(path, e.into_error()))?;
        // The temp file is created private; keep the permissions of the file it replaces
        match std::fs::metadata(path) {
            Ok(meta) => tmp
                .as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| ShelfDbError::storage(path, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ShelfDbError::storage(path, e)),
        }
        tmp.persist(path)
            .map_err(|e| ShelfDbError::storage(path, e.error))?;

        log::info!("Rewrote leaf file {} ({} records)", path.display(), records.len());
        Ok(())
    }
}

fn csv_writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(inner)
}

fn write_row<W: Write>(writer: &mut csv::Writer<W>, record: &BookRecord) -> csv::Result<()> {
    let page_count = record.page_count.to_string();
    writer.write_record([record.title.as_str(), page_count.as_str()])
}

fn parse_row(row: &csv::StringRecord) -> Option<(String, u32)> {
    let title = row.get(0)?;
    if title.trim().is_empty() {
        return None;
    }
    let page_count = row.get(1)?.trim().parse::<u32>().ok().filter(|p| *p > 0)?;
    Some((title.to_string(), page_count))
}

fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
