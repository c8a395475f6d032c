// Record types - classification keys, stored books, and raw user input

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One level of the folder hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Genre,
    Author,
    Year,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Genre => "genre",
            Level::Author => "author",
            Level::Year => "year",
        }
    }
}

/// The (genre, author, year) triple that identifies one leaf file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassificationKey {
    pub genre: String,
    pub author: String,
    pub year: u32,
}

impl ClassificationKey {
    pub fn new(genre: impl Into<String>, author: impl Into<String>, year: u32) -> Self {
        ClassificationKey {
            genre: genre.into(),
            author: author.into(),
            year,
        }
    }

    /// The directory name this key contributes at the given level
    pub fn segment(&self, level: Level) -> String {
        match level {
            Level::Genre => self.genre.clone(),
            Level::Author => self.author.clone(),
            Level::Year => self.year.to_string(),
        }
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.genre, self.author, self.year)
    }
}

/// Provenance of a record: the leaf file it was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafLocation(PathBuf);

impl LeafLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LeafLocation(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// A stored book together with where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRecord {
    pub title: String,
    pub page_count: u32,
    pub classification: ClassificationKey,
    #[serde(skip)]
    pub source: LeafLocation,
}

impl BookRecord {
    /// Presentation id `genre/author/title`. Not unique: two books with the
    /// same title under one classification share it.
    pub fn display_id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.classification.genre, self.classification.author, self.title
        )
    }
}

/// Unvalidated book fields as typed by a user or coerced from a lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInput {
    pub genre: String,
    pub author: String,
    pub year: String,
    pub title: String,
    pub page_count: String,
}

/// Partial update of a stored book. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub page_count: Option<String>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.page_count.is_none()
    }
}

/// How a caller points at one record of the consolidated view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// 1-based position in the consolidated view
    Index(usize),
    /// Display id `genre/author/title`
    Id(String),
}

impl FromStr for RecordSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<usize>() {
            Ok(index) if s.chars().all(|c| c.is_ascii_digit()) => {
                Ok(RecordSelector::Index(index))
            }
            _ => Ok(RecordSelector::Id(s.to_string())),
        }
    }
}

impl fmt::Display for RecordSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSelector::Index(i) => write!(f, "#{i}"),
            RecordSelector::Id(id) => f.write_str(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parsing() {
        assert_eq!("3".parse::<RecordSelector>().unwrap(), RecordSelector::Index(3));
        assert_eq!(
            " SciFi/Asimov/Foundation ".parse::<RecordSelector>().unwrap(),
            RecordSelector::Id("SciFi/Asimov/Foundation".into())
        );
        assert_eq!(
            "+3".parse::<RecordSelector>().unwrap(),
            RecordSelector::Id("+3".into())
        );
    }

    #[test]
    fn test_display_id() {
        let record = BookRecord {
            title: "Foundation".into(),
            page_count: 255,
            classification: ClassificationKey::new("SciFi", "Asimov", 1951),
            source: LeafLocation::new("/tmp/x/items.csv"),
        };
        assert_eq!(record.display_id(), "SciFi/Asimov/Foundation");
    }

    #[test]
    fn test_segments() {
        let key = ClassificationKey::new("Drama", "Lorca", 1936);
        assert_eq!(key.segment(Level::Year), "1936");
        assert_eq!(key.segment(Level::Author), "Lorca");
    }
}
