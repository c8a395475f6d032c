// Derived views over the consolidated records: fuzzy filter, multi-key sort, statistics

use crate::record::BookRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Minimum similarity ratio for two normalized strings to count as a match
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

// ── Fuzzy matching ──────────────────────────────────────────────

/// Lowercase and strip accents (NFKD decomposition without combining marks).
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Gestalt pattern matching ratio `2 * M / T` in `[0, 1]`, where `M` is the
/// number of characters in matching blocks and `T` the total length.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Longest common contiguous block. Ties go to the block starting earliest
/// in `a`, then earliest in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = curr[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// Case- and accent-insensitive match: either string contains the other,
/// or their similarity ratio reaches the threshold.
pub fn is_similar(query: &str, value: &str) -> bool {
    let query = normalize_text(query);
    let value = normalize_text(value);
    if value.contains(&query) || query.contains(&value) {
        return true;
    }
    similarity_ratio(&query, &value) >= SIMILARITY_THRESHOLD
}

// ── Filtering ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Title,
    Author,
    Genre,
}

impl FromStr for FilterField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(FilterField::Title),
            "author" => Ok(FilterField::Author),
            "genre" => Ok(FilterField::Genre),
            other => Err(format!(
                "unknown filter field '{other}' (expected title, author or genre)"
            )),
        }
    }
}

/// A fuzzy predicate over one text field of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub field: FilterField,
    pub query: String,
}

impl RecordFilter {
    pub fn new(field: FilterField, query: impl Into<String>) -> Self {
        RecordFilter {
            field,
            query: query.into(),
        }
    }

    pub fn matches(&self, record: &BookRecord) -> bool {
        let value = match self.field {
            FilterField::Title => &record.title,
            FilterField::Author => &record.classification.author,
            FilterField::Genre => &record.classification.genre,
        };
        self.query.trim().is_empty() || is_similar(self.query.trim(), value)
    }
}

// ── Sorting ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    PageCount,
    Genre,
    Author,
    Year,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(SortKey::Title),
            "pages" | "page_count" => Ok(SortKey::PageCount),
            "genre" => Ok(SortKey::Genre),
            "author" => Ok(SortKey::Author),
            "year" => Ok(SortKey::Year),
            other => Err(format!(
                "unknown sort key '{other}' (expected title, pages, genre, author or year)"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortKey::Title => "title",
            SortKey::PageCount => "pages",
            SortKey::Genre => "genre",
            SortKey::Author => "author",
            SortKey::Year => "year",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortKey {
    pub fn compare(&self, a: &BookRecord, b: &BookRecord) -> Ordering {
        match self {
            SortKey::PageCount => a.page_count.cmp(&b.page_count),
            SortKey::Year => a.classification.year.cmp(&b.classification.year),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Genre => a
                .classification
                .genre
                .to_lowercase()
                .cmp(&b.classification.genre.to_lowercase()),
            SortKey::Author => a
                .classification
                .author
                .to_lowercase()
                .cmp(&b.classification.author.to_lowercase()),
        }
    }
}

/// Stable sort by `primary`, breaking ties with `secondary`. Descending order
/// reverses the comparison, so records equal on both keys keep their order.
pub fn sort_records(
    records: &mut [BookRecord],
    primary: SortKey,
    secondary: Option<SortKey>,
    order: SortOrder,
) {
    records.sort_by(|a, b| {
        let ordering = primary
            .compare(a, b)
            .then_with(|| secondary.map_or(Ordering::Equal, |key| key.compare(a, b)));
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

// ── Statistics ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: usize,
}

/// Library-wide aggregates. Group counts are listed in order of first
/// appearance in the consolidated view, and ties for "most frequent" or
/// "longest" go to the entry seen first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_count: usize,
    pub total_pages: u64,
    pub average_page_count: f64,
    pub count_by_genre: Vec<GroupCount>,
    pub most_frequent_genre: Option<String>,
    pub count_by_author: Vec<GroupCount>,
    pub most_frequent_author: Option<String>,
    pub longest_book: Option<BookRecord>,
}

/// Single pass over the records.
pub fn compute_statistics(records: &[BookRecord]) -> Statistics {
    let mut total_pages = 0u64;
    let mut genres = Counter::default();
    let mut authors = Counter::default();
    let mut longest: Option<&BookRecord> = None;

    for record in records {
        total_pages += u64::from(record.page_count);
        genres.add(&record.classification.genre);
        authors.add(&record.classification.author);
        if longest.map_or(true, |l| record.page_count > l.page_count) {
            longest = Some(record);
        }
    }

    let total_count = records.len();
    let average_page_count = if total_count == 0 {
        0.0
    } else {
        total_pages as f64 / total_count as f64
    };

    Statistics {
        total_count,
        total_pages,
        average_page_count,
        most_frequent_genre: genres.most_frequent(),
        count_by_genre: genres.into_counts(),
        most_frequent_author: authors.most_frequent(),
        count_by_author: authors.into_counts(),
        longest_book: longest.cloned(),
    }
}

/// Insertion-ordered occurrence counter
#[derive(Default)]
struct Counter {
    index: HashMap<String, usize>,
    counts: Vec<GroupCount>,
}

impl Counter {
    fn add(&mut self, name: &str) {
        match self.index.get(name) {
            Some(&i) => self.counts[i].count += 1,
            None => {
                self.index.insert(name.to_string(), self.counts.len());
                self.counts.push(GroupCount {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn most_frequent(&self) -> Option<String> {
        let mut best: Option<&GroupCount> = None;
        for group in &self.counts {
            if best.map_or(true, |b| group.count > b.count) {
                best = Some(group);
            }
        }
        best.map(|g| g.name.clone())
    }

    fn into_counts(self) -> Vec<GroupCount> {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ClassificationKey, LeafLocation};
    use pretty_assertions::assert_eq;

    fn book(genre: &str, author: &str, title: &str, page_count: u32) -> BookRecord {
        BookRecord {
            title: title.into(),
            page_count,
            classification: ClassificationKey::new(genre, author, 2000),
            source: LeafLocation::new(format!("/lib/{genre}/{author}/2000/items.csv")),
        }
    }

    fn titles(records: &[BookRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_normalize_strips_accents_and_case() {
        assert_eq!(normalize_text("Ciencia FICCIÓN"), "ciencia ficcion");
        assert_eq!(normalize_text("García Márquez"), "garcia marquez");
    }

    #[test]
    fn test_similarity_ratio_matches_gestalt_definition() {
        assert_eq!(similarity_ratio("abcd", "bcde"), 0.75);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_is_similar() {
        assert!(is_similar("asimov", "Isaac Asimov"));
        assert!(is_similar("ficcion", "Ciencia Ficción"));
        assert!(is_similar("Fundacion", "Fundación e Imperio"));
        // one typo
        assert!(is_similar("Asimvo", "Asimov"));
        assert!(!is_similar("Tolkien", "Asimov"));
    }

    #[test]
    fn test_filter_by_field() {
        let record = book("Ciencia Ficción", "Isaac Asimov", "Yo, Robot", 253);
        assert!(RecordFilter::new(FilterField::Genre, "ciencia ficcion").matches(&record));
        assert!(RecordFilter::new(FilterField::Author, "asimov").matches(&record));
        assert!(!RecordFilter::new(FilterField::Title, "asimov").matches(&record));
        assert!(RecordFilter::new(FilterField::Title, "  ").matches(&record));
    }

    #[test]
    fn test_sort_primary_then_secondary() {
        let mut records = vec![
            book("B", "Z", "T1", 10),
            book("A", "Y", "T2", 10),
            book("A", "X", "T3", 10),
        ];
        sort_records(&mut records, SortKey::Genre, Some(SortKey::Author), SortOrder::Ascending);
        assert_eq!(titles(&records), vec!["T3", "T2", "T1"]);
    }

    #[test]
    fn test_sort_pages_numerically_descending() {
        let mut records = vec![
            book("A", "X", "short", 9),
            book("A", "X", "long", 100),
            book("A", "X", "mid", 20),
        ];
        sort_records(&mut records, SortKey::PageCount, None, SortOrder::Descending);
        assert_eq!(titles(&records), vec!["long", "mid", "short"]);
    }

    #[test]
    fn test_sort_is_case_insensitive_and_stable() {
        let mut records = vec![
            book("A", "X", "beta", 1),
            book("A", "X", "Alpha", 2),
            book("A", "X", "BETA", 3),
        ];
        sort_records(&mut records, SortKey::Title, None, SortOrder::Ascending);
        assert_eq!(titles(&records), vec!["Alpha", "beta", "BETA"]);

        sort_records(&mut records, SortKey::Title, None, SortOrder::Descending);
        assert_eq!(titles(&records), vec!["beta", "BETA", "Alpha"]);
    }

    #[test]
    fn test_statistics_example() {
        let records = vec![
            book("SciFi", "Asimov", "A", 200),
            book("SciFi", "Herbert", "B", 400),
            book("Drama", "Lorca", "C", 300),
        ];
        let stats = compute_statistics(&records);

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.total_pages, 900);
        assert!((stats.average_page_count - 300.0).abs() < f64::EPSILON);
        assert_eq!(
            stats.count_by_genre,
            vec![
                GroupCount { name: "SciFi".into(), count: 2 },
                GroupCount { name: "Drama".into(), count: 1 },
            ]
        );
        assert_eq!(stats.most_frequent_genre.as_deref(), Some("SciFi"));
        assert_eq!(stats.longest_book.unwrap().page_count, 400);
    }

    #[test]
    fn test_statistics_ties_go_to_first_seen() {
        let records = vec![
            book("Drama", "Lorca", "A", 300),
            book("SciFi", "Asimov", "B", 300),
        ];
        let stats = compute_statistics(&records);
        assert_eq!(stats.most_frequent_genre.as_deref(), Some("Drama"));
        assert_eq!(stats.most_frequent_author.as_deref(), Some("Lorca"));
        assert_eq!(stats.longest_book.unwrap().title, "A");
    }

    #[test]
    fn test_statistics_empty() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.average_page_count, 0.0);
        assert!(stats.most_frequent_genre.is_none());
        assert!(stats.longest_book.is_none());
    }
}
