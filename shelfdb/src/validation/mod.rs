use crate::config::CONFIG_FILE_NAME;
use crate::error::{Result, ShelfDbError};
use crate::record::{BookInput, ClassificationKey};

/// A book that passed validation, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBook {
    pub classification: ClassificationKey,
    pub title: String,
    pub page_count: u32,
}

/// Validate raw book input. Every field is trimmed; all problems are
/// reported together in a single validation error.
pub fn validate_input(input: &BookInput) -> Result<ValidBook> {
    let mut errors = Vec::new();

    let fields = [
        ("genre", input.genre.trim()),
        ("author", input.author.trim()),
        ("year", input.year.trim()),
        ("title", input.title.trim()),
        ("page_count", input.page_count.trim()),
    ];
    for (name, value) in fields {
        if value.is_empty() {
            errors.push(format!("Required field '{name}' is missing"));
        }
    }

    let genre = input.genre.trim();
    let author = input.author.trim();
    for (name, value) in [("genre", genre), ("author", author)] {
        if !value.is_empty() {
            if let Err(e) = check_path_segment(name, value) {
                errors.push(e);
            }
        }
    }

    let year = match input.year.trim() {
        "" => None,
        raw => parse_positive("year", raw).map_err(|e| errors.push(e)).ok(),
    };
    let page_count = match input.page_count.trim() {
        "" => None,
        raw => parse_positive("page_count", raw).map_err(|e| errors.push(e)).ok(),
    };

    match (year, page_count) {
        (Some(year), Some(page_count)) if errors.is_empty() => Ok(ValidBook {
            classification: ClassificationKey::new(genre, author, year),
            title: input.title.trim().to_string(),
            page_count,
        }),
        _ => Err(ShelfDbError::Validation(errors.join("; "))),
    }
}

/// Parse a page count typed by a user: an integer greater than zero.
pub fn parse_page_count(raw: &str) -> Result<u32> {
    parse_positive("page_count", raw.trim()).map_err(ShelfDbError::Validation)
}

/// A replacement title must not be blank. Returns the trimmed title.
pub fn validate_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ShelfDbError::Validation(
            "Field 'title' must not be blank".into(),
        ));
    }
    Ok(title.to_string())
}

fn parse_positive(field: &str, raw: &str) -> std::result::Result<u32, String> {
    let value: i64 = raw
        .parse()
        .map_err(|_| format!("Field '{field}' expected an integer, got '{raw}'"))?;
    if value <= 0 {
        return Err(format!("Field '{field}' must be greater than zero, got {value}"));
    }
    u32::try_from(value).map_err(|_| format!("Field '{field}' is too large: {value}"))
}

/// Genre and author become directory names, so they must be a single
/// normal path component.
fn check_path_segment(field: &str, value: &str) -> std::result::Result<(), String> {
    if value == "." || value == ".." {
        return Err(format!("Field '{field}' cannot be '{value}'"));
    }
    if value.eq_ignore_ascii_case(CONFIG_FILE_NAME) {
        return Err(format!("Field '{field}' cannot be the reserved name '{CONFIG_FILE_NAME}'"));
    }
    if value.contains(['/', '\\']) {
        return Err(format!("Field '{field}' cannot contain path separators"));
    }
    if value.chars().any(char::is_control) {
        return Err(format!("Field '{field}' cannot contain control characters"));
    }
    Ok(())
}
