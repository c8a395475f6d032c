//! Remote book metadata lookup.
//!
//! Queries a Google Books compatible `volumes` endpoint and turns each hit
//! into a [`Candidate`]. A candidate is never stored directly: the caller
//! picks one, coerces it with [`Candidate::to_input`], and hands the result
//! to `Store::create`, which validates it exactly like manual entry.

use crate::config::LookupConfig;
use crate::error::{Result, ShelfDbError};
use crate::record::BookInput;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Genre used when the remote record lists no category
pub const DEFAULT_GENRE: &str = "General";
/// Author used when the remote record lists no author
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// One search hit from the metadata service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published_year: Option<u32>,
    pub page_count: Option<u32>,
}

impl Candidate {
    /// Coerce into the same raw shape manual entry produces. Missing title,
    /// year or page count become blank fields, which validation rejects.
    pub fn to_input(&self) -> BookInput {
        let genre = self
            .categories
            .first()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_GENRE);
        let author = if self.authors.is_empty() {
            DEFAULT_AUTHOR.to_string()
        } else {
            self.authors.join(", ")
        };

        BookInput {
            genre: genre.to_string(),
            author,
            year: self.published_year.map(|y| y.to_string()).unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            page_count: self.page_count.map(|p| p.to_string()).unwrap_or_default(),
        }
    }
}

/// Source of candidate records for lookup-assisted entry
pub trait MetadataLookup {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>>;
}

/// HTTP client for the Google Books `volumes` search endpoint.
#[derive(Debug, Clone)]
pub struct GoogleBooksClient {
    client: Client,
    base_url: String,
}

impl GoogleBooksClient {
    /// Build a client with the configured base URL and request timeout.
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShelfDbError::Lookup(format!("cannot build HTTP client: {e}")))?;
        Ok(GoogleBooksClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_network_error(e: reqwest::Error) -> ShelfDbError {
        if e.is_timeout() {
            ShelfDbError::Lookup(format!("request timed out: {e}"))
        } else if e.is_connect() {
            ShelfDbError::Lookup(format!("connection failed: {e}"))
        } else {
            ShelfDbError::Lookup(e.to_string())
        }
    }
}

impl MetadataLookup for GoogleBooksClient {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ShelfDbError::Validation(
                "search query must not be blank".into(),
            ));
        }

        // The service caps maxResults at 40
        let max_results = max_results.clamp(1, 40).to_string();
        let url = format!("{}/volumes", self.base_url);
        log::debug!("Searching {url} for '{query}'");

        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .map_err(Self::map_network_error)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            return Err(ShelfDbError::Lookup(if body.is_empty() {
                format!("unexpected status {status}")
            } else {
                format!("unexpected status {status}: {body}")
            }));
        }

        let body = resp.text().map_err(Self::map_network_error)?;
        parse_volumes(&body)
    }
}

#[derive(Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    published_date: Option<String>,
    page_count: Option<i64>,
}

/// Decode a `volumes` search response body. A response without `items`
/// means no results.
pub fn parse_volumes(json: &str) -> Result<Vec<Candidate>> {
    let response: VolumesResponse = serde_json::from_str(json)
        .map_err(|e| ShelfDbError::Lookup(format!("invalid response: {e}")))?;

    Ok(response
        .items
        .into_iter()
        .map(|volume| {
            let info = volume.volume_info;
            Candidate {
                title: info.title.filter(|t| !t.trim().is_empty()),
                authors: info.authors,
                categories: info.categories,
                published_year: info.published_date.as_deref().and_then(leading_year),
                page_count: info
                    .page_count
                    .and_then(|p| u32::try_from(p).ok())
                    .filter(|p| *p > 0),
            }
        })
        .collect())
}

/// Year from a published date such as `1951`, `1951-06` or `1951-06-01`.
fn leading_year(date: &str) -> Option<u32> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"^\s*(\d{4})").expect("valid year pattern"));
    re.captures(date)?
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|y| *y > 0)
}
