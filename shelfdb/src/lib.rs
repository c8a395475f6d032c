pub mod config;
pub mod record;
pub mod path_resolver;
pub mod leaf;
pub mod consolidate;
pub mod store;
pub mod validation;
pub mod view;
pub mod lookup;
pub mod error;

pub use config::ShelfConfig;
pub use error::{Result, ShelfDbError};
pub use lookup::{Candidate, GoogleBooksClient, MetadataLookup};
pub use record::{BookInput, BookRecord, BookUpdate, ClassificationKey, RecordSelector};
pub use store::{DeleteOutcome, ListedRecord, Store};
pub use view::{FilterField, RecordFilter, SortKey, SortOrder, Statistics};
