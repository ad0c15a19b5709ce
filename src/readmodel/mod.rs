//! Read Model Module
//!
//! Denormalized property documents kept in sync with the relational rows,
//! stored in Postgres or, without a configured store, in process memory.

mod document;
mod postgres;
mod resolver;
mod store;
mod sync;

pub use document::{price_per_area, summarize, DocumentRecord, Neighborhood, PropertyDocument, SUMMARY_MAX_CHARS};
pub use postgres::PgDocumentStore;
pub use resolver::{ImageResolver, PublicUrlResolver};
pub use store::{
    DocumentSink, DocumentStore, MemoryDocumentStore, SearchFilters, SearchPage, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use sync::{CacheInvalidator, ReadModelSynchronizer, SyncOutcome};
