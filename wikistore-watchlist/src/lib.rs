//! Watchlist feature built on the `wikistore-core` persistence engine.
//!
//! Stores per-user notification rules as typed objects, keeps the rules
//! class in sync with the set of notification jobs and maintains an
//! in-memory per-job subscriber cache updated from document events.

mod cache;
mod events;
mod store;

pub use cache::SubscriberCache;
pub use events::{DocumentEvent, DocumentEventKind, DocumentEventListener, EventDispatcher};
pub use store::{
    global_search_document_names, ElementType, WatchListStore, WATCHLIST_CLASS,
    WATCHLIST_JOB_CLASS,
};
