//! WikiStore Core Library
//!
//! Typed-object persistence engine for a wiki platform:
//! - Class schemas (named, ordered, typed property descriptors) with
//!   additive evolution
//! - Object model (identities, property values, property instances)
//! - Property codec mapping typed values onto relational row groups
//! - SQLite-backed object/class/document stores using rusqlite
//! - Transactional session with a begin/commit/rollback discipline
//! - Typed query facility for catalog and subscriber lookups

pub mod class;
pub mod class_store;
pub mod codec;
pub mod context;
pub mod document;
pub mod error;
pub mod object;
pub mod object_store;
pub mod query;
pub mod session;
pub mod store;

pub use class::{ClassSchema, PropertyDescriptor, PropertyKind};
pub use codec::RowPayload;
pub use context::StoreContext;
pub use document::{DocumentRecord, DocumentRepository};
pub use error::{Result, StoreError};
pub use object::{ObjectIdentity, ObjectInstance, PropertyInstance, PropertyValue};
pub use query::PropertyFilter;
pub use session::Session;
pub use store::WikiStore;
