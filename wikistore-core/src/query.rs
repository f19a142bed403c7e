//! Query facility: catalog listings over stored objects
//!
//! Typed filters instead of assembled query strings; results are ordered
//! document names without duplicates, and an empty backend yields an
//! empty sequence.

use crate::context::StoreContext;
use crate::error::Result;
use crate::store::WikiStore;
use rusqlite::params;

/// Matches documents holding an object of `class_name` whose text
/// property (optionally restricted to one property name) equals `value`.
#[derive(Debug, Clone)]
pub struct PropertyFilter {
    pub class_name: String,
    pub property: Option<String>,
    pub value: String,
}

impl PropertyFilter {
    pub fn new(class_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            property: None,
            value: value.into(),
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }
}

impl WikiStore {
    /// Names of documents holding at least one object of `class_name`.
    /// `max_results` of zero means unbounded.
    pub fn documents_with_class(
        &mut self,
        ctx: &StoreContext,
        class_name: &str,
        max_results: usize,
        offset: usize,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT DISTINCT doc_name FROM objects
             WHERE wiki = ?1 AND class_name = ?2
             ORDER BY doc_name LIMIT ?3 OFFSET ?4",
        )?;
        let mut rows = stmt.query(params![
            ctx.database(),
            class_name,
            limit_param(max_results),
            offset as i64
        ])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    /// Names of documents matching a property filter. Used by subscriber
    /// caches and catalog features.
    pub fn search_document_names(
        &mut self,
        ctx: &StoreContext,
        filter: &PropertyFilter,
        max_results: usize,
        offset: usize,
    ) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT DISTINCT o.doc_name FROM objects o
             JOIN properties p ON p.object_id = o.id
             JOIN property_texts t ON t.object_id = o.id AND t.name = p.name
             WHERE o.wiki = ?1 AND o.class_name = ?2
               AND (?3 IS NULL OR p.name = ?3)
               AND t.value = ?4
             ORDER BY o.doc_name LIMIT ?5 OFFSET ?6",
        )?;
        let mut rows = stmt.query(params![
            ctx.database(),
            filter.class_name,
            filter.property,
            filter.value,
            limit_param(max_results),
            offset as i64
        ])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }
}

fn limit_param(max_results: usize) -> i64 {
    if max_results == 0 {
        -1
    } else {
        max_results as i64
    }
}
