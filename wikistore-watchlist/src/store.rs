//! Watchlist subscription storage
//!
//! Maintains the watchlist rules class, the per-job subscriber cache and
//! the users' watched-element lists, all through the persistence engine's
//! public API. Schema-evolution failures are always surfaced to the
//! caller, never swallowed.

use crate::cache::SubscriberCache;
use crate::events::{DocumentEvent, DocumentEventKind, DocumentEventListener};
use anyhow::Result;
use wikistore_core::{
    ClassSchema, DocumentRecord, DocumentRepository, ObjectInstance, PropertyFilter, StoreContext,
    StoreError, WikiStore,
};

/// Class holding one user's notification rules.
pub const WATCHLIST_CLASS: &str = "WatchList.RulesClass";

/// Class marking a document as a notification job.
pub const WATCHLIST_JOB_CLASS: &str = "WatchList.JobClass";

const INTERVAL_PROP: &str = "interval";
const WIKIS_PROP: &str = "wikis";
const SPACES_PROP: &str = "spaces";
const DOCUMENTS_PROP: &str = "documents";
const USERS_PROP: &str = "users";

/// Separator between elements in a watched-element list.
const ELEMENT_SEP: char = ',';

/// Separator between wiki and document in a qualified name.
const WIKI_SEP: char = ':';

/// Kinds of elements a user can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Wiki,
    Space,
    Document,
    User,
}

impl ElementType {
    fn property(self) -> &'static str {
        match self {
            ElementType::Wiki => WIKIS_PROP,
            ElementType::Space => SPACES_PROP,
            ElementType::Document => DOCUMENTS_PROP,
            ElementType::User => USERS_PROP,
        }
    }
}

/// Long-lived watchlist service. Owns the subscriber cache; no global
/// state anywhere.
#[derive(Default)]
pub struct WatchListStore {
    job_document_names: Vec<String>,
    subscribers: SubscriberCache,
}

impl WatchListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known notification job documents.
    pub fn job_document_names(&self) -> &[String] {
        &self.job_document_names
    }

    /// Cached subscribers for a job; empty when the job is unknown.
    pub fn subscribers_for_job(&self, job_name: &str) -> &[String] {
        self.subscribers.subscribers(job_name)
    }

    /// Discover jobs, ensure the rules class and build the subscriber
    /// cache. Job discovery must come first since the class's interval
    /// enumeration tracks the job list.
    pub fn init(&mut self, store: &mut WikiStore, ctx: &mut StoreContext) -> Result<()> {
        self.job_document_names = store.documents_with_class(ctx, WATCHLIST_JOB_CLASS, 0, 0)?;
        self.ensure_watchlist_class(store, ctx)?;
        for job_name in self.job_document_names.clone() {
            self.populate_subscribers(store, ctx, &job_name)?;
        }
        tracing::info!(
            "watchlist initialized with {} job(s)",
            self.job_document_names.len()
        );
        Ok(())
    }

    /// Create or update the rules class. Field adds are idempotent; the
    /// interval enumeration is recomputed against the current job list
    /// (stale jobs drop out of the enumeration, the field itself stays).
    pub fn ensure_watchlist_class(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
    ) -> Result<()> {
        let mut doc = match store.get_document(ctx, WATCHLIST_CLASS) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => DocumentRecord::new(WATCHLIST_CLASS),
            Err(e) => return Err(e.into()),
        };
        let mut schema = doc
            .class
            .take()
            .unwrap_or_else(|| ClassSchema::new(WATCHLIST_CLASS));
        schema.set_name(WATCHLIST_CLASS);

        let mut changed = schema.add_static_list_field(
            INTERVAL_PROP,
            "Email notifications interval",
            &[],
        );
        changed |= schema.sync_allowed_values(INTERVAL_PROP, &self.job_document_names)?;
        changed |= schema.add_text_area_field(WIKIS_PROP, "Wiki list", 80, 5);
        changed |= schema.add_text_area_field(SPACES_PROP, "Space list", 80, 5);
        changed |= schema.add_text_area_field(DOCUMENTS_PROP, "Document list", 80, 5);
        changed |= schema.add_text_area_field(USERS_PROP, "User list", 80, 5);

        if doc.content.is_empty() {
            doc.content = "Watchlist notification rules class".to_string();
            changed = true;
        }

        doc.class = Some(schema);
        if changed {
            store.save_document(ctx, &doc, "Update watchlist class", true)?;
        }
        Ok(())
    }

    /// Rebuild the cached subscriber list for one job from a farm-wide
    /// search over interval selections.
    pub fn populate_subscribers(
        &mut self,
        store: &mut WikiStore,
        ctx: &mut StoreContext,
        job_name: &str,
    ) -> Result<()> {
        let filter = PropertyFilter::new(WATCHLIST_CLASS, job_name).with_property(INTERVAL_PROP);
        let subscribers = global_search_document_names(store, ctx, &filter);
        self.subscribers.populate(job_name, subscribers);
        Ok(())
    }

    /// Elements of the given type watched by a user.
    pub fn watched_elements(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
        element_type: ElementType,
    ) -> Result<Vec<String>> {
        let object = self.watchlist_object(store, ctx, user)?;
        let raw = object.text_value(element_type.property());
        Ok(raw
            .split(ELEMENT_SEP)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn is_watched(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
        element: &str,
        element_type: ElementType,
    ) -> Result<bool> {
        Ok(self
            .watched_elements(store, ctx, user, element_type)?
            .iter()
            .any(|e| e == element))
    }

    /// Add an element to the user's watchlist. Returns false when it was
    /// already watched.
    pub fn add_watched_element(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
        element: &str,
        element_type: ElementType,
    ) -> Result<bool> {
        let element = qualify(ctx, element, element_type);
        if self.is_watched(store, ctx, user, &element, element_type)? {
            return Ok(false);
        }
        let mut elements = self.watched_elements(store, ctx, user, element_type)?;
        elements.push(element);
        self.set_watched_elements(store, ctx, user, element_type, &elements)?;
        Ok(true)
    }

    /// Remove an element from the user's watchlist. Returns false when
    /// it was not watched.
    pub fn remove_watched_element(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
        element: &str,
        element_type: ElementType,
    ) -> Result<bool> {
        let element = qualify(ctx, element, element_type);
        if !self.is_watched(store, ctx, user, &element, element_type)? {
            return Ok(false);
        }
        let mut elements = self.watched_elements(store, ctx, user, element_type)?;
        elements.retain(|e| *e != element);
        self.set_watched_elements(store, ctx, user, element_type, &elements)?;
        Ok(true)
    }

    /// The user's watchlist object, created in their profile document on
    /// first use.
    fn watchlist_object(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
    ) -> Result<ObjectInstance> {
        let mut doc = match store.get_document(ctx, user) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => DocumentRecord::new(user),
            Err(e) => return Err(e.into()),
        };
        if let Some(object) = doc.first_object(WATCHLIST_CLASS) {
            return Ok(object.clone());
        }
        let index = doc.create_object(WATCHLIST_CLASS);
        store.save_document(ctx, &doc, "Create watchlist object", true)?;
        Ok(doc
            .object(WATCHLIST_CLASS, index)
            .expect("object created above")
            .clone())
    }

    fn set_watched_elements(
        &self,
        store: &mut WikiStore,
        ctx: &StoreContext,
        user: &str,
        element_type: ElementType,
        elements: &[String],
    ) -> Result<()> {
        let mut doc = match store.get_document(ctx, user) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => DocumentRecord::new(user),
            Err(e) => return Err(e.into()),
        };
        doc.set_text_value(
            WATCHLIST_CLASS,
            element_type.property(),
            elements.join(&ELEMENT_SEP.to_string()),
        );
        store.save_document(ctx, &doc, "Update watchlist", true)?;
        Ok(())
    }

    /// React to a notification job appearing in or disappearing from a
    /// document. Re-ensuring the class can fail; that failure is
    /// surfaced, not swallowed.
    fn handle_job_objects(
        &mut self,
        store: &mut WikiStore,
        ctx: &mut StoreContext,
        event: &DocumentEvent<'_>,
    ) -> Result<()> {
        let doc_name = event.current.name.clone();
        let had_job = event.original.first_object(WATCHLIST_JOB_CLASS).is_some();
        let has_job = event.kind != DocumentEventKind::Delete
            && event.current.first_object(WATCHLIST_JOB_CLASS).is_some();

        if had_job && !has_job {
            if let Some(pos) = self.job_document_names.iter().position(|j| *j == doc_name) {
                self.job_document_names.remove(pos);
                self.subscribers.invalidate(&doc_name);
                self.ensure_watchlist_class(store, ctx)?;
            }
        }
        if !had_job && has_job {
            self.job_document_names.push(doc_name.clone());
            self.populate_subscribers(store, ctx, &doc_name)?;
            self.ensure_watchlist_class(store, ctx)?;
        }
        Ok(())
    }

    /// React to a user's watchlist object appearing, changing interval
    /// or disappearing: move the subscriber between job cache entries.
    fn handle_watchlist_objects(&mut self, ctx: &StoreContext, event: &DocumentEvent<'_>) {
        let subscriber = format!("{}{}{}", ctx.database(), WIKI_SEP, event.current.name);
        let original_interval = event
            .original
            .text_value(WATCHLIST_CLASS, INTERVAL_PROP)
            .to_string();
        let current_interval = if event.kind == DocumentEventKind::Delete {
            String::new()
        } else {
            event
                .current
                .text_value(WATCHLIST_CLASS, INTERVAL_PROP)
                .to_string()
        };

        if original_interval != current_interval {
            if !original_interval.is_empty() {
                self.subscribers.remove(&original_interval, &subscriber);
            }
            if !current_interval.is_empty() {
                self.subscribers.add(&current_interval, &subscriber);
            }
        }
    }
}

impl DocumentEventListener for WatchListStore {
    fn on_document_event(
        &mut self,
        store: &mut WikiStore,
        ctx: &mut StoreContext,
        event: &DocumentEvent<'_>,
    ) -> Result<()> {
        self.handle_job_objects(store, ctx, event)?;
        self.handle_watchlist_objects(ctx, event);
        Ok(())
    }
}

/// Qualify an element with the active tenant unless it already carries
/// one (wikis are never qualified).
fn qualify(ctx: &StoreContext, element: &str, element_type: ElementType) -> String {
    if element_type == ElementType::Wiki || element.contains(WIKI_SEP) {
        element.to_string()
    } else {
        format!("{}{}{}", ctx.database(), WIKI_SEP, element)
    }
}

/// Search document names across every tenant of the farm, prefixing each
/// result with its wiki. The active selector is saved before switching
/// and restored afterwards; per-tenant failures are logged and skipped.
pub fn global_search_document_names(
    store: &mut WikiStore,
    ctx: &mut StoreContext,
    filter: &PropertyFilter,
) -> Vec<String> {
    let saved = ctx.database().to_string();
    let mut results = Vec::new();
    for wiki in ctx.all_databases() {
        ctx.set_database(&wiki);
        match store.search_document_names(ctx, filter, 0, 0) {
            Ok(names) => {
                results.extend(names.into_iter().map(|n| format!("{wiki}{WIKI_SEP}{n}")));
            }
            Err(e) => tracing::error!("search failed in wiki '{}': {}", wiki, e),
        }
    }
    ctx.set_database(saved);
    results
}
