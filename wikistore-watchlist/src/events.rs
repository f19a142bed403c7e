//! Document event dispatch
//!
//! Plain callback interface over (original, current) document version
//! pairs. The persistence core knows nothing about this mechanism;
//! features register listeners against an explicit dispatcher owned by
//! the embedding application.

use anyhow::Result;
use wikistore_core::{DocumentRecord, StoreContext, WikiStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEventKind {
    Save,
    Update,
    Delete,
}

/// One document lifecycle event: the version before and after.
pub struct DocumentEvent<'a> {
    pub kind: DocumentEventKind,
    pub original: &'a DocumentRecord,
    pub current: &'a DocumentRecord,
}

pub trait DocumentEventListener {
    fn on_document_event(
        &mut self,
        store: &mut WikiStore,
        ctx: &mut StoreContext,
        event: &DocumentEvent<'_>,
    ) -> Result<()>;
}

/// Explicit event-dispatch collaborator.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn DocumentEventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn DocumentEventListener>) {
        self.listeners.push(listener);
    }

    /// Deliver an event to every listener. The first listener error
    /// aborts delivery and is surfaced to the caller.
    pub fn dispatch(
        &mut self,
        store: &mut WikiStore,
        ctx: &mut StoreContext,
        event: &DocumentEvent<'_>,
    ) -> Result<()> {
        for listener in &mut self.listeners {
            listener.on_document_event(store, ctx, event)?;
        }
        Ok(())
    }
}
