//! Documents: named containers of objects, optionally defining a class
//!
//! The persistence engine does not own document lifecycles; it is handed
//! records to read or write. Saving a document persists its row, the
//! class it defines (a document's class carries the document's name) and
//! all of its objects in one unit of work.

use crate::class::ClassSchema;
use crate::context::StoreContext;
use crate::error::{Result, StoreError};
use crate::object::{ObjectIdentity, ObjectInstance};
use crate::store::WikiStore;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A wiki document: free-text content plus typed objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub name: String,
    pub content: String,
    pub class: Option<ClassSchema>,
    objects: Vec<ObjectInstance>,
}

impl DocumentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: String::new(),
            class: None,
            objects: Vec::new(),
        }
    }

    pub fn objects(&self) -> &[ObjectInstance] {
        &self.objects
    }

    /// Create a new object of the given class, assigning the next free
    /// index within this document. Returns the index.
    pub fn create_object(&mut self, class_name: &str) -> i64 {
        let index = self
            .objects
            .iter()
            .filter(|o| o.identity().class_name == class_name)
            .map(|o| o.identity().index)
            .max()
            .map_or(0, |i| i + 1);
        self.objects.push(ObjectInstance::new(ObjectIdentity::new(
            class_name,
            self.name.clone(),
            index,
        )));
        index
    }

    pub fn object(&self, class_name: &str, index: i64) -> Option<&ObjectInstance> {
        self.objects
            .iter()
            .find(|o| o.identity().class_name == class_name && o.identity().index == index)
    }

    pub fn object_mut(&mut self, class_name: &str, index: i64) -> Option<&mut ObjectInstance> {
        self.objects
            .iter_mut()
            .find(|o| o.identity().class_name == class_name && o.identity().index == index)
    }

    /// First object of the given class, if any.
    pub fn first_object(&self, class_name: &str) -> Option<&ObjectInstance> {
        self.objects
            .iter()
            .find(|o| o.identity().class_name == class_name)
    }

    /// Insert or replace an object by identity.
    pub fn add_object(&mut self, object: ObjectInstance) {
        if let Some(existing) = self
            .objects
            .iter_mut()
            .find(|o| o.identity() == object.identity())
        {
            *existing = object;
        } else {
            self.objects.push(object);
        }
    }

    /// Set a text property on the first object of `class_name`, creating
    /// the object if the document has none yet.
    pub fn set_text_value(&mut self, class_name: &str, name: &str, value: impl Into<String>) {
        if self.first_object(class_name).is_none() {
            self.create_object(class_name);
        }
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.identity().class_name == class_name)
            .expect("object created above");
        object.set_text(name, "", value);
    }

    /// Text value of a property on the first object of `class_name`;
    /// empty when absent.
    pub fn text_value(&self, class_name: &str, name: &str) -> &str {
        self.first_object(class_name)
            .map(|o| o.text_value(name))
            .unwrap_or("")
    }
}

/// Document repository facade consumed by features built on the engine.
pub trait DocumentRepository {
    fn get_document(&mut self, ctx: &StoreContext, name: &str) -> Result<DocumentRecord>;
    fn save_document(
        &mut self,
        ctx: &StoreContext,
        doc: &DocumentRecord,
        comment: &str,
        minor_edit: bool,
    ) -> Result<()>;
}

impl DocumentRepository for WikiStore {
    fn get_document(&mut self, ctx: &StoreContext, name: &str) -> Result<DocumentRecord> {
        let content: Option<String> = self
            .conn()
            .query_row(
                "SELECT content FROM documents WHERE wiki = ?1 AND name = ?2",
                params![ctx.database(), name],
                |r| r.get(0),
            )
            .optional()?;
        let content = content.ok_or_else(|| StoreError::not_found(format!("document '{name}'")))?;

        let mut doc = DocumentRecord::new(name);
        doc.content = content;
        doc.class = match self.load_class(ctx, name) {
            Ok(schema) => Some(schema),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        for identity in self.objects_in_document(ctx, name)? {
            doc.objects.push(self.load_object(ctx, &identity, false)?);
        }
        Ok(doc)
    }

    fn save_document(
        &mut self,
        ctx: &StoreContext,
        doc: &DocumentRecord,
        comment: &str,
        minor_edit: bool,
    ) -> Result<()> {
        let wiki = ctx.database().to_string();
        self.with_txn(|store| {
            store.conn().execute(
                "INSERT INTO documents (wiki, name, content, comment, minor_edit, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(wiki, name) DO UPDATE SET
                     content = excluded.content,
                     comment = excluded.comment,
                     minor_edit = excluded.minor_edit,
                     saved_at = excluded.saved_at",
                params![
                    wiki,
                    doc.name,
                    doc.content,
                    comment,
                    minor_edit as i64,
                    chrono::Utc::now().timestamp(),
                ],
            )?;
            if let Some(schema) = &doc.class {
                store.save_class(ctx, schema, true)?;
            }
            for object in &doc.objects {
                store.save_object(ctx, object, true)?;
            }
            tracing::debug!("saved document '{}' ({} objects)", doc.name, doc.objects.len());
            Ok(())
        })
    }
}
