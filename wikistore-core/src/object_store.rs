//! Object persistence: whole objects and single properties
//!
//! Rows are keyed by a surrogate object id resolved from the identity
//! (wiki, class name, document name, index). Each property owns a row
//! group: one registry row (name, pretty name, kind tag) plus scalar or
//! per-element payload rows. Overwrites replace the whole row group,
//! never a row-by-row diff, since kind or cardinality may change between
//! class revisions.

use crate::class::PropertyKind;
use crate::codec::{self, RowPayload};
use crate::context::StoreContext;
use crate::error::{Result, StoreError};
use crate::object::{ObjectIdentity, ObjectInstance, PropertyInstance};
use crate::store::WikiStore;
use rusqlite::{params, Connection, OptionalExtension};

/// One fully encoded property, staged before any row is touched.
struct EncodedProperty {
    name: String,
    pretty_name: String,
    kind: PropertyKind,
    payload: RowPayload,
}

impl WikiStore {
    /// Persist a single property inside one transaction, replacing any
    /// existing row group for (object, name).
    pub fn save_property(
        &mut self,
        ctx: &StoreContext,
        property: &PropertyInstance,
        kind: PropertyKind,
    ) -> Result<()> {
        let payload = codec::encode(&property.name, &property.value, kind)?;
        let wiki = ctx.database().to_string();
        self.with_txn(|store| {
            let object_id = ensure_object_row(store.conn(), &wiki, &property.object)?;
            clear_property_rows(store.conn(), object_id, &property.name)?;
            insert_property_rows(
                store.conn(),
                object_id,
                &property.name,
                &property.pretty_name,
                kind,
                &payload,
            )
        })
    }

    /// Load a single property. `NotFound` when never written.
    pub fn load_property(
        &mut self,
        ctx: &StoreContext,
        object: &ObjectIdentity,
        name: &str,
    ) -> Result<PropertyInstance> {
        let object_id = object_row_id(self.conn(), ctx.database(), object)?
            .ok_or_else(|| StoreError::not_found(format!("object {object}")))?;
        let (pretty_name, tag) = registry_row(self.conn(), object_id, name)?
            .ok_or_else(|| StoreError::not_found(format!("property '{name}' of {object}")))?;
        let kind = PropertyKind::from_tag(tag)
            .ok_or_else(|| StoreError::decode(name, format!("unknown kind tag {tag}")))?;
        let payload = read_payload(self.conn(), object_id, name, kind)?
            .ok_or_else(|| StoreError::decode(name, "registry row without a value row"))?;
        let value = codec::decode(name, payload, kind)?;
        Ok(PropertyInstance::new(name, pretty_name, object.clone(), value))
    }

    /// Persist every property of `object` as one transactional unit.
    ///
    /// When the object's class schema is stored, every property must be
    /// declared by it with a matching kind; any violation rejects the
    /// whole write before a single row is staged. With `overwrite` the
    /// identity's entire existing row group is deleted first.
    pub fn save_object(
        &mut self,
        ctx: &StoreContext,
        object: &ObjectInstance,
        overwrite: bool,
    ) -> Result<()> {
        let identity = object.identity().clone();
        let wiki = ctx.database().to_string();
        self.with_txn(|store| {
            let schema = match store.load_class(ctx, &identity.class_name) {
                Ok(schema) => Some(schema),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };

            // Encode everything up front so a bad property leaves no rows behind.
            let mut encoded = Vec::with_capacity(object.properties().len());
            for property in object.properties() {
                let kind = match &schema {
                    Some(schema) => {
                        schema
                            .get(&property.name)
                            .ok_or_else(|| {
                                StoreError::type_mismatch(
                                    &property.name,
                                    format!("not declared by class '{}'", identity.class_name),
                                )
                            })?
                            .kind
                    }
                    None => inferred_kind(property),
                };
                encoded.push(EncodedProperty {
                    name: property.name.clone(),
                    pretty_name: property.pretty_name.clone(),
                    kind,
                    payload: codec::encode(&property.name, &property.value, kind)?,
                });
            }

            if overwrite {
                if let Some(object_id) = object_row_id(store.conn(), &wiki, &identity)? {
                    delete_object_rows(store.conn(), object_id)?;
                }
            }
            let object_id = ensure_object_row(store.conn(), &wiki, &identity)?;
            for property in &encoded {
                insert_property_rows(
                    store.conn(),
                    object_id,
                    &property.name,
                    &property.pretty_name,
                    property.kind,
                    &property.payload,
                )?;
            }
            tracing::debug!("saved {} ({} properties)", identity, encoded.len());
            Ok(())
        })
    }

    /// Load a whole object from its identity.
    ///
    /// Schema-driven: every field of the class's current schema
    /// materializes, fields never written decode to the kind's zero
    /// value. A malformed row propagates in strict mode and is skipped
    /// otherwise. Without a stored schema, falls back to the registry
    /// rows that were actually written.
    pub fn load_object(
        &mut self,
        ctx: &StoreContext,
        identity: &ObjectIdentity,
        strict: bool,
    ) -> Result<ObjectInstance> {
        let object_id = object_row_id(self.conn(), ctx.database(), identity)?
            .ok_or_else(|| StoreError::not_found(format!("object {identity}")))?;
        let schema = match self.load_class(ctx, &identity.class_name) {
            Ok(schema) => Some(schema),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let mut object = ObjectInstance::new(identity.clone());
        match schema {
            Some(schema) => {
                for descriptor in schema.fields() {
                    match registry_row(self.conn(), object_id, &descriptor.name)? {
                        Some((pretty_name, tag)) => {
                            match decode_stored(self.conn(), object_id, &descriptor.name, tag, descriptor.kind) {
                                Ok(value) => object.set_property(PropertyInstance::new(
                                    &descriptor.name,
                                    pretty_name,
                                    identity.clone(),
                                    value,
                                )),
                                Err(e) if strict => return Err(e),
                                Err(e) => {
                                    tracing::warn!("skipping property '{}' of {}: {}", descriptor.name, identity, e);
                                }
                            }
                        }
                        None => object.set_property(PropertyInstance::new(
                            &descriptor.name,
                            &descriptor.pretty_name,
                            identity.clone(),
                            descriptor.kind.zero_value(),
                        )),
                    }
                }
            }
            None => {
                for (name, pretty_name, tag) in registry_rows(self.conn(), object_id)? {
                    let declared = PropertyKind::from_tag(tag);
                    let outcome = match declared {
                        Some(kind) => decode_stored(self.conn(), object_id, &name, tag, kind),
                        None => Err(StoreError::decode(&name, format!("unknown kind tag {tag}"))),
                    };
                    match outcome {
                        Ok(value) => object.set_property(PropertyInstance::new(
                            &name,
                            pretty_name,
                            identity.clone(),
                            value,
                        )),
                        Err(e) if strict => return Err(e),
                        Err(e) => tracing::warn!("skipping property '{}' of {}: {}", name, identity, e),
                    }
                }
            }
        }
        Ok(object)
    }

    /// Delete an object and its whole row group.
    pub fn delete_object(&mut self, ctx: &StoreContext, identity: &ObjectIdentity) -> Result<()> {
        let wiki = ctx.database().to_string();
        let identity = identity.clone();
        self.with_txn(|store| {
            if let Some(object_id) = object_row_id(store.conn(), &wiki, &identity)? {
                delete_object_rows(store.conn(), object_id)?;
            }
            Ok(())
        })
    }

    /// Identities of every object stored for a document, ordered by class
    /// then index.
    pub fn objects_in_document(
        &mut self,
        ctx: &StoreContext,
        doc_name: &str,
    ) -> Result<Vec<ObjectIdentity>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT class_name, obj_index FROM objects
             WHERE wiki = ?1 AND doc_name = ?2
             ORDER BY class_name, obj_index",
        )?;
        let mut rows = stmt.query(params![ctx.database(), doc_name])?;
        let mut identities = Vec::new();
        while let Some(row) = rows.next()? {
            let class_name: String = row.get(0)?;
            let index: i64 = row.get(1)?;
            identities.push(ObjectIdentity::new(class_name, doc_name, index));
        }
        Ok(identities)
    }
}

/// Storage kind for objects whose class was never saved.
fn inferred_kind(property: &PropertyInstance) -> PropertyKind {
    use crate::object::PropertyValue;
    match property.value {
        PropertyValue::Text(_) => PropertyKind::String,
        PropertyValue::Number(_) => PropertyKind::Number,
        PropertyValue::List(_) => PropertyKind::StringList,
    }
}

/// Read rows under the registry's kind tag, decode under the declared one.
fn decode_stored(
    conn: &Connection,
    object_id: i64,
    name: &str,
    stored_tag: i64,
    declared: PropertyKind,
) -> Result<crate::object::PropertyValue> {
    let stored = PropertyKind::from_tag(stored_tag)
        .ok_or_else(|| StoreError::decode(name, format!("unknown kind tag {stored_tag}")))?;
    let payload = read_payload(conn, object_id, name, stored)?
        .ok_or_else(|| StoreError::decode(name, "registry row without a value row"))?;
    codec::decode(name, payload, declared)
}

fn object_row_id(conn: &Connection, wiki: &str, identity: &ObjectIdentity) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM objects
             WHERE wiki = ?1 AND class_name = ?2 AND doc_name = ?3 AND obj_index = ?4",
            params![wiki, identity.class_name, identity.document, identity.index],
            |r| r.get(0),
        )
        .optional()?)
}

fn ensure_object_row(conn: &Connection, wiki: &str, identity: &ObjectIdentity) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO objects (wiki, class_name, doc_name, obj_index)
         VALUES (?1, ?2, ?3, ?4)",
        params![wiki, identity.class_name, identity.document, identity.index],
    )?;
    object_row_id(conn, wiki, identity)?
        .ok_or_else(|| StoreError::not_found(format!("object row for {identity}")))
}

fn registry_row(conn: &Connection, object_id: i64, name: &str) -> Result<Option<(String, i64)>> {
    Ok(conn
        .query_row(
            "SELECT pretty_name, kind FROM properties WHERE object_id = ?1 AND name = ?2",
            params![object_id, name],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?)
}

fn registry_rows(conn: &Connection, object_id: i64) -> Result<Vec<(String, String, i64)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT name, pretty_name, kind FROM properties WHERE object_id = ?1 ORDER BY name",
    )?;
    let mut rows = stmt.query(params![object_id])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push((row.get(0)?, row.get(1)?, row.get(2)?));
    }
    Ok(result)
}

fn insert_property_rows(
    conn: &Connection,
    object_id: i64,
    name: &str,
    pretty_name: &str,
    kind: PropertyKind,
    payload: &RowPayload,
) -> Result<()> {
    conn.execute(
        "INSERT INTO properties (object_id, name, pretty_name, kind) VALUES (?1, ?2, ?3, ?4)",
        params![object_id, name, pretty_name, kind.to_tag()],
    )?;
    match payload {
        RowPayload::Text(value) => {
            conn.execute(
                "INSERT INTO property_texts (object_id, name, value) VALUES (?1, ?2, ?3)",
                params![object_id, name, value],
            )?;
        }
        RowPayload::Number(value) => {
            conn.execute(
                "INSERT INTO property_numbers (object_id, name, value) VALUES (?1, ?2, ?3)",
                params![object_id, name, value],
            )?;
        }
        RowPayload::Items(items) => {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO property_list_items (object_id, name, item_index, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (index, item) in items.iter().enumerate() {
                stmt.execute(params![object_id, name, index as i64, item])?;
            }
        }
    }
    Ok(())
}

fn read_payload(
    conn: &Connection,
    object_id: i64,
    name: &str,
    kind: PropertyKind,
) -> Result<Option<RowPayload>> {
    if kind.is_list() {
        let mut stmt = conn.prepare_cached(
            "SELECT value FROM property_list_items
             WHERE object_id = ?1 AND name = ?2 ORDER BY item_index",
        )?;
        let mut rows = stmt.query(params![object_id, name])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(row.get(0)?);
        }
        // An empty list is a valid row group: the registry row carries it.
        return Ok(Some(RowPayload::Items(items)));
    }
    match kind {
        PropertyKind::Number => Ok(conn
            .query_row(
                "SELECT value FROM property_numbers WHERE object_id = ?1 AND name = ?2",
                params![object_id, name],
                |r| r.get(0),
            )
            .optional()?
            .map(RowPayload::Number)),
        _ => Ok(conn
            .query_row(
                "SELECT value FROM property_texts WHERE object_id = ?1 AND name = ?2",
                params![object_id, name],
                |r| r.get(0),
            )
            .optional()?
            .map(RowPayload::Text)),
    }
}

fn clear_property_rows(conn: &Connection, object_id: i64, name: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM properties WHERE object_id = ?1 AND name = ?2",
        params![object_id, name],
    )?;
    conn.execute(
        "DELETE FROM property_texts WHERE object_id = ?1 AND name = ?2",
        params![object_id, name],
    )?;
    conn.execute(
        "DELETE FROM property_numbers WHERE object_id = ?1 AND name = ?2",
        params![object_id, name],
    )?;
    conn.execute(
        "DELETE FROM property_list_items WHERE object_id = ?1 AND name = ?2",
        params![object_id, name],
    )?;
    Ok(())
}

fn delete_object_rows(conn: &Connection, object_id: i64) -> Result<()> {
    conn.execute("DELETE FROM properties WHERE object_id = ?1", params![object_id])?;
    conn.execute("DELETE FROM property_texts WHERE object_id = ?1", params![object_id])?;
    conn.execute("DELETE FROM property_numbers WHERE object_id = ?1", params![object_id])?;
    conn.execute("DELETE FROM property_list_items WHERE object_id = ?1", params![object_id])?;
    conn.execute("DELETE FROM objects WHERE id = ?1", params![object_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassSchema;
    use crate::object::PropertyValue;

    fn fixture() -> (WikiStore, StoreContext) {
        (WikiStore::open_in_memory().unwrap(), StoreContext::new("main"))
    }

    fn identity() -> ObjectIdentity {
        ObjectIdentity::new("Test.Person", "Test.PersonDoc", 0)
    }

    fn property_round_trip(value: PropertyValue, kind: PropertyKind) {
        let (mut store, ctx) = fixture();
        let prop = PropertyInstance::new("prop", "Pretty Prop", identity(), value);
        store.save_property(&ctx, &prop, kind).unwrap();
        let loaded = store.load_property(&ctx, &identity(), "prop").unwrap();
        assert_eq!(loaded, prop);
    }

    #[test]
    fn test_string_property_round_trip() {
        property_round_trip(PropertyValue::Text("Ludovic".into()), PropertyKind::String);
    }

    #[test]
    fn test_number_property_round_trip() {
        property_round_trip(PropertyValue::Number(33), PropertyKind::Number);
        property_round_trip(PropertyValue::Number(0), PropertyKind::Number);
        property_round_trip(PropertyValue::Number(-7), PropertyKind::Number);
    }

    #[test]
    fn test_string_list_property_round_trip() {
        property_round_trip(
            PropertyValue::List(vec!["c".into(), "a".into(), "b".into()]),
            PropertyKind::StringList,
        );
        property_round_trip(PropertyValue::List(Vec::new()), PropertyKind::StringList);
    }

    #[test]
    fn test_db_string_list_property_round_trip() {
        property_round_trip(
            PropertyValue::List(vec!["Main.WebHome".into(), "Test.Page".into()]),
            PropertyKind::DbStringList,
        );
    }

    #[test]
    fn test_save_property_twice_updates_in_place() {
        let (mut store, ctx) = fixture();
        let mut prop = PropertyInstance::new(
            "prop",
            "Pretty",
            identity(),
            PropertyValue::Text("first".into()),
        );
        store.save_property(&ctx, &prop, PropertyKind::String).unwrap();
        prop.value = PropertyValue::Text("second".into());
        store.save_property(&ctx, &prop, PropertyKind::String).unwrap();
        let loaded = store.load_property(&ctx, &identity(), "prop").unwrap();
        assert_eq!(loaded, prop);
    }

    #[test]
    fn test_save_property_kind_mismatch_rejected() {
        let (mut store, ctx) = fixture();
        let prop = PropertyInstance::new(
            "age",
            "Age",
            identity(),
            PropertyValue::Text("not a number".into()),
        );
        let err = store.save_property(&ctx, &prop, PropertyKind::Number).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        // Nothing committed, not even the object row
        assert!(matches!(
            store.load_property(&ctx, &identity(), "age").unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_load_property_never_written_is_not_found() {
        let (mut store, ctx) = fixture();
        let err = store.load_property(&ctx, &identity(), "ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    fn person_schema() -> ClassSchema {
        let mut schema = ClassSchema::new("Test.Person");
        schema.add_string_field("first_name", "First Name");
        schema.add_number_field("age", "Age");
        schema
    }

    fn person_object() -> ObjectInstance {
        let mut object = ObjectInstance::new(identity());
        object.set_text("first_name", "First Name", "Ludovic");
        object.set_number("age", "Age", 33);
        object
    }

    #[test]
    fn test_object_round_trip() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        let object = person_object();
        store.save_object(&ctx, &object, true).unwrap();
        let loaded = store.load_object(&ctx, &identity(), true).unwrap();
        assert_eq!(loaded, object);
    }

    #[test]
    fn test_object_round_trip_without_stored_class() {
        let (mut store, ctx) = fixture();
        let object = person_object();
        store.save_object(&ctx, &object, true).unwrap();
        let loaded = store.load_object(&ctx, &identity(), true).unwrap();
        // Fallback load orders properties by name
        assert_eq!(loaded.get("first_name"), object.get("first_name"));
        assert_eq!(loaded.get("age"), object.get("age"));
        assert_eq!(loaded.properties().len(), 2);
    }

    #[test]
    fn test_overwrite_replaces_not_merges() {
        let (mut store, ctx) = fixture();
        let mut object = ObjectInstance::new(identity());
        object.set_text("first_name", "First Name", "Ludovic");
        object.set_number("age", "Age", 33);
        store.save_object(&ctx, &object, true).unwrap();

        let mut second = ObjectInstance::new(identity());
        second.set_text("first_name", "First Name", "Vincent");
        store.save_object(&ctx, &second, true).unwrap();

        let loaded = store.load_object(&ctx, &identity(), true).unwrap();
        assert_eq!(loaded, second);
        assert!(loaded.get("age").is_none());
    }

    #[test]
    fn test_schema_field_never_written_loads_zero_value() {
        let (mut store, ctx) = fixture();
        let mut schema = person_schema();
        schema.add_string_list_field("tags", "Tags");
        store.save_class(&ctx, &schema, true).unwrap();

        let mut object = ObjectInstance::new(identity());
        object.set_text("first_name", "First Name", "Ludovic");
        store.save_object(&ctx, &object, true).unwrap();

        let loaded = store.load_object(&ctx, &identity(), true).unwrap();
        assert_eq!(loaded.number_value("age"), 0);
        assert!(loaded.list_value("tags").is_empty());
        assert_eq!(loaded.get("age").unwrap().pretty_name, "Age");
    }

    #[test]
    fn test_unknown_property_rejected_by_schema() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        let mut object = person_object();
        object.set_text("nickname", "Nickname", "ludo");
        let err = store.save_object(&ctx, &object, true).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        // Whole write rejected
        assert!(matches!(
            store.load_object(&ctx, &identity(), true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_kind_mismatch_rejects_whole_object_write() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        let mut object = ObjectInstance::new(identity());
        object.set_text("first_name", "First Name", "Ludovic");
        object.set_text("age", "Age", "thirty-three");
        let err = store.save_object(&ctx, &object, true).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert!(matches!(
            store.load_object(&ctx, &identity(), true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_backend_failure_mid_write_leaves_nothing_visible() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        // Make the second property's insert fail at the backend
        store.run_sql("DROP TABLE property_numbers").unwrap();
        let err = store.save_object(&ctx, &person_object(), true).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        let visible: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM objects", [], |r| r.get(0))
            .unwrap();
        assert_eq!(visible, 0);
    }

    #[test]
    fn test_explicit_rollback_hides_object_write() {
        let (mut store, ctx) = fixture();
        store.begin_transaction().unwrap();
        store.save_object(&ctx, &person_object(), true).unwrap();
        store.end_transaction(false).unwrap();
        assert!(matches!(
            store.load_object(&ctx, &identity(), true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_strict_load_propagates_corrupted_kind() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        store.save_object(&ctx, &person_object(), true).unwrap();
        // Corrupt the stored kind tag directly
        store
            .run_sql("UPDATE properties SET kind = 99 WHERE name = 'age'")
            .unwrap();
        let err = store.load_object(&ctx, &identity(), true).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn test_non_strict_load_skips_corrupted_property() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &person_schema(), true).unwrap();
        store.save_object(&ctx, &person_object(), true).unwrap();
        store
            .run_sql("UPDATE properties SET kind = 99 WHERE name = 'age'")
            .unwrap();
        let loaded = store.load_object(&ctx, &identity(), false).unwrap();
        assert_eq!(loaded.text_value("first_name"), "Ludovic");
        assert!(loaded.get("age").is_none());
    }

    #[test]
    fn test_objects_are_tenant_scoped() {
        let (mut store, mut ctx) = fixture();
        store.save_object(&ctx, &person_object(), true).unwrap();
        ctx.set_database("tenant1");
        assert!(matches!(
            store.load_object(&ctx, &identity(), true).unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_delete_object_removes_row_group() {
        let (mut store, ctx) = fixture();
        store.save_object(&ctx, &person_object(), true).unwrap();
        store.delete_object(&ctx, &identity()).unwrap();
        assert!(matches!(
            store.load_object(&ctx, &identity(), true).unwrap_err(),
            StoreError::NotFound(_)
        ));
        let orphans: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM property_texts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
