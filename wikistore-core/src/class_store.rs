//! Class schema persistence
//!
//! A schema is stored as one class row plus one row per descriptor,
//! ordered by position. Allowed-values enumerations are stored joined
//! with `|`, the classic static-list encoding.

use crate::class::{ClassSchema, PropertyDescriptor, PropertyKind};
use crate::context::StoreContext;
use crate::error::{Result, StoreError};
use crate::store::WikiStore;
use rusqlite::{params, OptionalExtension};

const ALLOWED_VALUES_SEP: char = '|';

impl WikiStore {
    /// Persist a class schema. With `overwrite` the stored descriptor set
    /// is replaced entirely by the given one.
    pub fn save_class(
        &mut self,
        ctx: &StoreContext,
        schema: &ClassSchema,
        overwrite: bool,
    ) -> Result<()> {
        let wiki = ctx.database().to_string();
        self.with_txn(|store| {
            store.conn().execute(
                "INSERT OR IGNORE INTO classes (wiki, name) VALUES (?1, ?2)",
                params![wiki, schema.name()],
            )?;
            if overwrite {
                store.conn().execute(
                    "DELETE FROM class_properties WHERE wiki = ?1 AND class_name = ?2",
                    params![wiki, schema.name()],
                )?;
            }
            let mut stmt = store.conn().prepare_cached(
                "INSERT INTO class_properties
                 (wiki, class_name, position, name, pretty_name, kind, allowed_values, area_cols, area_rows)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (position, field) in schema.fields().iter().enumerate() {
                stmt.execute(params![
                    wiki,
                    schema.name(),
                    position as i64,
                    field.name,
                    field.pretty_name,
                    field.kind.to_tag(),
                    field.allowed_values.join(&ALLOWED_VALUES_SEP.to_string()),
                    field.area_cols,
                    field.area_rows,
                ])?;
            }
            tracing::debug!("saved class '{}' ({} fields)", schema.name(), schema.len());
            Ok(())
        })
    }

    /// Load a class schema by name. `NotFound` when never saved.
    pub fn load_class(&mut self, ctx: &StoreContext, name: &str) -> Result<ClassSchema> {
        let known: Option<String> = self
            .conn()
            .query_row(
                "SELECT name FROM classes WHERE wiki = ?1 AND name = ?2",
                params![ctx.database(), name],
                |r| r.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(StoreError::not_found(format!("class '{name}'")));
        }

        let mut schema = ClassSchema::new(name);
        let mut stmt = self.conn().prepare_cached(
            "SELECT name, pretty_name, kind, allowed_values, area_cols, area_rows
             FROM class_properties
             WHERE wiki = ?1 AND class_name = ?2
             ORDER BY position",
        )?;
        let mut rows = stmt.query(params![ctx.database(), name])?;
        while let Some(row) = rows.next()? {
            let field_name: String = row.get(0)?;
            let tag: i64 = row.get(2)?;
            let kind = PropertyKind::from_tag(tag)
                .ok_or_else(|| StoreError::decode(&field_name, format!("unknown kind tag {tag}")))?;
            let mut descriptor = PropertyDescriptor::new(&field_name, row.get::<_, String>(1)?, kind);
            let joined: String = row.get(3)?;
            if !joined.is_empty() {
                descriptor.allowed_values = joined
                    .split(ALLOWED_VALUES_SEP)
                    .map(str::to_string)
                    .collect();
            }
            descriptor.area_cols = row.get(4)?;
            descriptor.area_rows = row.get(5)?;
            schema.add_field(descriptor);
        }
        Ok(schema)
    }

    pub fn class_exists(&mut self, ctx: &StoreContext, name: &str) -> Result<bool> {
        Ok(self
            .conn()
            .query_row(
                "SELECT 1 FROM classes WHERE wiki = ?1 AND name = ?2",
                params![ctx.database(), name],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }

    /// Names of every class with at least one committed save: ordered,
    /// duplicate-free, empty on an empty backend.
    pub fn list_class_names(&mut self, ctx: &StoreContext) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT name FROM classes WHERE wiki = ?1 ORDER BY name")?;
        let mut rows = stmt.query(params![ctx.database()])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (WikiStore, StoreContext) {
        (WikiStore::open_in_memory().unwrap(), StoreContext::new("main"))
    }

    fn sample_schema() -> ClassSchema {
        let mut schema = ClassSchema::new("Test.Person");
        schema.add_string_field("first_name", "First Name");
        schema.add_number_field("age", "Age");
        schema.add_text_area_field("bio", "Biography", 80, 5);
        schema.add_static_list_field(
            "interval",
            "Interval",
            &["daily".to_string(), "weekly".to_string()],
        );
        schema.add_db_string_list_field("friends", "Friends");
        schema
    }

    #[test]
    fn test_class_round_trip() {
        let (mut store, ctx) = fixture();
        let schema = sample_schema();
        store.save_class(&ctx, &schema, true).unwrap();
        let loaded = store.load_class(&ctx, "Test.Person").unwrap();
        assert_eq!(loaded, schema);
    }

    #[test]
    fn test_class_round_trip_twice() {
        let (mut store, ctx) = fixture();
        let schema = sample_schema();
        store.save_class(&ctx, &schema, true).unwrap();
        store.save_class(&ctx, &schema, true).unwrap();
        assert_eq!(store.load_class(&ctx, "Test.Person").unwrap(), schema);
        assert_eq!(store.list_class_names(&ctx).unwrap(), vec!["Test.Person"]);
    }

    #[test]
    fn test_load_unknown_class_is_not_found() {
        let (mut store, ctx) = fixture();
        let err = store.load_class(&ctx, "Nope.Class").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_class_names_empty_backend() {
        let (mut store, ctx) = fixture();
        assert!(store.list_class_names(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_list_class_names_ordered_no_duplicates() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &ClassSchema::new("B.Class"), true).unwrap();
        store.save_class(&ctx, &ClassSchema::new("A.Class"), true).unwrap();
        store.save_class(&ctx, &ClassSchema::new("A.Class"), true).unwrap();
        assert_eq!(
            store.list_class_names(&ctx).unwrap(),
            vec!["A.Class", "B.Class"]
        );
    }

    #[test]
    fn test_overwrite_drops_removed_descriptor_rows() {
        let (mut store, ctx) = fixture();
        store.save_class(&ctx, &sample_schema(), true).unwrap();
        // A newer revision that declares fewer fields replaces the row set
        let mut slim = ClassSchema::new("Test.Person");
        slim.add_string_field("first_name", "First Name");
        store.save_class(&ctx, &slim, true).unwrap();
        assert_eq!(store.load_class(&ctx, "Test.Person").unwrap(), slim);
    }

    #[test]
    fn test_classes_are_tenant_scoped() {
        let (mut store, mut ctx) = fixture();
        store.save_class(&ctx, &sample_schema(), true).unwrap();
        ctx.set_database("tenant1");
        assert!(store.list_class_names(&ctx).unwrap().is_empty());
    }
}
