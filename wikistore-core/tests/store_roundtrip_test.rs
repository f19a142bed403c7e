//! End-to-end store scenarios against an on-disk database

use tempfile::TempDir;
use wikistore_core::{
    ClassSchema, DocumentRecord, DocumentRepository, ObjectIdentity, StoreContext, StoreError,
    WikiStore,
};

#[test]
fn test_person_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("wiki.sqlite");
    let mut store = WikiStore::open(&db).unwrap();
    let ctx = StoreContext::new("main");

    let mut schema = ClassSchema::new("Person");
    schema.add_string_field("first_name", "First Name");
    schema.add_number_field("age", "Age");
    store.save_class(&ctx, &schema, true).unwrap();

    let identity = ObjectIdentity::new("Person", "Test.Person", 0);
    let mut object = wikistore_core::ObjectInstance::new(identity.clone());
    object.set_text("first_name", "First Name", "Ludovic");
    object.set_number("age", "Age", 33);
    store.save_object(&ctx, &object, true).unwrap();

    let loaded = store.load_object(&ctx, &identity, true).unwrap();
    assert_eq!(loaded.text_value("first_name"), "Ludovic");
    assert_eq!(loaded.number_value("age"), 33);
    assert_eq!(loaded, object);

    let names = store.list_class_names(&ctx).unwrap();
    assert!(names.contains(&"Person".to_string()));
}

#[test]
fn test_state_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("wiki.sqlite");
    let ctx = StoreContext::new("main");
    let identity = ObjectIdentity::new("Person", "Test.Person", 0);

    {
        let mut store = WikiStore::open(&db).unwrap();
        let mut schema = ClassSchema::new("Person");
        schema.add_string_field("first_name", "First Name");
        store.save_class(&ctx, &schema, true).unwrap();
        let mut object = wikistore_core::ObjectInstance::new(identity.clone());
        object.set_text("first_name", "First Name", "Ludovic");
        store.save_object(&ctx, &object, true).unwrap();
    }
    {
        let mut store = WikiStore::open(&db).unwrap();
        let loaded = store.load_object(&ctx, &identity, true).unwrap();
        assert_eq!(loaded.text_value("first_name"), "Ludovic");
        assert_eq!(store.list_class_names(&ctx).unwrap(), vec!["Person"]);
    }
}

#[test]
fn test_rollback_leaves_committed_state_untouched() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("wiki.sqlite");
    let mut store = WikiStore::open(&db).unwrap();
    let ctx = StoreContext::new("main");
    let identity = ObjectIdentity::new("Person", "Test.Person", 0);

    let mut object = wikistore_core::ObjectInstance::new(identity.clone());
    object.set_text("first_name", "First Name", "Ludovic");
    store.save_object(&ctx, &object, true).unwrap();

    store.begin_transaction().unwrap();
    let mut replacement = wikistore_core::ObjectInstance::new(identity.clone());
    replacement.set_text("first_name", "First Name", "Vincent");
    store.save_object(&ctx, &replacement, true).unwrap();
    store.end_transaction(false).unwrap();

    let loaded = store.load_object(&ctx, &identity, true).unwrap();
    assert_eq!(loaded.text_value("first_name"), "Ludovic");
}

#[test]
fn test_document_save_path() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("wiki.sqlite");
    let mut store = WikiStore::open(&db).unwrap();
    let ctx = StoreContext::new("main");

    let mut doc = DocumentRecord::new("Test.Person");
    doc.content = "= Person =".to_string();
    let mut schema = ClassSchema::new("Test.Person");
    schema.add_string_field("first_name", "First Name");
    schema.add_number_field("age", "Age");
    doc.class = Some(schema);
    let index = doc.create_object("Test.Person");
    {
        let object = doc.object_mut("Test.Person", index).unwrap();
        object.set_text("first_name", "First Name", "Ludovic");
        object.set_number("age", "Age", 33);
    }
    store.save_document(&ctx, &doc, "created person", false).unwrap();

    let loaded = store.get_document(&ctx, "Test.Person").unwrap();
    assert_eq!(loaded, doc);

    assert!(matches!(
        store.get_document(&ctx, "Test.Missing").unwrap_err(),
        StoreError::NotFound(_)
    ));
}
