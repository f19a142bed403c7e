//! Class schemas: named, ordered sets of typed property descriptors
//!
//! A class describes the shape of its objects. Evolution is strictly
//! additive: fields are added if absent and never removed or retyped.
//! Every `add_*_field` call is an idempotent "ensure this field exists"
//! operation, safe to re-run on every initialization path.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Storage kind of a property. Selects the codec and the payload table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Single-line scalar string
    String,
    /// Integer scalar
    Number,
    /// Multi-line scalar string (display differs, storage matches String)
    TextArea,
    /// Ordered list of strings stored one row per element
    StringList,
    /// Cross-reference list (document names), stored like StringList
    DbStringList,
    /// List restricted to an enumerated set of allowed values
    StaticList,
}

impl PropertyKind {
    /// Stable integer tag persisted alongside each property row.
    pub fn to_tag(self) -> i64 {
        match self {
            PropertyKind::String => 0,
            PropertyKind::Number => 1,
            PropertyKind::TextArea => 2,
            PropertyKind::StringList => 3,
            PropertyKind::DbStringList => 4,
            PropertyKind::StaticList => 5,
        }
    }

    /// Reverse of [`to_tag`]. Unknown tags are a decode failure upstream.
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            0 => Some(PropertyKind::String),
            1 => Some(PropertyKind::Number),
            2 => Some(PropertyKind::TextArea),
            3 => Some(PropertyKind::StringList),
            4 => Some(PropertyKind::DbStringList),
            5 => Some(PropertyKind::StaticList),
            _ => None,
        }
    }

    /// True for kinds stored one row per list element. A static list
    /// stores a single selection out of its enumeration, so it is scalar.
    pub fn is_list(self) -> bool {
        matches!(self, PropertyKind::StringList | PropertyKind::DbStringList)
    }

    /// Value an object decodes to for a schema field that was never written.
    pub fn zero_value(self) -> crate::object::PropertyValue {
        use crate::object::PropertyValue;
        match self {
            PropertyKind::String | PropertyKind::TextArea | PropertyKind::StaticList => {
                PropertyValue::Text(String::new())
            }
            PropertyKind::Number => PropertyValue::Number(0),
            _ => PropertyValue::List(Vec::new()),
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PropertyKind::String => "String",
            PropertyKind::Number => "Number",
            PropertyKind::TextArea => "TextArea",
            PropertyKind::StringList => "StringList",
            PropertyKind::DbStringList => "DbStringList",
            PropertyKind::StaticList => "StaticList",
        };
        f.write_str(s)
    }
}

/// One typed property declaration within a class.
///
/// `allowed_values` is meaningful for `StaticList` fields only;
/// `area_cols`/`area_rows` are TextArea presentation hints and play no
/// part in persistence correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub pretty_name: String,
    pub kind: PropertyKind,
    pub allowed_values: Vec<String>,
    pub area_cols: i64,
    pub area_rows: i64,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, pretty_name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            pretty_name: pretty_name.into(),
            kind,
            allowed_values: Vec::new(),
            area_cols: 0,
            area_rows: 0,
        }
    }
}

/// A class: unique name plus an ordered mapping from property name to
/// descriptor. Property names are unique within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSchema {
    name: String,
    fields: Vec<PropertyDescriptor>,
}

impl ClassSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[PropertyDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PropertyDescriptor> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Add a field if no field with that name exists yet.
    /// Returns true iff the schema was mutated.
    pub fn add_field(&mut self, descriptor: PropertyDescriptor) -> bool {
        if self.contains(&descriptor.name) {
            return false;
        }
        self.fields.push(descriptor);
        true
    }

    pub fn add_string_field(&mut self, name: &str, pretty_name: &str) -> bool {
        self.add_field(PropertyDescriptor::new(name, pretty_name, PropertyKind::String))
    }

    pub fn add_number_field(&mut self, name: &str, pretty_name: &str) -> bool {
        self.add_field(PropertyDescriptor::new(name, pretty_name, PropertyKind::Number))
    }

    pub fn add_text_area_field(&mut self, name: &str, pretty_name: &str, cols: i64, rows: i64) -> bool {
        let mut descriptor = PropertyDescriptor::new(name, pretty_name, PropertyKind::TextArea);
        descriptor.area_cols = cols;
        descriptor.area_rows = rows;
        self.add_field(descriptor)
    }

    pub fn add_static_list_field(&mut self, name: &str, pretty_name: &str, values: &[String]) -> bool {
        let mut descriptor = PropertyDescriptor::new(name, pretty_name, PropertyKind::StaticList);
        descriptor.allowed_values = values.to_vec();
        self.add_field(descriptor)
    }

    pub fn add_string_list_field(&mut self, name: &str, pretty_name: &str) -> bool {
        self.add_field(PropertyDescriptor::new(name, pretty_name, PropertyKind::StringList))
    }

    pub fn add_db_string_list_field(&mut self, name: &str, pretty_name: &str) -> bool {
        self.add_field(PropertyDescriptor::new(name, pretty_name, PropertyKind::DbStringList))
    }

    /// Recompute a static-list field's allowed values against an external
    /// required list. The result keeps entries still required (in required
    /// order) and appends newly required ones; entries no longer required
    /// drop out of the enumeration. The field itself is never removed.
    /// Returns true iff the enumeration changed.
    pub fn sync_allowed_values(&mut self, field: &str, required: &[String]) -> Result<bool> {
        let descriptor = self
            .get_mut(field)
            .ok_or_else(|| StoreError::not_found(format!("field '{field}'")))?;
        if descriptor.kind != PropertyKind::StaticList {
            return Err(StoreError::type_mismatch(
                field,
                format!("sync_allowed_values on {} field", descriptor.kind),
            ));
        }

        let existing = &descriptor.allowed_values;
        let mut updated: Vec<String> = required
            .iter()
            .filter(|r| existing.contains(r))
            .cloned()
            .collect();
        for missing in required.iter().filter(|r| !existing.contains(r)) {
            updated.push(missing.clone());
        }

        let changed = updated != *existing;
        if changed {
            descriptor.allowed_values = updated;
        }
        Ok(changed)
    }
}
