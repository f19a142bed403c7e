//! Object model: property values, property instances, object instances
//!
//! An object is one instantiation of a class's properties, identified by
//! (class name, owning document name, numeric index within the document).
//! Stores never retain these shapes across calls; persisted state of
//! record lives exclusively in the relational backend.

use serde::{Deserialize, Serialize};

/// Identity of an object: "object N of class C in document D".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub class_name: String,
    pub document: String,
    pub index: i64,
}

impl ObjectIdentity {
    pub fn new(class_name: impl Into<String>, document: impl Into<String>, index: i64) -> Self {
        Self {
            class_name: class_name.into(),
            document: document.into(),
            index,
        }
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}] in {}", self.class_name, self.index, self.document)
    }
}

/// Kind-specific payload of one property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl PropertyValue {
    /// Shape name used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            PropertyValue::Text(_) => "text",
            PropertyValue::Number(_) => "number",
            PropertyValue::List(_) => "list",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// A named value bound to one owning object.
///
/// Equality covers name, pretty name, owning identity and payload; the
/// pretty name is deliberately part of the contract, round trips through
/// storage must preserve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInstance {
    pub name: String,
    pub pretty_name: String,
    pub object: ObjectIdentity,
    pub value: PropertyValue,
}

impl PropertyInstance {
    pub fn new(
        name: impl Into<String>,
        pretty_name: impl Into<String>,
        object: ObjectIdentity,
        value: PropertyValue,
    ) -> Self {
        Self {
            name: name.into(),
            pretty_name: pretty_name.into(),
            object,
            value,
        }
    }
}

/// One object: identity plus ordered property values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInstance {
    identity: ObjectIdentity,
    properties: Vec<PropertyInstance>,
}

impl ObjectInstance {
    pub fn new(identity: ObjectIdentity) -> Self {
        Self {
            identity,
            properties: Vec::new(),
        }
    }

    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// Properties in insertion order.
    pub fn properties(&self) -> &[PropertyInstance] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&PropertyInstance> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Insert or replace a property, stamping this object's identity on it.
    /// Replacement keeps the property's position; inserts append.
    pub fn set_property(&mut self, mut property: PropertyInstance) {
        property.object = self.identity.clone();
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == property.name) {
            *existing = property;
        } else {
            self.properties.push(property);
        }
    }

    pub fn set_text(&mut self, name: &str, pretty_name: &str, value: impl Into<String>) {
        self.set_property(PropertyInstance::new(
            name,
            pretty_name,
            self.identity.clone(),
            PropertyValue::Text(value.into()),
        ));
    }

    pub fn set_number(&mut self, name: &str, pretty_name: &str, value: i64) {
        self.set_property(PropertyInstance::new(
            name,
            pretty_name,
            self.identity.clone(),
            PropertyValue::Number(value),
        ));
    }

    pub fn set_list(&mut self, name: &str, pretty_name: &str, items: Vec<String>) {
        self.set_property(PropertyInstance::new(
            name,
            pretty_name,
            self.identity.clone(),
            PropertyValue::List(items),
        ));
    }

    pub fn text_value(&self, name: &str) -> &str {
        self.get(name).and_then(|p| p.value.as_text()).unwrap_or("")
    }

    pub fn number_value(&self, name: &str) -> i64 {
        self.get(name).and_then(|p| p.value.as_number()).unwrap_or(0)
    }

    pub fn list_value(&self, name: &str) -> &[String] {
        self.get(name).and_then(|p| p.value.as_list()).unwrap_or(&[])
    }
}
