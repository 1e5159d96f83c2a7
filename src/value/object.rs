//! Embedded objects: a class name plus an ordered bag of named values.

use crate::error::InvalidValue;
use crate::value::reference::is_identifier;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedObject {
    class_name: String,
    properties: Vec<(String, Value)>,
}

impl EmbeddedObject {
    pub fn new(class_name: &str) -> Result<Self, InvalidValue> {
        if !is_identifier(class_name) {
            return Err(InvalidValue::InvalidReference(format!(
                "bad embedded object class {:?}",
                class_name
            )));
        }
        Ok(Self {
            class_name: class_name.to_string(),
            properties: Vec::new(),
        })
    }

    /// Add a property. Names are identifiers, unique ignoring ASCII case.
    pub fn with_property(mut self, name: &str, value: Value) -> Result<Self, InvalidValue> {
        if !is_identifier(name) {
            return Err(InvalidValue::InvalidPropertyName(name.to_string()));
        }
        if self.property(name).is_some() {
            return Err(InvalidValue::DuplicateProperty(name.to_string()));
        }
        self.properties.push((name.to_string(), value));
        Ok(self)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn properties(&self) -> &[(String, Value)] {
        &self.properties
    }
}
