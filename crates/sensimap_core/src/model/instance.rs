//! Materialized model instances.
//!
//! An instance is an ordered set of named values. Composite instances nest a
//! sub-instance per field, e.g. `{model: {...}, perturbation: {...}}`.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceValue {
    Scalar(f64),
    Nested(ModelInstance),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelInstance {
    fields: Vec<(String, InstanceValue)>,
}

impl ModelInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style scalar field
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, InstanceValue::Scalar(value));
        self
    }

    /// Builder-style nested field
    #[must_use]
    pub fn with_instance(mut self, name: impl Into<String>, instance: ModelInstance) -> Self {
        self.insert(name, InstanceValue::Nested(instance));
        self
    }

    /// Insert a field, replacing any existing field of the same name in place
    pub fn insert(&mut self, name: impl Into<String>, value: InstanceValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InstanceValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Scalar field value, `None` if missing or nested
    pub fn value(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            InstanceValue::Scalar(value) => Some(*value),
            InstanceValue::Nested(_) => None,
        }
    }

    /// Nested field, `None` if missing or scalar
    pub fn instance(&self, name: &str) -> Option<&ModelInstance> {
        match self.get(name)? {
            InstanceValue::Nested(instance) => Some(instance),
            InstanceValue::Scalar(_) => None,
        }
    }

    pub fn require_value(&self, name: &str) -> Result<f64, ModelError> {
        self.value(name)
            .ok_or_else(|| ModelError::MissingField(name.to_string()))
    }

    pub fn require_instance(&self, name: &str) -> Result<&ModelInstance, ModelError> {
        self.instance(name)
            .ok_or_else(|| ModelError::MissingField(name.to_string()))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &InstanceValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let instance = ModelInstance::new()
            .with_instance("model", ModelInstance::new().with_value("centre", 3.0))
            .with_value("scale", 2.0);

        assert_eq!(instance.value("scale"), Some(2.0));
        assert_eq!(instance.value("model"), None);
        assert_eq!(
            instance.instance("model").and_then(|m| m.value("centre")),
            Some(3.0)
        );
        assert_eq!(
            instance.require_value("missing"),
            Err(ModelError::MissingField("missing".to_string()))
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut instance = ModelInstance::new().with_value("a", 1.0).with_value("b", 2.0);
        instance.insert("a", InstanceValue::Scalar(5.0));

        let names: Vec<&str> = instance.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(instance.value("a"), Some(5.0));
    }
}
