use std::sync::Arc;

use crate::error::ModelError;

use super::{InstanceValue, ModelInstance, Prior, PriorModel};

/// Ordered mapping of field names to sub-models, fitted jointly.
///
/// The unit vector is split across fields in declaration order, each field
/// taking as many values as its model has priors.
#[derive(Debug, Clone, Default)]
pub struct CollectionModel {
    fields: Vec<(String, Arc<dyn PriorModel>)>,
}

impl CollectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sub-model, replacing any earlier field with the same name
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, model: Arc<dyn PriorModel>) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = model,
            None => self.fields.push((name, model)),
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Arc<dyn PriorModel>> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, model)| model)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PriorModel for CollectionModel {
    fn prior_tuples(&self) -> Vec<(String, Prior)> {
        self.fields
            .iter()
            .flat_map(|(field, model)| {
                model
                    .prior_tuples()
                    .into_iter()
                    .map(move |(path, prior)| (format!("{field}.{path}"), prior))
            })
            .collect()
    }

    fn prior_count(&self) -> usize {
        self.fields.iter().map(|(_, model)| model.prior_count()).sum()
    }

    fn instance_from_unit_vector(&self, unit_vector: &[f64]) -> Result<ModelInstance, ModelError> {
        let expected = self.prior_count();
        if unit_vector.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: unit_vector.len(),
            });
        }

        let mut instance = ModelInstance::new();
        let mut offset = 0;
        for (name, model) in &self.fields {
            let count = model.prior_count();
            let sub_instance =
                model.instance_from_unit_vector(&unit_vector[offset..offset + count])?;
            instance.insert(name.clone(), InstanceValue::Nested(sub_instance));
            offset += count;
        }
        Ok(instance)
    }

    fn validate(&self) -> Result<(), ModelError> {
        self.fields.iter().try_for_each(|(_, model)| model.validate())
    }
}
