//! Model capability consumed by the sensitivity engine.
//!
//! A model declares an ordered list of priors and can turn a point of the unit
//! hypercube into a [`ModelInstance`]. [`Model`] is a flat parameter list;
//! [`CollectionModel`] composes named sub-models for joint fitting.

mod collection;
mod instance;
mod prior;

pub use collection::CollectionModel;
pub use instance::{InstanceValue, ModelInstance};
pub use prior::Prior;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Anything that maps unit-hypercube vectors onto model instances
pub trait PriorModel: fmt::Debug + Send + Sync {
    /// Ordered `(path, prior)` pairs, one per free dimension
    fn prior_tuples(&self) -> Vec<(String, Prior)>;

    fn instance_from_unit_vector(&self, unit_vector: &[f64]) -> Result<ModelInstance, ModelError>;

    fn prior_count(&self) -> usize {
        self.prior_tuples().len()
    }

    fn validate(&self) -> Result<(), ModelError> {
        for (path, prior) in self.prior_tuples() {
            prior.validate(&path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    /// Sampled through a prior
    Free(Prior),
    /// Held constant; does not add a dimension
    Fixed(f64),
}

/// A flat list of named parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    parameters: Vec<(String, Parameter)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prior(self, name: impl Into<String>, prior: Prior) -> Self {
        self.with_parameter(name, Parameter::Free(prior))
    }

    #[must_use]
    pub fn with_constant(self, name: impl Into<String>, value: f64) -> Self {
        self.with_parameter(name, Parameter::Fixed(value))
    }

    /// Add a parameter, replacing any earlier parameter with the same name
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        let name = name.into();
        match self.parameters.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = parameter,
            None => self.parameters.push((name, parameter)),
        }
        self
    }

    pub fn parameters(&self) -> &[(String, Parameter)] {
        &self.parameters
    }
}

impl PriorModel for Model {
    fn prior_tuples(&self) -> Vec<(String, Prior)> {
        self.parameters
            .iter()
            .filter_map(|(name, parameter)| match parameter {
                Parameter::Free(prior) => Some((name.clone(), *prior)),
                Parameter::Fixed(_) => None,
            })
            .collect()
    }

    fn instance_from_unit_vector(&self, unit_vector: &[f64]) -> Result<ModelInstance, ModelError> {
        let expected = self.prior_count();
        if unit_vector.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: unit_vector.len(),
            });
        }

        let mut units = unit_vector.iter();
        let mut instance = ModelInstance::new();
        for (name, parameter) in &self.parameters {
            let value = match parameter {
                Parameter::Fixed(value) => *value,
                Parameter::Free(prior) => match units.next() {
                    Some(unit) => prior.value_for(*unit),
                    None => {
                        return Err(ModelError::DimensionMismatch {
                            expected,
                            actual: unit_vector.len(),
                        });
                    }
                },
            };
            instance.insert(name.clone(), InstanceValue::Scalar(value));
        }
        Ok(instance)
    }
}
