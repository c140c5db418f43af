//! Human-readable identifiers for grid coordinates.
//!
//! A label is built from the physical values of the perturbation at a grid
//! point, so the output namespace of every job says what was injected there.

use rustc_hash::FxHashMap;

use crate::error::{GridError, SensitivityError};
use crate::model::Prior;

/// Render a coordinate as `"{path}_{value}"` tokens joined with `_`.
///
/// Each unit value is mapped through its prior first. Values use the
/// round-trip float format, so `25` is rendered as `25.0`.
pub fn make_label(coordinate: &[f64], prior_tuples: &[(String, Prior)]) -> Result<String, GridError> {
    if coordinate.len() != prior_tuples.len() {
        return Err(GridError::DimensionMismatch {
            expected: prior_tuples.len(),
            actual: coordinate.len(),
        });
    }

    let tokens: Vec<String> = coordinate
        .iter()
        .zip(prior_tuples)
        .map(|(&unit, (path, prior))| format!("{path}_{:?}", prior.value_for(unit)))
        .collect();

    Ok(tokens.join("_"))
}

/// Tracks labels handed out during a run and rejects repeats
#[derive(Debug, Default)]
pub struct LabelRegistry {
    seen: FxHashMap<String, usize>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Record `label` for grid point `index`
    pub fn insert(&mut self, label: &str, index: usize) -> Result<(), SensitivityError> {
        if let Some(&first) = self.seen.get(label) {
            return Err(SensitivityError::LabelCollision {
                label: label.to_string(),
                first,
                second: index,
            });
        }
        self.seen.insert(label.to_string(), index);
        Ok(())
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.seen.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
