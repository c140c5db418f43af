//! Per-point values laid out on the perturbation grid.
//!
//! A [`SensitivityMap`] keeps one value per grid point in canonical order and
//! knows the physical value of every step along each axis, so cuts through
//! the map can be read in the perturbation's own units.

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, GridIndices};
use crate::model::Prior;

/// One perturbation parameter and its physical value at each grid step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapAxis {
    pub name: String,
    pub values: Vec<f64>,
}

impl MapAxis {
    /// Axes of `grid` with unit values mapped through each prior
    pub fn for_grid(grid: &Grid, prior_tuples: &[(String, Prior)]) -> Vec<MapAxis> {
        grid.axis_values()
            .into_iter()
            .zip(prior_tuples)
            .map(|(units, (name, prior))| MapAxis {
                name: name.clone(),
                values: units.into_iter().map(|unit| prior.value_for(unit)).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A 2-D cut through the map, `rows[i][j]` at `row_values[i]`, `col_values[j]`
#[derive(Debug, Clone, PartialEq)]
pub struct MapPlane<'a, T> {
    pub row_axis: &'a str,
    pub col_axis: &'a str,
    pub row_values: &'a [f64],
    pub col_values: &'a [f64],
    pub rows: Vec<Vec<&'a T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityMap<T> {
    axes: Vec<MapAxis>,
    values: Vec<T>,
}

impl<T> SensitivityMap<T> {
    /// Fill the map by canonical grid index
    pub fn from_fn(axes: Vec<MapAxis>, value_at: impl FnMut(usize) -> T) -> Self {
        let len = axes.iter().map(MapAxis::len).product();
        Self {
            values: (0..len).map(value_at).collect(),
            axes,
        }
    }

    pub fn axes(&self) -> &[MapAxis] {
        &self.axes
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(MapAxis::len).collect()
    }

    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in canonical grid order
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Canonical index of per-axis step indices; the last axis varies fastest
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.axes.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.axes)
            .try_fold(0, |flat, (&index, axis)| {
                (index < axis.len()).then(|| flat * axis.len() + index)
            })
    }

    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.flat_index(indices).and_then(|flat| self.values.get(flat))
    }

    /// Physical parameter values at per-axis step indices
    pub fn physical(&self, indices: &[usize]) -> Option<Vec<f64>> {
        if indices.len() != self.axes.len() {
            return None;
        }
        indices
            .iter()
            .zip(&self.axes)
            .map(|(&index, axis)| axis.values.get(index).copied())
            .collect()
    }

    /// `(indices, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, &T)> {
        GridIndices::new(self.shape()).zip(&self.values)
    }

    /// Cut over `row_axis` × `col_axis` with every other axis held at its index in `at`.
    ///
    /// Entries of `at` for the two cut axes are ignored.
    pub fn plane(&self, row_axis: usize, col_axis: usize, at: &[usize]) -> Option<MapPlane<'_, T>> {
        if row_axis == col_axis || at.len() != self.ndim() {
            return None;
        }
        let rows_of = self.axes.get(row_axis)?;
        let cols_of = self.axes.get(col_axis)?;

        let mut indices = at.to_vec();
        let mut rows = Vec::with_capacity(rows_of.len());
        for row in 0..rows_of.len() {
            indices[row_axis] = row;
            let mut cells = Vec::with_capacity(cols_of.len());
            for col in 0..cols_of.len() {
                indices[col_axis] = col;
                cells.push(self.get(&indices)?);
            }
            rows.push(cells);
        }

        Some(MapPlane {
            row_axis: &rows_of.name,
            col_axis: &cols_of.name,
            row_values: &rows_of.values,
            col_values: &cols_of.values,
            rows,
        })
    }
}

impl SensitivityMap<Option<f64>> {
    /// Physical coordinate and value of the largest finite entry; ties go to
    /// the earliest point in grid order
    pub fn peak(&self) -> Option<(Vec<f64>, f64)> {
        let (indices, value) = self
            .iter()
            .filter_map(|(indices, value)| value.filter(|v| v.is_finite()).map(|v| (indices, v)))
            .reduce(|best, next| if next.1 > best.1 { next } else { best })?;
        Some((self.physical(&indices)?, value))
    }
}
