//! Tiling of the perturbation's unit hypercube.
//!
//! Each dimension with step `s` contributes the points `s, 2s, ..., floor(1/s)·s`.
//! Zero is never a grid value, so a step of 1 holds that dimension at its
//! upper bound. Coordinates are produced in lexicographic order over the step
//! indices with the first dimension varying slowest; that position is the
//! canonical index used to correlate results with grid points.

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Step size used when none is configured
pub const DEFAULT_STEP_SIZE: f64 = 0.1;

/// Relative slack on `1 / step` so steps such as `1/3` give 3 points, not 2
const STEP_TOLERANCE: f64 = 1e-12;

/// Largest grid a run may enumerate
pub const MAX_GRID_POINTS: usize = u32::MAX as usize;

/// Either one step applied to every dimension or one step per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepSize {
    Uniform(f64),
    PerDimension(Vec<f64>),
}

impl Default for StepSize {
    fn default() -> Self {
        StepSize::Uniform(DEFAULT_STEP_SIZE)
    }
}

impl From<f64> for StepSize {
    fn from(step: f64) -> Self {
        StepSize::Uniform(step)
    }
}

impl From<Vec<f64>> for StepSize {
    fn from(steps: Vec<f64>) -> Self {
        StepSize::PerDimension(steps)
    }
}

impl StepSize {
    /// Expand to one validated step per dimension
    pub fn resolve(&self, dimensions: usize) -> Result<Vec<f64>, GridError> {
        if dimensions == 0 {
            return Err(GridError::NoDimensions);
        }

        let steps = match self {
            StepSize::Uniform(step) => vec![*step; dimensions],
            StepSize::PerDimension(steps) => {
                if steps.len() != dimensions {
                    return Err(GridError::StepSizeCount {
                        expected: dimensions,
                        actual: steps.len(),
                    });
                }
                steps.clone()
            }
        };

        for (dimension, &step) in steps.iter().enumerate() {
            if !step.is_finite() || step <= 0.0 || step > 1.0 {
                return Err(GridError::InvalidStepSize { dimension, step });
            }
        }

        Ok(steps)
    }
}

/// Number of grid points along a dimension with the given step.
///
/// This is `floor(1 / step)`, except that a ratio within floating-point
/// rounding of the next integer is rounded up, provided the last point still
/// lands within rounding of 1.
#[must_use]
pub fn steps_for(step: f64) -> usize {
    let ratio = 1.0 / step;
    let rounded = (ratio * (1.0 + STEP_TOLERANCE)).floor();
    let count = if rounded * step <= 1.0 + STEP_TOLERANCE {
        rounded
    } else {
        ratio.floor()
    };
    count as usize
}

/// A validated grid over the unit hypercube
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    step_sizes: Vec<f64>,
    shape: Vec<usize>,
    len: usize,
}

impl Grid {
    pub fn new(dimensions: usize, step_size: &StepSize) -> Result<Self, GridError> {
        let step_sizes = step_size.resolve(dimensions)?;
        let shape: Vec<usize> = step_sizes.iter().map(|&step| steps_for(step)).collect();
        let len = shape
            .iter()
            .try_fold(1usize, |total, &count| total.checked_mul(count))
            .filter(|&total| total <= MAX_GRID_POINTS)
            .ok_or_else(|| GridError::TooManyPoints {
                shape: shape.clone(),
                limit: MAX_GRID_POINTS,
            })?;
        Ok(Self {
            step_sizes,
            shape,
            len,
        })
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Points along each dimension
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn step_sizes(&self) -> &[f64] {
        &self.step_sizes
    }

    /// Total number of coordinates
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unit value of the `index`-th point along `dimension`, never above 1
    fn value(&self, dimension: usize, index: usize) -> f64 {
        ((index + 1) as f64 * self.step_sizes[dimension]).min(1.0)
    }

    /// The values taken along each dimension
    pub fn axis_values(&self) -> Vec<Vec<f64>> {
        self.shape
            .iter()
            .enumerate()
            .map(|(dimension, &count)| (0..count).map(|i| self.value(dimension, i)).collect())
            .collect()
    }

    /// Coordinate for per-dimension step indices
    pub fn coordinate(&self, indices: &[usize]) -> Option<Vec<f64>> {
        if indices.len() != self.ndim() {
            return None;
        }
        indices
            .iter()
            .enumerate()
            .map(|(dimension, &index)| {
                (index < self.shape[dimension]).then(|| self.value(dimension, index))
            })
            .collect()
    }

    /// Iterate over every coordinate in canonical order
    pub fn coordinates(&self) -> GridCoordinates<'_> {
        GridCoordinates {
            grid: self,
            indices: GridIndices::new(self.shape.clone()),
            remaining: self.len(),
        }
    }
}

/// Iterator over grid coordinates; call [`Grid::coordinates`] again to restart
pub struct GridCoordinates<'a> {
    grid: &'a Grid,
    indices: GridIndices,
    remaining: usize,
}

impl Iterator for GridCoordinates<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let indices = self.indices.next()?;
        self.remaining = self.remaining.saturating_sub(1);
        self.grid.coordinate(&indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for GridCoordinates<'_> {}

/// Row-major walk over every index tuple of a shape
#[derive(Debug, Clone)]
pub struct GridIndices {
    shape: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl GridIndices {
    pub fn new(shape: Vec<usize>) -> Self {
        let done = shape.contains(&0);
        Self {
            current: vec![0; shape.len()],
            shape,
            done,
        }
    }
}

impl Iterator for GridIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let indices = self.current.clone();

        // Odometer: bump the last digit, carrying leftwards
        self.done = true;
        for (digit, &size) in self.current.iter_mut().zip(&self.shape).rev() {
            *digit += 1;
            if *digit < size {
                self.done = false;
                break;
            }
            *digit = 0;
        }

        Some(indices)
    }
}

/// Every unit-hypercube coordinate for `dimensions` priors, in canonical order
pub fn make_lists(dimensions: usize, step_size: &StepSize) -> Result<Vec<Vec<f64>>, GridError> {
    Ok(Grid::new(dimensions, step_size)?.coordinates().collect())
}
