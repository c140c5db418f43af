//! Outcomes of a sensitivity run, in canonical grid order.

use serde::{Deserialize, Serialize};

use crate::job::{JobFailure, JobOutcome, JobResult};
use crate::map::{MapAxis, SensitivityMap};

/// One grid point and what its job produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub index: usize,
    /// Unit-hypercube coordinate of the perturbation
    pub coordinate: Vec<f64>,
    pub label: String,
    pub outcome: JobOutcome,
}

impl GridPoint {
    pub fn log_likelihood_difference(&self) -> Option<f64> {
        self.outcome
            .as_ref()
            .ok()
            .map(JobResult::log_likelihood_difference)
    }
}

/// One entry per grid coordinate, success or explicit failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResults {
    axes: Vec<MapAxis>,
    points: Vec<GridPoint>,
}

impl SensitivityResults {
    pub fn new(axes: Vec<MapAxis>, points: Vec<GridPoint>) -> Self {
        Self { axes, points }
    }

    /// Perturbation parameters and their physical values along the grid
    pub fn axes(&self) -> &[MapAxis] {
        &self.axes
    }

    /// Points along each perturbation dimension
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(MapAxis::len).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &JobOutcome> {
        self.points.iter().map(|point| &point.outcome)
    }

    /// Successful results; `None` where the job failed
    pub fn job_results(&self) -> Vec<Option<&JobResult>> {
        self.outcomes().map(|outcome| outcome.as_ref().ok()).collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.outcomes().filter_map(|outcome| outcome.as_ref().err())
    }

    pub fn success_count(&self) -> usize {
        self.outcomes().filter(|outcome| outcome.is_ok()).count()
    }

    pub fn log_likelihood_differences(&self) -> Vec<Option<f64>> {
        self.points
            .iter()
            .map(GridPoint::log_likelihood_difference)
            .collect()
    }

    /// Differences arranged on the grid; failed points are `None`
    pub fn sensitivity_map(&self) -> SensitivityMap<Option<f64>> {
        SensitivityMap::from_fn(self.axes.clone(), |index| {
            self.points
                .get(index)
                .and_then(GridPoint::log_likelihood_difference)
        })
    }

    /// Number of points whose difference exceeds `threshold`
    pub fn detections(&self, threshold: f64) -> usize {
        self.log_likelihood_differences()
            .into_iter()
            .flatten()
            .filter(|&difference| difference > threshold)
            .count()
    }
}
