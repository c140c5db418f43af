//! Exhaustive grid search over a model's unit hypercube.
//!
//! The search evaluates the likelihood at the centre of every cell of a
//! regular `steps^D` grid and keeps the best point. It scales poorly with
//! dimension but is deterministic, which suits sensitivity mapping where the
//! same search runs at every grid point.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sensimap_core::{
    Analysis, CollectionModel, FitError, FitResult, Grid, ModelInstance, Paths, PriorModel,
    Search, StepSize,
};

use crate::util::io::atomic_write;

pub const RESULT_FILE: &str = "result.json";
pub const SAMPLES_FILE: &str = "samples.json";

/// One evaluated point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub unit_vector: Vec<f64>,
    pub log_likelihood: f64,
}

/// Contents of `result.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub name: String,
    pub tag: String,
    pub log_likelihood: f64,
    pub unit_vector: Vec<f64>,
    pub instance: ModelInstance,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSearch {
    paths: Paths,
    steps_per_dimension: usize,
}

impl GridSearch {
    pub fn new(paths: Paths, steps_per_dimension: usize) -> Self {
        Self {
            paths,
            steps_per_dimension: steps_per_dimension.max(1),
        }
    }

    pub fn steps_per_dimension(&self) -> usize {
        self.steps_per_dimension
    }

    /// Cell centres of the search grid, in canonical order
    fn unit_vectors(&self, dimensions: usize) -> Result<Vec<Vec<f64>>, FitError> {
        if dimensions == 0 {
            return Ok(vec![Vec::new()]);
        }
        let step = 1.0 / self.steps_per_dimension as f64;
        let grid = Grid::new(dimensions, &StepSize::Uniform(step))
            .map_err(|e| FitError::Failed(e.to_string()))?;
        Ok(grid
            .coordinates()
            .map(|upper| upper.into_iter().map(|u| u - 0.5 * step).collect())
            .collect())
    }

    fn write_output(&self, summary: &SearchSummary, samples: &[Sample]) -> Result<(), FitError> {
        let output_path = self.paths.output_path();
        write_json(&output_path.join(RESULT_FILE), summary)?;
        if !self.paths.remove_files {
            write_json(&output_path.join(SAMPLES_FILE), &samples)?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FitError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| FitError::Io(e.to_string()))?;
    atomic_write(path, &json).map_err(|e| FitError::Io(format!("{}: {e}", path.display())))
}

impl Search for GridSearch {
    fn paths(&self) -> &Paths {
        &self.paths
    }

    fn copy_with_paths(&self, paths: Paths) -> Self {
        Self {
            paths,
            steps_per_dimension: self.steps_per_dimension,
        }
    }

    fn fit<A: Analysis>(&self, model: &CollectionModel, analysis: &A) -> Result<FitResult, FitError> {
        let unit_vectors = self.unit_vectors(model.prior_count())?;

        let samples: Vec<Sample> = unit_vectors
            .into_par_iter()
            .map(|unit_vector| {
                let instance = model.instance_from_unit_vector(&unit_vector)?;
                let log_likelihood = analysis.log_likelihood_function(&instance)?;
                Ok(Sample {
                    unit_vector,
                    log_likelihood,
                })
            })
            .collect::<Result<_, FitError>>()?;

        let best = samples
            .iter()
            .max_by(|a, b| a.log_likelihood.total_cmp(&b.log_likelihood))
            .ok_or_else(|| FitError::Failed("no points evaluated".to_string()))?;
        let instance = model.instance_from_unit_vector(&best.unit_vector)?;

        let summary = SearchSummary {
            name: self.paths.name.clone(),
            tag: self.paths.tag.clone(),
            log_likelihood: best.log_likelihood,
            unit_vector: best.unit_vector.clone(),
            instance: instance.clone(),
            evaluations: samples.len(),
        };
        self.write_output(&summary, &samples)?;

        tracing::debug!(
            output = %self.paths.output_path().display(),
            log_likelihood = best.log_likelihood,
            evaluations = samples.len(),
            "grid search finished"
        );

        Ok(FitResult {
            log_likelihood: best.log_likelihood,
            instance,
        })
    }
}
