//! The paired comparison run at every grid point.
//!
//! A job fits the base model alone and then the base model plus the
//! perturbation, both against the same synthesized observation. Each fit has
//! its own search copy so their output never overlaps.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FitError;
use crate::executor::ParallelJob;
use crate::model::{CollectionModel, PriorModel};
use crate::search::{Analysis, FitResult, Search};

/// Field the base model is attached under in both fits
pub const MODEL_FIELD: &str = "model";
/// Field the perturbation model is attached under in the perturbed fit
pub const PERTURBATION_FIELD: &str = "perturbation";
pub const BASELINE_SUFFIX: &str = "[baseline]";
pub const PERTURBED_SUFFIX: &str = "[perturbed]";

/// Both fits of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Fit of the base model alone
    pub result: FitResult,
    /// Fit of the base model plus the perturbation
    pub perturbed_result: FitResult,
}

impl JobResult {
    /// Positive when including the perturbation improves the fit
    #[must_use]
    pub fn log_likelihood_difference(&self) -> f64 {
        self.perturbed_result.log_likelihood - self.result.log_likelihood
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStage {
    Baseline,
    Perturbed,
    /// Skipped because the run was cancelled
    Cancelled,
}

impl fmt::Display for FitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitStage::Baseline => write!(f, "baseline"),
            FitStage::Perturbed => write!(f, "perturbed"),
            FitStage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Explicit record of a grid point that produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("job {index} ({label}) failed at the {stage} stage: {message}")]
pub struct JobFailure {
    pub index: usize,
    pub label: String,
    pub stage: FitStage,
    pub message: String,
}

impl JobFailure {
    fn from_fit_error(index: usize, label: &str, stage: FitStage, error: &FitError) -> Self {
        Self {
            index,
            label: label.to_string(),
            stage,
            message: error.to_string(),
        }
    }

    pub fn cancelled(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            stage: FitStage::Cancelled,
            message: "run was cancelled before the job started".to_string(),
        }
    }
}

pub type JobOutcome = Result<JobResult, JobFailure>;

/// One grid point's comparison, ready to hand to an executor
#[derive(Debug)]
pub struct Job<S, A> {
    index: usize,
    label: String,
    analysis: A,
    model: Arc<dyn PriorModel>,
    perturbation_model: Arc<dyn PriorModel>,
    search: S,
    perturbed_search: S,
}

impl<S: Search, A: Analysis> Job<S, A> {
    /// Build a job, deriving the baseline and perturbed searches from `search`
    pub fn new(
        index: usize,
        label: impl Into<String>,
        analysis: A,
        model: Arc<dyn PriorModel>,
        perturbation_model: Arc<dyn PriorModel>,
        search: S,
    ) -> Self {
        let paths = search.paths();
        let baseline = search.copy_with_paths(paths.with_tag_suffix(BASELINE_SUFFIX));
        let perturbed = search.copy_with_paths(paths.with_tag_suffix(PERTURBED_SUFFIX));

        Self {
            index,
            label: label.into(),
            analysis,
            model,
            perturbation_model,
            search: baseline,
            perturbed_search: perturbed,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    /// Search used for the base-model-only fit
    pub fn search(&self) -> &S {
        &self.search
    }

    /// Search used for the fit that includes the perturbation
    pub fn perturbed_search(&self) -> &S {
        &self.perturbed_search
    }

    /// Run both fits; the perturbed fit is skipped if the baseline fails
    pub fn perform(&self) -> JobOutcome {
        let baseline_model =
            CollectionModel::new().with_field(MODEL_FIELD, Arc::clone(&self.model));
        let result = self
            .search
            .fit(&baseline_model, &self.analysis)
            .map_err(|e| self.failure(FitStage::Baseline, &e))?;

        let perturbed_model = CollectionModel::new()
            .with_field(PERTURBATION_FIELD, Arc::clone(&self.perturbation_model))
            .with_field(MODEL_FIELD, Arc::clone(&self.model));
        let perturbed_result = self
            .perturbed_search
            .fit(&perturbed_model, &self.analysis)
            .map_err(|e| self.failure(FitStage::Perturbed, &e))?;

        Ok(JobResult {
            result,
            perturbed_result,
        })
    }

    fn failure(&self, stage: FitStage, error: &FitError) -> JobFailure {
        tracing::warn!(index = self.index, label = %self.label, %stage, %error, "fit failed");
        JobFailure::from_fit_error(self.index, &self.label, stage, error)
    }
}

impl<S: Search, A: Analysis> ParallelJob for Job<S, A> {
    type Output = JobOutcome;

    fn execute(&self) -> JobOutcome {
        self.perform()
    }
}
