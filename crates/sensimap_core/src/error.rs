use thiserror::Error;

use crate::job::JobFailure;

/// Errors raised while tiling the perturbation parameter space
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("a grid needs at least one dimension")]
    NoDimensions,
    #[error("step size {step} for dimension {dimension} must be in (0, 1]")]
    InvalidStepSize { dimension: usize, step: f64 },
    #[error("expected {expected} per-dimension step sizes, got {actual}")]
    StepSizeCount { expected: usize, actual: usize },
    #[error("grid of shape {shape:?} exceeds {limit} points")]
    TooManyPoints { shape: Vec<usize>, limit: usize },
    #[error("coordinate has {actual} values but the model has {expected} priors")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to models, priors and instances
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unit vector has {actual} values but the model has {expected} priors")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid prior for '{path}': {reason}")]
    InvalidPrior { path: String, reason: &'static str },
    #[error("instance has no field '{0}'")]
    MissingField(String),
}

/// Errors signalled by a search while fitting a model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("log likelihood could not be evaluated: {0}")]
    Likelihood(String),
    #[error("search failed: {0}")]
    Failed(String),
    #[error("search output error: {0}")]
    Io(String),
}

/// Errors raised by a parallel executor for the batch as a whole
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("executor needs at least one worker, got {0}")]
    InvalidWorkerCount(usize),
    #[error("failed to build worker pool: {0}")]
    Pool(String),
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
    #[error("executor returned no result for jobs {missing:?}")]
    Incomplete { missing: Vec<usize> },
    #[error("executor returned job {index} more than once")]
    DuplicateResult { index: usize },
    #[error("executor returned a result for unknown job {index}")]
    UnknownIndex { index: usize },
}

/// Errors returned by a sensitivity run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensitivityError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("sensitivity mapping needs at least 2 cores, got {requested}")]
    TooFewCores { requested: usize },
    #[error("grid points {first} and {second} share the label '{label}'")]
    LabelCollision {
        label: String,
        first: usize,
        second: usize,
    },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    JobFailed(#[from] Box<JobFailure>),
}

impl SensitivityError {
    /// True for caller mistakes that are detected before any job is dispatched
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SensitivityError::Grid(_)
                | SensitivityError::Model(_)
                | SensitivityError::TooFewCores { .. }
                | SensitivityError::LabelCollision { .. }
        )
    }
}
