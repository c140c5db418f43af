//! Sensitivity mapping engine
//!
//! Given a model that already fits an observation, this crate measures whether
//! a localized perturbation of that observation would be detectable across
//! the perturbation's parameter space. It provides:
//! - Grid enumeration over the perturbation's unit hypercube
//! - Deterministic labels and output namespaces per grid point
//! - Paired baseline/perturbed fits packaged as independent jobs
//! - Parallel dispatch through pluggable executors
//! - Collation of results back into grid order and a sensitivity map
//!
//! The optimizer is reached through the [`Search`] and [`Analysis`] traits;
//! this crate never writes files itself.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sensimap_core::{Model, ModelInstance, Prior, Sensitivity};
//!
//! let perturbation = Model::new()
//!     .with_prior("centre", Prior::uniform(0.0, 100.0))
//!     .with_prior("intensity", Prior::uniform(0.0, 5.0));
//!
//! let results = Sensitivity::new(
//!     base_instance,
//!     Arc::new(base_model),
//!     Arc::new(perturbation),
//!     |instance| simulate_image(instance),
//!     |image| LineAnalysis::new(image),
//!     search,
//! )
//! .step_size(0.25)
//! .number_of_cores(4)
//! .run()?;
//!
//! let map = results.sensitivity_map();
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod error;
pub mod executor;
pub mod grid;
pub mod job;
pub mod label;
pub mod map;
pub mod progress;
pub mod results;
pub mod search;
pub mod sensitivity;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use error::{ExecutorError, FitError, GridError, ModelError, SensitivityError};
#[cfg(feature = "parallel")]
pub use executor::RayonExecutor;
pub use executor::{
    BatchOutput, Completed, Executor, ParallelJob, SequentialExecutor, WorkerPool,
};
pub use grid::{DEFAULT_STEP_SIZE, Grid, MAX_GRID_POINTS, StepSize, make_lists};
pub use job::{FitStage, Job, JobFailure, JobOutcome, JobResult};
pub use label::{LabelRegistry, make_label};
pub use map::{MapAxis, MapPlane, SensitivityMap};
pub use model::{CollectionModel, InstanceValue, Model, ModelInstance, Parameter, Prior, PriorModel};
pub use progress::RunProgress;
pub use results::{GridPoint, SensitivityResults};
pub use search::{Analysis, FitResult, Paths, Search};
pub use sensitivity::{FailurePolicy, JobPlan, MIN_NUMBER_OF_CORES, Sensitivity};
