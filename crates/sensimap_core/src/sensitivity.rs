//! Sensitivity run orchestration.
//!
//! A [`Sensitivity`] run tiles the perturbation's unit hypercube, synthesizes
//! one observation per grid point with the perturbation injected, and fits
//! every observation twice: once with the base model alone and once with the
//! perturbation added. The difference in log likelihood between the two fits
//! says whether a perturbation of that shape would have been detected.
//!
//! A run is a single pass:
//!
//! 1. validate the configuration
//! 2. enumerate coordinates and labels, rejecting duplicate labels
//! 3. build one [`Job`] per coordinate
//! 4. hand the batch to the executor
//! 5. slot the outputs back into grid order

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, SensitivityError};
use crate::executor::{BatchOutput, Executor, WorkerPool};
use crate::grid::{Grid, StepSize};
use crate::job::{
    BASELINE_SUFFIX, Job, JobFailure, JobOutcome, MODEL_FIELD, PERTURBATION_FIELD,
    PERTURBED_SUFFIX,
};
use crate::label::{LabelRegistry, make_label};
use crate::map::MapAxis;
use crate::model::{ModelInstance, PriorModel};
use crate::progress::RunProgress;
use crate::results::{GridPoint, SensitivityResults};
use crate::search::{Analysis, Paths, Search};

/// Fewest workers a run accepts
pub const MIN_NUMBER_OF_CORES: usize = 2;

/// What happens to the run when a job fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the failure at its grid index and return every other result
    #[default]
    Record,
    /// Let the batch finish, then fail the run with the lowest-index failure
    Abort,
}

/// Everything decided about a grid point before its job is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPlan {
    pub index: usize,
    pub label: String,
    pub coordinate: Vec<f64>,
    pub baseline_paths: Paths,
    pub perturbed_paths: Paths,
}

type AnalysisFor<A> = Box<dyn Fn(&ModelInstance) -> A + Send + Sync>;

pub struct Sensitivity<S, A, E = WorkerPool> {
    instance: ModelInstance,
    model: Arc<dyn PriorModel>,
    perturbation_model: Arc<dyn PriorModel>,
    analysis_for: AnalysisFor<A>,
    search: S,
    step_size: StepSize,
    number_of_cores: usize,
    failure_policy: FailurePolicy,
    executor: E,
}

impl<S: Search, A: Analysis> Sensitivity<S, A, WorkerPool> {
    /// Configure a run.
    ///
    /// `image_function` turns the composite instance
    /// `{model: instance, perturbation: p}` into an observation, and
    /// `analysis_factory` binds a likelihood to that observation.
    pub fn new<O, I, F>(
        instance: ModelInstance,
        model: Arc<dyn PriorModel>,
        perturbation_model: Arc<dyn PriorModel>,
        image_function: I,
        analysis_factory: F,
        search: S,
    ) -> Self
    where
        O: 'static,
        I: Fn(&ModelInstance) -> O + Send + Sync + 'static,
        F: Fn(O) -> A + Send + Sync + 'static,
    {
        Self {
            instance,
            model,
            perturbation_model,
            analysis_for: Box::new(move |composite| analysis_factory(image_function(composite))),
            search,
            step_size: StepSize::default(),
            number_of_cores: MIN_NUMBER_OF_CORES,
            failure_policy: FailurePolicy::default(),
            executor: WorkerPool,
        }
    }
}

impl<S: Search, A: Analysis, E: Executor> Sensitivity<S, A, E> {
    #[must_use]
    pub fn step_size(mut self, step_size: impl Into<StepSize>) -> Self {
        self.step_size = step_size.into();
        self
    }

    #[must_use]
    pub fn number_of_cores(mut self, number_of_cores: usize) -> Self {
        self.number_of_cores = number_of_cores;
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Swap the executor jobs are dispatched to
    pub fn executor<E2: Executor>(self, executor: E2) -> Sensitivity<S, A, E2> {
        Sensitivity {
            instance: self.instance,
            model: self.model,
            perturbation_model: self.perturbation_model,
            analysis_for: self.analysis_for,
            search: self.search,
            step_size: self.step_size,
            number_of_cores: self.number_of_cores,
            failure_policy: self.failure_policy,
            executor,
        }
    }

    /// Check the configuration and return the grid it describes
    pub fn validate(&self) -> Result<Grid, SensitivityError> {
        if self.number_of_cores < MIN_NUMBER_OF_CORES {
            return Err(SensitivityError::TooFewCores {
                requested: self.number_of_cores,
            });
        }
        self.model.validate()?;
        self.perturbation_model.validate()?;
        self.grid()
    }

    pub fn grid(&self) -> Result<Grid, SensitivityError> {
        Ok(Grid::new(
            self.perturbation_model.prior_count(),
            &self.step_size,
        )?)
    }

    /// Labels of every grid point in canonical order
    pub fn labels(&self) -> Result<Vec<String>, SensitivityError> {
        Ok(self.plan()?.into_iter().map(|plan| plan.label).collect())
    }

    /// Labels, coordinates and output paths of every job, without building any
    pub fn plan(&self) -> Result<Vec<JobPlan>, SensitivityError> {
        Ok(self.prepare()?.1)
    }

    /// Build every job of the run in canonical order
    pub fn make_jobs(&self) -> Result<Vec<Job<S, A>>, SensitivityError> {
        let (_, plans) = self.prepare()?;
        self.jobs_for(&plans)
    }

    pub fn run(&self) -> Result<SensitivityResults, SensitivityError> {
        self.run_with_progress(&RunProgress::default())
    }

    /// Run, reporting through `progress`.
    ///
    /// Cancelling `progress` skips every job not yet started; those points
    /// come back as [`FitStage::Cancelled`](crate::job::FitStage::Cancelled)
    /// failures. Cancellation is sticky, so a handle cancelled during an
    /// earlier run cancels this one before any job starts. Pass a fresh
    /// handle to run again.
    pub fn run_with_progress(
        &self,
        progress: &RunProgress,
    ) -> Result<SensitivityResults, SensitivityError> {
        let (grid, plans) = self.prepare()?;
        let jobs = self.jobs_for(&plans)?;

        tracing::info!(
            jobs = jobs.len(),
            shape = ?grid.shape(),
            number_of_cores = self.number_of_cores,
            "starting sensitivity run"
        );

        progress.reset(jobs.len());
        let batch = self
            .executor
            .run_jobs(jobs, self.number_of_cores, progress)
            .inspect_err(|e| tracing::error!(error = %e, "executor failed"))?;

        let outcomes = collate(batch, &plans).inspect_err(
            |e| tracing::error!(error = %e, "executor returned an inconsistent batch"),
        )?;
        let points: Vec<GridPoint> = plans
            .into_iter()
            .zip(outcomes)
            .map(|(plan, outcome)| GridPoint {
                index: plan.index,
                coordinate: plan.coordinate,
                label: plan.label,
                outcome,
            })
            .collect();
        let axes = MapAxis::for_grid(&grid, &self.perturbation_model.prior_tuples());
        let results = SensitivityResults::new(axes, points);

        tracing::info!(
            succeeded = results.success_count(),
            failed = results.len() - results.success_count(),
            "sensitivity run finished"
        );

        if self.failure_policy == FailurePolicy::Abort
            && let Some(failure) = results.failures().next()
        {
            return Err(SensitivityError::JobFailed(Box::new(failure.clone())));
        }

        Ok(results)
    }

    fn prepare(&self) -> Result<(Grid, Vec<JobPlan>), SensitivityError> {
        let grid = self.validate()?;
        let prior_tuples = self.perturbation_model.prior_tuples();
        let mut registry = LabelRegistry::with_capacity(grid.len());

        let mut plans = Vec::with_capacity(grid.len());
        for (index, coordinate) in grid.coordinates().enumerate() {
            let label = make_label(&coordinate, &prior_tuples)?;
            registry.insert(&label, index)?;

            let paths = self.job_paths(&label);
            plans.push(JobPlan {
                index,
                baseline_paths: paths.with_tag_suffix(BASELINE_SUFFIX),
                perturbed_paths: paths.with_tag_suffix(PERTURBED_SUFFIX),
                label,
                coordinate,
            });
        }
        Ok((grid, plans))
    }

    /// Template paths with the name nested under the run and the point label
    fn job_paths(&self, label: &str) -> Paths {
        let template = self.search.paths();
        let name = [
            template.name.as_str(),
            template.tag.as_str(),
            template.non_linear_tag.as_str(),
            label,
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");

        Paths {
            name,
            ..template.clone()
        }
    }

    fn jobs_for(&self, plans: &[JobPlan]) -> Result<Vec<Job<S, A>>, SensitivityError> {
        let mut jobs = Vec::with_capacity(plans.len());
        for plan in plans {
            let perturbation = self
                .perturbation_model
                .instance_from_unit_vector(&plan.coordinate)?;
            let composite = ModelInstance::new()
                .with_instance(MODEL_FIELD, self.instance.clone())
                .with_instance(PERTURBATION_FIELD, perturbation);
            let analysis = (self.analysis_for)(&composite);

            let search = self.search.copy_with_paths(self.job_paths(&plan.label));
            tracing::debug!(index = plan.index, label = %plan.label, "built job");
            jobs.push(Job::new(
                plan.index,
                plan.label.clone(),
                analysis,
                Arc::clone(&self.model),
                Arc::clone(&self.perturbation_model),
                search,
            ));
        }
        Ok(jobs)
    }
}

/// Slot executor output back into canonical order.
///
/// Every index must be accounted for exactly once, either completed or
/// skipped; skipped jobs become cancelled failures.
fn collate(
    batch: BatchOutput<JobOutcome>,
    plans: &[JobPlan],
) -> Result<Vec<JobOutcome>, ExecutorError> {
    let mut slots: Vec<Option<JobOutcome>> = (0..plans.len()).map(|_| None).collect();

    let skipped = batch.skipped.into_iter().map(|index| {
        let outcome: Option<JobOutcome> = plans
            .get(index)
            .map(|plan| Err(JobFailure::cancelled(plan.index, plan.label.clone())));
        (index, outcome)
    });
    let completed = batch
        .completed
        .into_iter()
        .map(|done| (done.index, Some(done.output)));

    for (index, outcome) in completed.chain(skipped) {
        let (Some(slot), Some(outcome)) = (slots.get_mut(index), outcome) else {
            return Err(ExecutorError::UnknownIndex { index });
        };
        if slot.is_some() {
            return Err(ExecutorError::DuplicateResult { index });
        }
        *slot = Some(outcome);
    }

    let missing: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| slot.is_none().then_some(index))
        .collect();
    if !missing.is_empty() {
        return Err(ExecutorError::Incomplete { missing });
    }

    Ok(slots.into_iter().flatten().collect())
}
