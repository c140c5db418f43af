//! Shared fakes for the scenario tests

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ExecutorError, FitError};
use crate::executor::{BatchOutput, Executor, ParallelJob};
use crate::job::PERTURBED_SUFFIX;
use crate::model::{CollectionModel, Model, ModelInstance, Prior, PriorModel};
use crate::progress::RunProgress;
use crate::search::{Analysis, FitResult, Paths, Search};
use crate::sensitivity::Sensitivity;

/// A fit that was attempted, as seen by the search
#[derive(Debug, Clone, PartialEq)]
pub struct FitCall {
    pub output_path: PathBuf,
    pub fields: Vec<String>,
}

/// Evaluates the analysis once, at the centre of the unit hypercube
#[derive(Debug, Clone)]
pub struct StubSearch {
    pub paths: Paths,
    /// Label whose baseline fit fails
    pub fail_baseline_for: Option<String>,
    /// Label whose perturbed fit fails
    pub fail_perturbed_for: Option<String>,
    /// Label whose baseline fit panics
    pub panic_for: Option<String>,
    pub calls: Arc<Mutex<Vec<FitCall>>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self {
            paths: Paths::new("sensitivity")
                .with_tag("lines")
                .with_non_linear_tag("stub")
                .with_path_prefix("/output"),
            fail_baseline_for: None,
            fail_perturbed_for: None,
            panic_for: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_perturbed(label: &str) -> Self {
        Self {
            fail_perturbed_for: Some(label.to_string()),
            ..Self::new()
        }
    }

    pub fn failing_baseline(label: &str) -> Self {
        Self {
            fail_baseline_for: Some(label.to_string()),
            ..Self::new()
        }
    }

    pub fn panicking(label: &str) -> Self {
        Self {
            panic_for: Some(label.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<FitCall> {
        self.calls.lock().unwrap().clone()
    }

    fn is_for(&self, label: &Option<String>) -> bool {
        label
            .as_deref()
            .is_some_and(|label| self.paths.name.ends_with(label))
    }
}

impl Search for StubSearch {
    fn paths(&self) -> &Paths {
        &self.paths
    }

    fn copy_with_paths(&self, paths: Paths) -> Self {
        Self {
            paths,
            ..self.clone()
        }
    }

    fn fit<A: Analysis>(&self, model: &CollectionModel, analysis: &A) -> Result<FitResult, FitError> {
        self.calls.lock().unwrap().push(FitCall {
            output_path: self.paths.output_path(),
            fields: model.field_names().map(str::to_string).collect(),
        });

        let perturbed = self.paths.tag.ends_with(PERTURBED_SUFFIX);
        if self.is_for(&self.panic_for) && !perturbed {
            panic!("stub search panicked");
        }
        if self.is_for(&self.fail_baseline_for) && !perturbed {
            return Err(FitError::Failed("baseline diverged".to_string()));
        }
        if self.is_for(&self.fail_perturbed_for) && perturbed {
            return Err(FitError::Failed("perturbed diverged".to_string()));
        }

        let instance = model.instance_from_unit_vector(&vec![0.5; model.prior_count()])?;
        let log_likelihood = analysis.log_likelihood_function(&instance)?;
        Ok(FitResult {
            log_likelihood,
            instance,
        })
    }
}

/// Scores a fit by how well it recovers the injected perturbation.
///
/// The injected centre is subtracted as an offset so every grid point has a
/// distinct baseline log likelihood.
#[derive(Debug, Clone)]
pub struct StubAnalysis {
    pub observation: ModelInstance,
}

impl StubAnalysis {
    fn injected(&self, field: &str) -> f64 {
        self.observation
            .instance("perturbation")
            .and_then(|p| p.value(field))
            .unwrap_or(0.0)
    }
}

impl Analysis for StubAnalysis {
    fn log_likelihood_function(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        let fitted = instance
            .instance("perturbation")
            .and_then(|p| p.value("intensity"))
            .unwrap_or(0.0);
        let residual = self.injected("intensity") - fitted;
        Ok(-(residual * residual) - self.injected("centre"))
    }
}

/// Baseline log likelihood the stubs produce at a unit coordinate
pub fn expected_baseline(coordinate: &[f64]) -> f64 {
    let centre = coordinate[0] * 100.0;
    let intensity = coordinate[1];
    -(intensity * intensity) - centre
}

pub fn base_model() -> Model {
    Model::new()
        .with_prior("centre", Prior::uniform(0.0, 100.0))
        .with_constant("sigma", 2.0)
}

pub fn perturbation_model() -> Model {
    Model::new()
        .with_prior("centre", Prior::uniform(0.0, 100.0))
        .with_prior("intensity", Prior::uniform(0.0, 1.0))
}

pub fn base_instance() -> ModelInstance {
    ModelInstance::new()
        .with_value("centre", 50.0)
        .with_value("sigma", 2.0)
}

/// Two-dimensional run with step 0.5, giving four grid points
pub fn sensitivity(search: StubSearch) -> Sensitivity<StubSearch, StubAnalysis> {
    sensitivity_with(search, Arc::new(perturbation_model()))
}

pub fn sensitivity_with(
    search: StubSearch,
    perturbation: Arc<dyn PriorModel>,
) -> Sensitivity<StubSearch, StubAnalysis> {
    Sensitivity::new(
        base_instance(),
        Arc::new(base_model()),
        perturbation,
        |instance: &ModelInstance| instance.clone(),
        |observation: ModelInstance| StubAnalysis { observation },
        search,
    )
    .step_size(0.5)
}

/// Counts how often the image function is invoked
pub fn counting_sensitivity(
    search: StubSearch,
    images: Arc<AtomicUsize>,
) -> Sensitivity<StubSearch, StubAnalysis> {
    Sensitivity::new(
        base_instance(),
        Arc::new(base_model()),
        Arc::new(perturbation_model()),
        move |instance: &ModelInstance| {
            images.fetch_add(1, Ordering::SeqCst);
            instance.clone()
        },
        |observation: ModelInstance| StubAnalysis { observation },
        search,
    )
    .step_size(0.5)
}

/// Runs jobs in reverse submission order and returns them in that order
#[derive(Debug, Default)]
pub struct ReverseExecutor;

impl Executor for ReverseExecutor {
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        _number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError> {
        let mut batch = BatchOutput::default();
        for (index, job) in jobs.into_iter().enumerate().rev() {
            batch.record(index, Some(job.execute()));
            progress.increment();
        }
        Ok(batch)
    }
}

/// Misbehaving executors for collation checks
#[derive(Debug)]
pub enum FaultyExecutor {
    /// Reports the first job twice
    Duplicate,
    /// Loses the last job
    Drop,
    /// Reports a result past the end of the batch
    Unknown,
    /// Reports the first job as both completed and skipped
    CompletedAndSkipped,
    /// Cancels the run after this many jobs and reports the rest as skipped
    CancelAfter(usize),
    /// Cancels after this many jobs but loses the last job instead of
    /// reporting it as skipped
    CancelAndDrop(usize),
}

impl Executor for FaultyExecutor {
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        _number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError> {
        let total = jobs.len();
        let mut batch = BatchOutput::default();
        for (index, job) in jobs.into_iter().enumerate() {
            match self {
                FaultyExecutor::Drop if index == total - 1 => continue,
                FaultyExecutor::CancelAfter(n) if index >= *n => {
                    progress.cancel();
                    batch.record(index, None);
                    continue;
                }
                FaultyExecutor::CancelAndDrop(n) if index >= *n => {
                    progress.cancel();
                    if index != total - 1 {
                        batch.record(index, None);
                    }
                    continue;
                }
                _ => {}
            }
            let output = job.execute();
            match self {
                FaultyExecutor::Duplicate if index == 0 => {
                    batch.record(index, Some(job.execute()));
                }
                FaultyExecutor::Unknown if index == 0 => {
                    batch.record(total, Some(job.execute()));
                }
                FaultyExecutor::CompletedAndSkipped if index == 0 => {
                    batch.record(index, None);
                }
                _ => {}
            }
            batch.record(index, Some(output));
        }
        Ok(batch)
    }
}
