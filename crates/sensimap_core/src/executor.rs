//! Parallel execution of independent jobs.
//!
//! An [`Executor`] takes a closed batch of jobs and returns every output it
//! produced tagged with the job's submission index, plus the indices it
//! skipped after cancellation. Completion order is not guaranteed; callers
//! restore it from the index.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::ExecutorError;
use crate::progress::RunProgress;

/// A self-contained unit of work that may run on any thread
pub trait ParallelJob: Send + 'static {
    type Output: Send + 'static;

    fn execute(&self) -> Self::Output;
}

/// Output of one job and its position in the submitted batch
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T> {
    pub index: usize,
    pub output: T,
}

/// Everything an executor accounts for in one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput<T> {
    pub completed: Vec<Completed<T>>,
    /// Jobs never started because the run was cancelled
    pub skipped: Vec<usize>,
}

impl<T> Default for BatchOutput<T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BatchOutput<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            completed: Vec::with_capacity(capacity),
            skipped: Vec::new(),
        }
    }

    /// Record what happened to job `index`; `None` means it was skipped
    pub fn record(&mut self, index: usize, output: Option<T>) {
        match output {
            Some(output) => self.completed.push(Completed { index, output }),
            None => self.skipped.push(index),
        }
    }
}

pub trait Executor {
    /// Run every job at most once using up to `number_of_cores` workers.
    ///
    /// A job not started before `progress` is cancelled must be reported in
    /// [`BatchOutput::skipped`] instead of being run.
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError>;
}

/// Fixed set of worker threads fed through a bounded task queue
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool;

impl Executor for WorkerPool {
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError> {
        if number_of_cores == 0 {
            return Err(ExecutorError::InvalidWorkerCount(number_of_cores));
        }

        let (task_tx, task_rx) = sync_channel::<(usize, J)>(number_of_cores);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = channel::<(usize, Option<J::Output>)>();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(number_of_cores);
            for worker in 0..number_of_cores {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("sensimap-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        loop {
                            // Hold the lock only while waiting for the next task
                            let next = match task_rx.lock() {
                                Ok(receiver) => receiver.recv(),
                                Err(_) => break,
                            };
                            let Ok((index, job)) = next else {
                                break;
                            };
                            let output = if progress.is_cancelled() {
                                None
                            } else {
                                let output = job.execute();
                                progress.increment();
                                Some(output)
                            };
                            if result_tx.send((index, output)).is_err() {
                                break;
                            }
                        }
                        tracing::trace!(worker, "worker exiting");
                    })
                    .map_err(|e| ExecutorError::Pool(e.to_string()))?;
                handles.push(handle);
            }
            drop(task_rx);
            drop(result_tx);

            for (index, job) in jobs.into_iter().enumerate() {
                // Fails only once every worker has gone away
                if task_tx.send((index, job)).is_err() {
                    break;
                }
            }
            drop(task_tx);

            let mut panicked = None;
            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    tracing::error!(worker, "worker panicked");
                    panicked.get_or_insert(worker);
                }
            }
            if let Some(worker) = panicked {
                return Err(ExecutorError::WorkerPanicked { worker });
            }

            let mut batch = BatchOutput::default();
            for (index, output) in result_rx {
                batch.record(index, output);
            }
            Ok(batch)
        })
    }
}

/// Runs jobs on a dedicated rayon pool sized to `number_of_cores`
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonExecutor;

#[cfg(feature = "parallel")]
impl Executor for RayonExecutor {
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError> {
        if number_of_cores == 0 {
            return Err(ExecutorError::InvalidWorkerCount(number_of_cores));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(number_of_cores)
            .thread_name(|i| format!("sensimap-rayon-{i}"))
            .build()
            .map_err(|e| ExecutorError::Pool(e.to_string()))?;

        let outputs: Vec<Result<Option<J::Output>, usize>> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| {
                    if progress.is_cancelled() {
                        return Ok(None);
                    }
                    let output = panic::catch_unwind(AssertUnwindSafe(|| job.execute()))
                        .map_err(|_| rayon::current_thread_index().unwrap_or(0))?;
                    progress.increment();
                    Ok(Some(output))
                })
                .collect()
        });

        let mut batch = BatchOutput::with_capacity(outputs.len());
        for (index, outcome) in outputs.into_iter().enumerate() {
            match outcome {
                Ok(output) => batch.record(index, output),
                Err(worker) => {
                    tracing::error!(worker, index, "job panicked on rayon worker");
                    return Err(ExecutorError::WorkerPanicked { worker });
                }
            }
        }
        Ok(batch)
    }
}

/// Runs jobs one after another on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn run_jobs<J: ParallelJob>(
        &self,
        jobs: Vec<J>,
        _number_of_cores: usize,
        progress: &RunProgress,
    ) -> Result<BatchOutput<J::Output>, ExecutorError> {
        let mut batch = BatchOutput::with_capacity(jobs.len());
        for (index, job) in jobs.into_iter().enumerate() {
            if progress.is_cancelled() {
                batch.record(index, None);
                continue;
            }
            batch.record(index, Some(job.execute()));
            progress.increment();
        }
        Ok(batch)
    }
}
