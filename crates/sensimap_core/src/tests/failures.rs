//! Tests for job failures
//!
//! These tests verify:
//! - A failed fit is recorded at its grid index without dropping other points
//! - A baseline failure skips the perturbed fit
//! - The abort policy surfaces the lowest-index failure after the batch drains
//! - Cancelled runs mark unstarted points explicitly

use crate::error::SensitivityError;
use crate::executor::{SequentialExecutor, WorkerPool};
use crate::job::{BASELINE_SUFFIX, FitStage};
use crate::progress::RunProgress;
use crate::sensitivity::FailurePolicy;

use super::support::{FaultyExecutor, ReverseExecutor, StubSearch, sensitivity};

const FAILING_LABEL: &str = "centre_100.0_intensity_0.5";

#[test]
fn test_one_perturbed_failure_of_four() {
    let results = sensitivity(StubSearch::failing_perturbed(FAILING_LABEL))
        .executor(ReverseExecutor)
        .run()
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results.success_count(), 3);

    let failures: Vec<_> = results.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 2);
    assert_eq!(failures[0].label, FAILING_LABEL);
    assert_eq!(failures[0].stage, FitStage::Perturbed);
    assert!(failures[0].message.contains("perturbed diverged"));

    for (i, point) in results.points().iter().enumerate() {
        assert_eq!(point.outcome.is_err(), i == 2, "grid index {i}");
    }
    assert_eq!(results.log_likelihood_differences()[2], None);
}

#[test]
fn test_baseline_failure_skips_perturbed_fit() {
    let search = StubSearch::failing_baseline(FAILING_LABEL);
    let results = sensitivity(search.clone())
        .executor(SequentialExecutor)
        .run()
        .unwrap();

    let failure = results.failures().next().unwrap();
    assert_eq!(failure.index, 2);
    assert_eq!(failure.stage, FitStage::Baseline);

    let attempts: Vec<_> = search
        .calls()
        .into_iter()
        .filter(|call| call.output_path.to_string_lossy().contains(FAILING_LABEL))
        .collect();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].output_path.ends_with(format!("lines{BASELINE_SUFFIX}")));
    assert_eq!(search.calls().len(), 7);
}

#[test]
fn test_abort_policy_returns_failure() {
    let search = StubSearch::failing_perturbed(FAILING_LABEL);
    let err = sensitivity(search.clone())
        .failure_policy(FailurePolicy::Abort)
        .executor(ReverseExecutor)
        .run()
        .unwrap_err();

    assert!(!err.is_configuration_error());
    match err {
        SensitivityError::JobFailed(failure) => {
            assert_eq!(failure.index, 2);
            assert_eq!(failure.stage, FitStage::Perturbed);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Every job still ran
    assert_eq!(search.calls().len(), 8);
}

#[test]
fn test_abort_reports_lowest_index() {
    let progress = RunProgress::new(0);
    let err = sensitivity(StubSearch::new())
        .failure_policy(FailurePolicy::Abort)
        .executor(FaultyExecutor::CancelAfter(1))
        .run_with_progress(&progress)
        .unwrap_err();

    match err {
        SensitivityError::JobFailed(failure) => {
            assert_eq!(failure.index, 1);
            assert_eq!(failure.stage, FitStage::Cancelled);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cancellation_marks_remaining_points() {
    let progress = RunProgress::new(0);
    let results = sensitivity(StubSearch::new())
        .executor(FaultyExecutor::CancelAfter(2))
        .run_with_progress(&progress)
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results.success_count(), 2);
    let cancelled: Vec<usize> = results
        .failures()
        .filter(|f| f.stage == FitStage::Cancelled)
        .map(|f| f.index)
        .collect();
    assert_eq!(cancelled, vec![2, 3]);
}

#[test]
fn test_cancelled_handle_cancels_later_runs() {
    let progress = RunProgress::new(0);
    sensitivity(StubSearch::new())
        .executor(FaultyExecutor::CancelAfter(0))
        .run_with_progress(&progress)
        .unwrap();
    assert!(progress.is_cancelled());

    let search = StubSearch::new();
    let rerun = sensitivity(search.clone())
        .executor(SequentialExecutor)
        .run_with_progress(&progress)
        .unwrap();
    assert_eq!(rerun.len(), 4);
    assert!(rerun.failures().all(|f| f.stage == FitStage::Cancelled));
    assert!(search.calls().is_empty());

    let fresh = sensitivity(search.clone())
        .executor(SequentialExecutor)
        .run_with_progress(&RunProgress::default())
        .unwrap();
    assert_eq!(fresh.success_count(), 4);
}

#[test]
fn test_worker_pool_skips_jobs_after_cancel() {
    let search = StubSearch::new();
    let progress = RunProgress::new(0);
    progress.cancel();

    let results = sensitivity(search.clone())
        .number_of_cores(2)
        .executor(WorkerPool)
        .run_with_progress(&progress)
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results.success_count(), 0);
    assert!(results.failures().all(|f| f.stage == FitStage::Cancelled));
    assert!(search.calls().is_empty());
}
