//! Tests for complete line-profile runs
//!
//! These tests verify:
//! - Every grid point produces a result and search output on disk
//! - Baseline and perturbed searches write to separate directories
//! - A bright injected line is detected and the report reflects it

use std::fs;
use std::path::Path;

use sensimap_core::{SensitivityError, StepSize};
use tempfile::tempdir;

use crate::config::{ParameterData, RunConfig};
use crate::report::SensitivityReport;
use crate::search::{RESULT_FILE, SAMPLES_FILE};

fn config(path_prefix: &Path) -> RunConfig {
    let mut config = RunConfig {
        step_size: 0.5,
        ..RunConfig::default()
    };
    config.output.name = "lines".to_string();
    config.output.path_prefix = path_prefix.to_path_buf();
    config.observation.pixels = 60;
    config.observation.noise_sigma = 0.2;
    config.instance.centre = 40.0;
    config.model.centre = ParameterData::Uniform {
        lower: 35.0,
        upper: 45.0,
    };
    config.model.intensity = ParameterData::Fixed { value: 10.0 };
    config.model.sigma = ParameterData::Fixed { value: 3.0 };
    config.perturbation.centre = ParameterData::Uniform {
        lower: 0.0,
        upper: 50.0,
    };
    config.perturbation.intensity = ParameterData::Uniform {
        lower: 0.0,
        upper: 4.0,
    };
    config.search.steps_per_dimension = 5;
    config
}

#[test]
fn test_run_writes_every_namespace() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    config.validate().unwrap();

    let sensitivity = config.sensitivity();
    let plans = sensitivity.plan().unwrap();
    let results = sensitivity.run().unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results.success_count(), 4);

    for plan in &plans {
        let baseline = plan.baseline_paths.output_path();
        let perturbed = plan.perturbed_paths.output_path();
        assert_ne!(baseline, perturbed);
        assert!(baseline.starts_with(dir.path().join("lines")));
        assert!(baseline.join(RESULT_FILE).exists());
        assert!(baseline.join(SAMPLES_FILE).exists());
        assert!(perturbed.join(RESULT_FILE).exists());
    }
}

#[test]
fn test_bright_line_is_detected() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let results = config.sensitivity().run().unwrap();

    // Centre 25 and intensity 4: a bright line the search grid can reach
    let map = results.sensitivity_map();
    let difference = map.get(&[0, 1]).copied().flatten().unwrap();
    assert!(difference > config.detection_threshold, "difference {difference}");

    let started = jiff::Timestamp::now();
    let report = SensitivityReport::new("lines", started, started, &results, config.detection_threshold);
    assert!(report.detections >= 1);
    assert_eq!(report.failures, 0);
    assert!(report.render_plane().unwrap().starts_with("centre | intensity"));
}

#[test]
fn test_remove_files_keeps_only_results() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.output.remove_files = true;
    config.step_sizes = Some(vec![1.0, 0.5]);

    let sensitivity = config.sensitivity();
    let plans = sensitivity.plan().unwrap();
    assert_eq!(plans.len(), 2);
    sensitivity.run().unwrap();

    for plan in &plans {
        let output = plan.perturbed_paths.output_path();
        assert!(output.join(RESULT_FILE).exists());
        assert!(!output.join(SAMPLES_FILE).exists());
    }
    assert_eq!(config.step(), StepSize::PerDimension(vec![1.0, 0.5]));
}

#[test]
fn test_single_core_writes_nothing() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.number_of_cores = 1;

    let err = config.sensitivity().run().unwrap_err();
    assert_eq!(err, SensitivityError::TooFewCores { requested: 1 });
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}
