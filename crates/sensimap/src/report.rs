//! Run reports: saved as JSON and printed as a table.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use sensimap_core::{GridPoint, SensitivityMap, SensitivityResults};

use crate::util::io::atomic_write;

pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPoint {
    pub index: usize,
    pub label: String,
    pub coordinate: Vec<f64>,
    pub log_likelihood_baseline: Option<f64>,
    pub log_likelihood_perturbed: Option<f64>,
    pub log_likelihood_difference: Option<f64>,
    pub detected: bool,
    pub error: Option<String>,
}

impl ReportPoint {
    fn from_point(point: &GridPoint, threshold: f64) -> Self {
        let (baseline, perturbed, error) = match &point.outcome {
            Ok(result) => (
                Some(result.result.log_likelihood),
                Some(result.perturbed_result.log_likelihood),
                None,
            ),
            Err(failure) => (None, None, Some(failure.to_string())),
        };
        let difference = point.log_likelihood_difference();

        Self {
            index: point.index,
            label: point.label.clone(),
            coordinate: point.coordinate.clone(),
            log_likelihood_baseline: baseline,
            log_likelihood_perturbed: perturbed,
            log_likelihood_difference: difference,
            detected: difference.is_some_and(|d| d > threshold),
            error,
        }
    }
}

/// Summary of one sensitivity run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub name: String,
    pub started: Timestamp,
    pub finished: Timestamp,
    /// Log likelihood differences over the physical perturbation grid
    pub map: SensitivityMap<Option<f64>>,
    pub detection_threshold: f64,
    pub detections: usize,
    pub failures: usize,
    pub points: Vec<ReportPoint>,
}

impl SensitivityReport {
    pub fn new(
        name: impl Into<String>,
        started: Timestamp,
        finished: Timestamp,
        results: &SensitivityResults,
        detection_threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            started,
            finished,
            map: results.sensitivity_map(),
            detection_threshold,
            detections: results.detections(detection_threshold),
            failures: results.failures().count(),
            points: results
                .points()
                .iter()
                .map(|point| ReportPoint::from_point(point, detection_threshold))
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        atomic_write(path, &json)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }

    /// Plain-text table of every grid point
    pub fn render_table(&self) -> String {
        let label_width = self
            .points
            .iter()
            .map(|p| p.label.len())
            .max()
            .unwrap_or(0)
            .max("label".len());

        let mut out = String::new();
        let duration = self.finished.duration_since(self.started);
        let _ = writeln!(
            out,
            "{}: {} points {:?}, {} detected (threshold {}), {} failed, took {:.1}s",
            self.name,
            self.points.len(),
            self.map.shape(),
            self.detections,
            self.detection_threshold,
            self.failures,
            duration.as_secs_f64()
        );
        if let Some((coordinate, difference)) = self.map.peak() {
            let at: Vec<String> = self
                .map
                .axes()
                .iter()
                .zip(&coordinate)
                .map(|(axis, value)| format!("{}={value}", axis.name))
                .collect();
            let _ = writeln!(out, "peak delta {difference:.3} at {}", at.join(", "));
        }
        let _ = writeln!(
            out,
            "{:>5}  {:<label_width$}  {:>14}  {:>14}  {:>10}  detected",
            "index", "label", "baseline", "perturbed", "delta"
        );

        for point in &self.points {
            match (&point.error, point.log_likelihood_difference) {
                (Some(error), _) => {
                    let _ = writeln!(
                        out,
                        "{:>5}  {:<label_width$}  failed: {error}",
                        point.index, point.label
                    );
                }
                (None, difference) => {
                    let _ = writeln!(
                        out,
                        "{:>5}  {:<label_width$}  {:>14.3}  {:>14.3}  {:>10.3}  {}",
                        point.index,
                        point.label,
                        point.log_likelihood_baseline.unwrap_or(f64::NAN),
                        point.log_likelihood_perturbed.unwrap_or(f64::NAN),
                        difference.unwrap_or(f64::NAN),
                        if point.detected { "yes" } else { "no" }
                    );
                }
            }
        }
        out
    }

    /// Detection plane over the first two perturbation parameters.
    ///
    /// `+` marks a detection, `.` a point below threshold and `x` a failed
    /// point. Further parameters are held at their first grid value. `None`
    /// for one-parameter maps.
    pub fn render_plane(&self) -> Option<String> {
        let at = vec![0; self.map.ndim()];
        let plane = self.map.plane(0, 1, &at)?;

        let row_width = plane
            .row_values
            .iter()
            .map(|v| format!("{v}").len())
            .max()
            .unwrap_or(0)
            .max(plane.row_axis.len());

        let mut out = String::new();
        let _ = writeln!(out, "{:>row_width$} | {}", plane.row_axis, plane.col_axis);
        for (value, cells) in plane.row_values.iter().zip(&plane.rows) {
            let marks: String = cells
                .iter()
                .map(|cell| match cell {
                    Some(d) if *d > self.detection_threshold => '+',
                    Some(_) => '.',
                    None => 'x',
                })
                .collect();
            let _ = writeln!(out, "{:>row_width$} | {marks}", format!("{value}"));
        }
        let columns: Vec<String> = plane.col_values.iter().map(|v| format!("{v}")).collect();
        let _ = writeln!(out, "{:>row_width$} | {}", "", columns.join(" "));
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensimap_core::{FitResult, FitStage, JobFailure, JobResult, MapAxis, ModelInstance};
    use tempfile::tempdir;

    fn fit(log_likelihood: f64) -> FitResult {
        FitResult {
            log_likelihood,
            instance: ModelInstance::new(),
        }
    }

    fn results() -> SensitivityResults {
        SensitivityResults::new(
            vec![MapAxis {
                name: "centre".to_string(),
                values: vec![50.0, 100.0],
            }],
            vec![
                GridPoint {
                    index: 0,
                    coordinate: vec![0.5],
                    label: "centre_50.0".to_string(),
                    outcome: Ok(JobResult {
                        result: fit(-120.0),
                        perturbed_result: fit(-100.0),
                    }),
                },
                GridPoint {
                    index: 1,
                    coordinate: vec![1.0],
                    label: "centre_100.0".to_string(),
                    outcome: Err(JobFailure {
                        index: 1,
                        label: "centre_100.0".to_string(),
                        stage: FitStage::Perturbed,
                        message: "search failed: diverged".to_string(),
                    }),
                },
            ],
        )
    }

    fn report() -> SensitivityReport {
        let started: Timestamp = "2026-01-01T00:00:00Z".parse().unwrap();
        let finished: Timestamp = "2026-01-01T00:00:30Z".parse().unwrap();
        SensitivityReport::new("lines", started, finished, &results(), 5.0)
    }

    #[test]
    fn test_report_summarises_points() {
        let report = report();
        assert_eq!(report.detections, 1);
        assert_eq!(report.failures, 1);
        assert_eq!(report.points[0].log_likelihood_difference, Some(20.0));
        assert!(report.points[0].detected);
        assert!(!report.points[1].detected);
        assert!(report.points[1].error.as_deref().unwrap().contains("diverged"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines").join(REPORT_FILE);
        let report = report();

        report.save(&path).unwrap();

        assert_eq!(SensitivityReport::load(&path).unwrap(), report);
    }

    #[test]
    fn test_table_lists_every_point() {
        let table = report().render_table();
        assert!(table.starts_with("lines: 2 points [2], 1 detected"));
        assert!(table.contains("took 30.0s"));
        assert!(table.contains("centre_50.0"));
        assert!(table.contains("yes"));
        assert!(table.contains("failed: job 1 (centre_100.0)"));
        assert!(table.contains("peak delta 20.000 at centre=50"));
    }

    #[test]
    fn test_one_parameter_map_has_no_plane() {
        assert_eq!(report().render_plane(), None);
    }

    #[test]
    fn test_plane_marks_detections_and_failures() {
        let axis = |name: &str, values: Vec<f64>| MapAxis {
            name: name.to_string(),
            values,
        };
        let point = |index: usize, perturbed: Option<f64>| GridPoint {
            index,
            coordinate: vec![],
            label: format!("point_{index}"),
            outcome: match perturbed {
                Some(ll) => Ok(JobResult {
                    result: fit(-10.0),
                    perturbed_result: fit(ll),
                }),
                None => Err(JobFailure::cancelled(index, format!("point_{index}"))),
            },
        };
        let results = SensitivityResults::new(
            vec![
                axis("centre", vec![25.0, 50.0]),
                axis("intensity", vec![2.0, 4.0, 6.0]),
            ],
            vec![
                point(0, Some(-9.0)),
                point(1, Some(0.0)),
                point(2, None),
                point(3, Some(-10.0)),
                point(4, Some(-9.5)),
                point(5, Some(20.0)),
            ],
        );
        let started: Timestamp = "2026-01-01T00:00:00Z".parse().unwrap();
        let report = SensitivityReport::new("lines", started, started, &results, 5.0);

        let plane = report.render_plane().unwrap();
        let lines: Vec<&str> = plane.lines().collect();
        assert_eq!(lines[0], "centre | intensity");
        assert_eq!(lines[1], "    25 | .+x");
        assert_eq!(lines[2], "    50 | ..+");
        assert_eq!(lines[3], "       | 2 4 6");
        assert!(report.render_table().contains("peak delta 30.000 at centre=50, intensity=6"));
    }
}
