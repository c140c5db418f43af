//! YAML run configuration.
//!
//! A run file describes the output namespace, grid resolution, the simulated
//! observation and the base and perturbation line models. Every section has
//! defaults, so a minimal file only needs what differs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::eyre::{WrapErr, bail, ensure};
use serde::{Deserialize, Serialize};

use sensimap_core::{
    FailurePolicy, MIN_NUMBER_OF_CORES, Model, Parameter, Paths, Prior, PriorModel, Sensitivity,
    StepSize,
};

use crate::line_profile::{CENTRE, INTENSITY, ImageSimulator, LineAnalysis, LineComponent, SIGMA};
use crate::search::GridSearch;

/// YAML-friendly parameter; explicit fields keep it readable in the run file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterData {
    Uniform { lower: f64, upper: f64 },
    LogUniform { lower: f64, upper: f64 },
    Fixed { value: f64 },
}

impl From<ParameterData> for Parameter {
    fn from(data: ParameterData) -> Self {
        match data {
            ParameterData::Uniform { lower, upper } => Parameter::Free(Prior::uniform(lower, upper)),
            ParameterData::LogUniform { lower, upper } => {
                Parameter::Free(Prior::log_uniform(lower, upper))
            }
            ParameterData::Fixed { value } => Parameter::Fixed(value),
        }
    }
}

/// Parameters of one line model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineModelConfig {
    pub centre: ParameterData,
    pub sigma: ParameterData,
    pub intensity: ParameterData,
}

impl LineModelConfig {
    pub fn to_model(&self) -> Model {
        Model::new()
            .with_parameter(CENTRE, self.centre.into())
            .with_parameter(SIGMA, self.sigma.into())
            .with_parameter(INTENSITY, self.intensity.into())
    }

    fn default_base() -> Self {
        Self {
            centre: ParameterData::Uniform {
                lower: 0.0,
                upper: 100.0,
            },
            sigma: ParameterData::Fixed { value: 3.0 },
            intensity: ParameterData::Uniform {
                lower: 0.0,
                upper: 20.0,
            },
        }
    }

    fn default_perturbation() -> Self {
        Self {
            centre: ParameterData::Uniform {
                lower: 0.0,
                upper: 100.0,
            },
            sigma: ParameterData::Fixed { value: 2.0 },
            intensity: ParameterData::Uniform {
                lower: 0.0,
                upper: 5.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub name: String,
    pub tag: String,
    pub non_linear_tag: String,
    pub path_prefix: PathBuf,
    pub remove_files: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            name: "sensitivity".to_string(),
            tag: String::new(),
            non_linear_tag: "grid".to_string(),
            path_prefix: PathBuf::from("output"),
            remove_files: false,
        }
    }
}

impl OutputConfig {
    pub fn to_paths(&self) -> Paths {
        Paths::new(self.name.clone())
            .with_tag(self.tag.clone())
            .with_non_linear_tag(self.non_linear_tag.clone())
            .with_path_prefix(&self.path_prefix)
            .with_remove_files(self.remove_files)
    }

    /// Directory all of this run's searches write under
    pub fn run_dir(&self) -> PathBuf {
        self.path_prefix.join(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    pub pixels: usize,
    pub noise_sigma: f64,
    pub seed: u64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            pixels: 100,
            noise_sigma: 0.5,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub steps_per_dimension: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            steps_per_dimension: 10,
        }
    }
}

fn default_number_of_cores() -> usize {
    MIN_NUMBER_OF_CORES
}

fn default_step_size() -> f64 {
    sensimap_core::DEFAULT_STEP_SIZE
}

fn default_detection_threshold() -> f64 {
    5.0
}

fn default_instance() -> LineComponent {
    LineComponent {
        centre: 50.0,
        sigma: 3.0,
        intensity: 10.0,
    }
}

fn default_model() -> LineModelConfig {
    LineModelConfig::default_base()
}

fn default_perturbation() -> LineModelConfig {
    LineModelConfig::default_perturbation()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default = "default_number_of_cores")]
    pub number_of_cores: usize,

    /// Step applied to every perturbation dimension
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Per-dimension steps; overrides `step_size` when present
    #[serde(default)]
    pub step_sizes: Option<Vec<f64>>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Log likelihood gain above which a perturbation counts as detected
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: f64,

    #[serde(default)]
    pub observation: ObservationConfig,

    /// Base line the perturbation is injected next to
    #[serde(default = "default_instance")]
    pub instance: LineComponent,

    #[serde(default = "default_model")]
    pub model: LineModelConfig,

    #[serde(default = "default_perturbation")]
    pub perturbation: LineModelConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            number_of_cores: default_number_of_cores(),
            step_size: default_step_size(),
            step_sizes: None,
            failure_policy: FailurePolicy::default(),
            detection_threshold: default_detection_threshold(),
            observation: ObservationConfig::default(),
            instance: default_instance(),
            model: default_model(),
            perturbation: default_perturbation(),
            search: SearchConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_saphyr::ser::Error> {
        serde_saphyr::to_string(self)
    }

    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read run config {}", path.display()))?;
        Self::from_yaml(&content)
            .wrap_err_with(|| format!("failed to parse run config {}", path.display()))
    }

    pub fn step(&self) -> StepSize {
        match &self.step_sizes {
            Some(steps) => StepSize::PerDimension(steps.clone()),
            None => StepSize::Uniform(self.step_size),
        }
    }

    /// Reject values the run could not use
    pub fn validate(&self) -> color_eyre::Result<()> {
        ensure!(!self.output.name.is_empty(), "output.name must not be empty");
        ensure!(
            self.number_of_cores >= MIN_NUMBER_OF_CORES,
            "number_of_cores must be at least {MIN_NUMBER_OF_CORES}, got {}",
            self.number_of_cores
        );
        ensure!(self.observation.pixels > 0, "observation.pixels must be positive");
        ensure!(
            self.observation.noise_sigma.is_finite() && self.observation.noise_sigma > 0.0,
            "observation.noise_sigma must be positive, got {}",
            self.observation.noise_sigma
        );
        ensure!(
            self.search.steps_per_dimension > 0,
            "search.steps_per_dimension must be positive"
        );
        ensure!(
            self.detection_threshold.is_finite(),
            "detection_threshold must be finite"
        );

        let perturbation = self.perturbation.to_model();
        if perturbation.prior_count() == 0 {
            bail!("perturbation must have at least one free parameter");
        }
        perturbation
            .validate()
            .wrap_err("invalid perturbation model")?;
        self.model.to_model().validate().wrap_err("invalid base model")?;
        self.step()
            .resolve(perturbation.prior_count())
            .wrap_err("invalid step size")?;
        Ok(())
    }

    pub fn simulator(&self) -> ImageSimulator {
        ImageSimulator {
            pixels: self.observation.pixels,
            noise_sigma: self.observation.noise_sigma,
            seed: self.observation.seed,
        }
    }

    /// Assemble the sensitivity run this file describes
    pub fn sensitivity(&self) -> Sensitivity<GridSearch, LineAnalysis> {
        let simulator = self.simulator();
        Sensitivity::new(
            self.instance.to_instance(),
            Arc::new(self.model.to_model()),
            Arc::new(self.perturbation.to_model()),
            move |instance| simulator.simulate(instance),
            LineAnalysis::new,
            GridSearch::new(self.output.to_paths(), self.search.steps_per_dimension),
        )
        .step_size(self.step())
        .number_of_cores(self.number_of_cores)
        .failure_policy(self.failure_policy)
    }
}
