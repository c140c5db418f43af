//! One-dimensional line-profile domain.
//!
//! An observation is a strip of pixels containing Gaussian line components.
//! The base model is a single bright line; the perturbation is a second,
//! fainter line whose detectability is being mapped.

use rand::SeedableRng;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use sensimap_core::{Analysis, FitError, InstanceValue, ModelError, ModelInstance};

pub const CENTRE: &str = "centre";
pub const SIGMA: &str = "sigma";
pub const INTENSITY: &str = "intensity";

/// A Gaussian line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineComponent {
    pub centre: f64,
    pub sigma: f64,
    pub intensity: f64,
}

impl LineComponent {
    pub fn from_instance(instance: &ModelInstance) -> Result<Self, ModelError> {
        Ok(Self {
            centre: instance.require_value(CENTRE)?,
            sigma: instance.require_value(SIGMA)?,
            intensity: instance.require_value(INTENSITY)?,
        })
    }

    pub fn to_instance(self) -> ModelInstance {
        ModelInstance::new()
            .with_value(CENTRE, self.centre)
            .with_value(SIGMA, self.sigma)
            .with_value(INTENSITY, self.intensity)
    }

    /// Flux of the line at pixel coordinate `x`
    pub fn profile_at(&self, x: f64) -> f64 {
        if self.sigma <= 0.0 {
            return 0.0;
        }
        let z = (x - self.centre) / self.sigma;
        self.intensity * (-0.5 * z * z).exp()
    }

    /// Every line in `instance`, looking through nested sub-instances
    pub fn collect(instance: &ModelInstance) -> Vec<LineComponent> {
        let mut components = Vec::new();
        collect_into(instance, &mut components);
        components
    }
}

fn collect_into(instance: &ModelInstance, components: &mut Vec<LineComponent>) {
    if let Ok(component) = LineComponent::from_instance(instance) {
        components.push(component);
    }
    for (_, value) in instance.fields() {
        if let InstanceValue::Nested(nested) = value {
            collect_into(nested, components);
        }
    }
}

/// Noise-free flux of `components` at each of `pixels` pixels
pub fn model_profile(components: &[LineComponent], pixels: usize) -> Vec<f64> {
    (0..pixels)
        .map(|x| components.iter().map(|c| c.profile_at(x as f64)).sum())
        .collect()
}

/// A simulated observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineImage {
    pub data: Vec<f64>,
    pub noise_sigma: f64,
}

impl LineImage {
    pub fn pixels(&self) -> usize {
        self.data.len()
    }
}

/// Synthesizes observations from model instances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSimulator {
    pub pixels: usize,
    pub noise_sigma: f64,
    /// Every image uses the same noise realisation
    pub seed: u64,
}

impl ImageSimulator {
    /// Sum every line in `instance` and add seeded Gaussian noise
    pub fn simulate(&self, instance: &ModelInstance) -> LineImage {
        let mut data = model_profile(&LineComponent::collect(instance), self.pixels);

        if let Ok(noise) = rand_distr::Normal::new(0.0, self.noise_sigma) {
            let mut rng = StdRng::seed_from_u64(self.seed);
            for value in &mut data {
                *value += noise.sample(&mut rng);
            }
        }

        LineImage {
            data,
            noise_sigma: self.noise_sigma,
        }
    }
}

/// Gaussian likelihood of a line model against one image
#[derive(Debug, Clone)]
pub struct LineAnalysis {
    image: LineImage,
}

impl LineAnalysis {
    pub fn new(image: LineImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &LineImage {
        &self.image
    }

    pub fn chi_squared(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        let components = LineComponent::collect(instance);
        if components.is_empty() {
            return Err(FitError::Likelihood(
                "instance contains no line components".to_string(),
            ));
        }
        if self.image.noise_sigma <= 0.0 {
            return Err(FitError::Likelihood(format!(
                "noise sigma must be positive, got {}",
                self.image.noise_sigma
            )));
        }

        let model = model_profile(&components, self.image.pixels());
        Ok(self
            .image
            .data
            .iter()
            .zip(&model)
            .map(|(data, model)| {
                let residual = (data - model) / self.image.noise_sigma;
                residual * residual
            })
            .sum())
    }
}

impl Analysis for LineAnalysis {
    fn log_likelihood_function(&self, instance: &ModelInstance) -> Result<f64, FitError> {
        let log_likelihood = -0.5 * self.chi_squared(instance)?;
        if !log_likelihood.is_finite() {
            return Err(FitError::Likelihood(format!(
                "non-finite log likelihood {log_likelihood}"
            )));
        }
        Ok(log_likelihood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(centre: f64, intensity: f64) -> LineComponent {
        LineComponent {
            centre,
            sigma: 2.0,
            intensity,
        }
    }

    fn composite() -> ModelInstance {
        ModelInstance::new()
            .with_instance("model", line(20.0, 10.0).to_instance())
            .with_instance("perturbation", line(35.0, 1.0).to_instance())
    }

    #[test]
    fn test_profile_peaks_at_centre() {
        let component = line(10.0, 4.0);
        assert_eq!(component.profile_at(10.0), 4.0);
        assert!(component.profile_at(12.0) < 4.0);
        assert_eq!(component.profile_at(8.0), component.profile_at(12.0));
    }

    #[test]
    fn test_collect_finds_nested_components() {
        let components = LineComponent::collect(&composite());
        assert_eq!(components, vec![line(20.0, 10.0), line(35.0, 1.0)]);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let simulator = ImageSimulator {
            pixels: 50,
            noise_sigma: 0.1,
            seed: 7,
        };
        let first = simulator.simulate(&composite());
        let second = simulator.simulate(&composite());
        assert_eq!(first, second);
        assert_eq!(first.pixels(), 50);
    }

    #[test]
    fn test_true_model_beats_baseline() {
        let image = ImageSimulator {
            pixels: 60,
            noise_sigma: 0.1,
            seed: 3,
        }
        .simulate(&composite());
        let analysis = LineAnalysis::new(image);

        let baseline = ModelInstance::new().with_instance("model", line(20.0, 10.0).to_instance());
        let with_line = composite();

        let baseline_ll = analysis.log_likelihood_function(&baseline).unwrap();
        let perturbed_ll = analysis.log_likelihood_function(&with_line).unwrap();
        assert!(perturbed_ll > baseline_ll);
    }

    #[test]
    fn test_noise_free_exact_fit() {
        let image = ImageSimulator {
            pixels: 40,
            noise_sigma: 0.0,
            seed: 0,
        }
        .simulate(&composite());
        assert_eq!(image.data, model_profile(&LineComponent::collect(&composite()), 40));

        let analysis = LineAnalysis::new(LineImage {
            noise_sigma: 1.0,
            ..image
        });
        assert_eq!(analysis.log_likelihood_function(&composite()).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_instance_is_an_error() {
        let analysis = LineAnalysis::new(LineImage {
            data: vec![0.0; 4],
            noise_sigma: 1.0,
        });
        assert!(matches!(
            analysis.log_likelihood_function(&ModelInstance::new()),
            Err(FitError::Likelihood(_))
        ));
    }
}
