//! Command-line front end for sensitivity mapping
//!
//! This crate runs sensitivity maps described by YAML files:
//! - Run configuration with defaults for every section
//! - A line-profile demo domain (Gaussian lines with seeded noise)
//! - An exhaustive grid search that writes its output under each job's namespace
//! - JSON and console reports of the finished map

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod line_profile;
pub mod logging;
pub mod report;
pub mod search;
pub mod util;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::RunConfig;
pub use line_profile::{ImageSimulator, LineAnalysis, LineComponent, LineImage};
pub use logging::init_logging;
pub use report::SensitivityReport;
pub use search::GridSearch;

#[cfg(test)]
mod tests;
