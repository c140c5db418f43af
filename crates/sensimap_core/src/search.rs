//! Seams to the non-linear search and the likelihood it maximizes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::model::{CollectionModel, ModelInstance};

/// Where a search writes its output and whether it keeps intermediate files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub non_linear_tag: String,
    #[serde(default)]
    pub path_prefix: PathBuf,
    #[serde(default)]
    pub remove_files: bool,
}

impl Paths {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: String::new(),
            non_linear_tag: String::new(),
            path_prefix: PathBuf::new(),
            remove_files: false,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_non_linear_tag(mut self, non_linear_tag: impl Into<String>) -> Self {
        self.non_linear_tag = non_linear_tag.into();
        self
    }

    #[must_use]
    pub fn with_path_prefix(mut self, path_prefix: impl AsRef<Path>) -> Self {
        self.path_prefix = path_prefix.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_remove_files(mut self, remove_files: bool) -> Self {
        self.remove_files = remove_files;
        self
    }

    /// Same paths with `suffix` appended to the tag
    #[must_use]
    pub fn with_tag_suffix(&self, suffix: &str) -> Self {
        Self {
            tag: format!("{}{suffix}", self.tag),
            ..self.clone()
        }
    }

    /// Directory the search owns: `path_prefix/name/tag`
    pub fn output_path(&self) -> PathBuf {
        let mut path = self.path_prefix.join(&self.name);
        if !self.tag.is_empty() {
            path.push(&self.tag);
        }
        path
    }
}

/// Outcome of one fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub log_likelihood: f64,
    /// Best-fit instance of the fitted model
    pub instance: ModelInstance,
}

/// A likelihood bound to one observation
pub trait Analysis: Send + Sync + 'static {
    fn log_likelihood_function(&self, instance: &ModelInstance) -> Result<f64, FitError>;
}

/// A non-linear search that can be cloned into independent output namespaces
pub trait Search: Clone + Send + Sync + 'static {
    fn paths(&self) -> &Paths;

    /// Identical search writing under `paths`
    fn copy_with_paths(&self, paths: Paths) -> Self;

    fn fit<A: Analysis>(&self, model: &CollectionModel, analysis: &A) -> Result<FitResult, FitError>;
}
