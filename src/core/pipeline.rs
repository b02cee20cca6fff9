//! Pipeline definitions and loading.
//!
//! Pipelines are defined in YAML as a tree of annotator stages. Each stage
//! names its type with a `type` tag; composite stages (`sequence`,
//! `parallel`) list their children under `annotators`, and every other key
//! is passed to the stage factory as a parameter.
//!
//! ```yaml
//! name: normalize
//! description: Clean and rewrite tweets
//! annotator:
//!   type: sequence
//!   annotators:
//!     - type: cleaning_rewriter
//!     - type: slang_rewriter
//!       replacements: { cmq: comunque }
//!     - type: annotation_rewriter
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotators::{Annotator, AnnotatorRegistry};

/// Tag of the stage that does nothing
pub const NIL: &str = "nil";
/// Tag of the composite running children in order
pub const SEQUENCE: &str = "sequence";
/// Tag of the composite running children on independent copies
pub const PARALLEL: &str = "parallel";

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (used in CLI)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Posts handed to a worker at a time
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Root stage
    pub annotator: StageConfig,

    /// Directory used to resolve relative resource paths
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_chunk_size() -> usize {
    100
}

impl Pipeline {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        let mut pipeline = Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline file: {}", path.display()))?;
        pipeline.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(pipeline)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition against the known stage types
    pub fn validate(&self, registry: &AnnotatorRegistry) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("Pipeline chunk_size must be positive");
        }

        self.annotator.validate(registry, "annotator")
    }

    /// Instantiate the stage tree
    pub fn build(&self, registry: &AnnotatorRegistry) -> Result<Box<dyn Annotator>> {
        registry
            .build(&self.annotator, &self.base_dir)
            .with_context(|| format!("Failed to build pipeline '{}'", self.name))
    }
}

/// One stage of the annotator tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage type tag (case-insensitive)
    #[serde(rename = "type")]
    pub kind: String,

    /// Children of composite stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotators: Vec<StageConfig>,

    /// Stage-specific parameters
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_yaml::Value>,
}

impl StageConfig {
    /// Leaf stage without parameters
    pub fn leaf(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            annotators: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    /// Composite stage over `children`
    pub fn composite(kind: impl Into<String>, children: Vec<StageConfig>) -> Self {
        Self {
            annotators: children,
            ..Self::leaf(kind)
        }
    }

    /// Normalized type tag
    pub fn tag(&self) -> String {
        self.kind.trim().to_lowercase()
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.tag().as_str(), SEQUENCE | PARALLEL)
    }

    /// Decode the stage parameters into `T`
    pub fn params<T: DeserializeOwned>(&self) -> Result<T> {
        let mapping: serde_yaml::Mapping = self
            .params
            .iter()
            .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.clone()))
            .collect();
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
            .with_context(|| format!("Invalid parameters for stage '{}'", self.kind))
    }

    fn validate(&self, registry: &AnnotatorRegistry, path: &str) -> Result<()> {
        let tag = self.tag();
        if tag.is_empty() {
            anyhow::bail!("Stage {} has an empty type", path);
        }

        if self.is_composite() {
            if self.annotators.is_empty() {
                anyhow::bail!("Composite stage {} ({}) has no annotators", path, tag);
            }
            for (i, child) in self.annotators.iter().enumerate() {
                child.validate(registry, &format!("{}.annotators[{}]", path, i))?;
            }
            return Ok(());
        }

        if !self.annotators.is_empty() {
            anyhow::bail!("Stage {} ({}) cannot have child annotators", path, tag);
        }
        if !registry.contains(&tag) {
            anyhow::bail!(
                "Stage {} has unknown type '{}' (known: {})",
                path,
                self.kind,
                registry.tags().join(", ")
            );
        }
        Ok(())
    }
}
