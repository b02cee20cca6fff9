//! Registry mapping stage type tags to factories.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::pipeline::{StageConfig, NIL, PARALLEL, SEQUENCE};

use super::merger::{MergerParams, SimpleMerger};
use super::rewriters::{AnnotationRewriter, CleaningRewriter, SlangParams, SlangRewriter};
use super::{parallel, sequence, Annotator, Nil};

/// Builds a stage from its configuration; the path is the directory
/// relative resources are resolved against.
pub type StageFactory =
    Box<dyn Fn(&StageConfig, &Path) -> Result<Box<dyn Annotator>> + Send + Sync>;

/// Stage factories by (lowercase) type tag.
///
/// `nil`, `sequence` and `parallel` are handled by the registry itself.
pub struct AnnotatorRegistry {
    factories: HashMap<String, StageFactory>,
}

impl AnnotatorRegistry {
    /// Registry without any leaf stage
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in stage
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("annotation_rewriter", |_, _| Ok(Box::new(AnnotationRewriter)));
        registry.register("cleaning_rewriter", |_, _| Ok(Box::new(CleaningRewriter)));
        registry.register("slang_rewriter", |stage, base_dir| {
            let params: SlangParams = stage.params()?;
            Ok(Box::new(SlangRewriter::from_params(params, base_dir)?))
        });
        registry.register("simple_merger", |stage, _| {
            let params: MergerParams = stage.params()?;
            Ok(Box::new(SimpleMerger::from_params(params)))
        });
        registry
    }

    /// Register (or replace) the factory for `tag`
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn(&StageConfig, &Path) -> Result<Box<dyn Annotator>> + Send + Sync + 'static,
    {
        self.factories
            .insert(tag.trim().to_lowercase(), Box::new(factory));
    }

    /// Whether `tag` names a known stage type
    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        matches!(tag.as_str(), NIL | SEQUENCE | PARALLEL) || self.factories.contains_key(&tag)
    }

    /// All known tags, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = [NIL, SEQUENCE, PARALLEL]
            .iter()
            .map(|t| t.to_string())
            .chain(self.factories.keys().cloned())
            .collect();
        tags.sort();
        tags
    }

    /// Instantiate the stage tree rooted at `stage`
    pub fn build(&self, stage: &StageConfig, base_dir: &Path) -> Result<Box<dyn Annotator>> {
        let tag = stage.tag();
        match tag.as_str() {
            NIL => Ok(Box::new(Nil)),
            SEQUENCE | PARALLEL => {
                let children = stage
                    .annotators
                    .iter()
                    .map(|child| self.build(child, base_dir))
                    .collect::<Result<Vec<_>>>()?;
                Ok(if tag == SEQUENCE {
                    sequence(children)
                } else {
                    parallel(children)
                })
            }
            _ => {
                let factory = self
                    .factories
                    .get(&tag)
                    .with_context(|| format!("Unknown annotator type '{}'", stage.kind))?;
                factory(stage, base_dir)
                    .with_context(|| format!("Failed to create annotator '{}'", stage.kind))
            }
        }
    }
}

impl Default for AnnotatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for AnnotatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatorRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
