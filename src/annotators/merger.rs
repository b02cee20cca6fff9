//! Consensus stage over entity layers.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{AnnotationKind, Post, DEFAULT_QUALIFIER};

/// Parameters of [`SimpleMerger`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergerParams {
    /// Qualifiers to promote, in priority order
    #[serde(default)]
    pub q: Vec<String>,
}

/// Promotes the entities of the listed qualifiers to the default qualifier.
///
/// Layers are visited in the given order, so the first layer wins where two
/// layers disagree on a span. Entities overlapping an already promoted one
/// are ignored.
#[derive(Debug, Clone, Default)]
pub struct SimpleMerger {
    qualifiers: Vec<String>,
}

impl SimpleMerger {
    pub fn new<I, S>(qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_params(params: MergerParams) -> Self {
        Self::new(params.q)
    }
}

impl super::Annotator for SimpleMerger {
    fn name(&self) -> String {
        format!("simple_merger({})", self.qualifiers.join(", "))
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        for qualifier in &self.qualifiers {
            let sources: Vec<_> = post
                .annotations_of(AnnotationKind::Entity, Some(qualifier.as_str()))
                .cloned()
                .collect();

            for source in &sources {
                match post.add_annotation(
                    AnnotationKind::Entity,
                    source.begin(),
                    source.end(),
                    DEFAULT_QUALIFIER,
                ) {
                    Ok(target) => {
                        if let (Some(t), Some(s)) = (target.as_entity_mut(), source.as_entity()) {
                            t.category = t.category.or(s.category);
                            if t.uri.is_none() {
                                t.uri.clone_from(&s.uri);
                            }
                        }
                    }
                    Err(e) => debug!(%qualifier, error = %e, "Ignoring entity"),
                }
            }
        }
        Ok(())
    }
}
