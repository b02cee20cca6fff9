//! Pipeline stages that annotate or rewrite posts.
//!
//! Every stage implements [`Annotator`]. Stages are composed with
//! [`Sequence`] (run one after another on the same posts) and [`Parallel`]
//! (run each stage on its own copy of the posts, then merge the copies back).

pub mod merger;
pub mod registry;
pub mod rewriters;

use std::fmt;

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use crate::domain::Post;

pub use merger::SimpleMerger;
pub use registry::AnnotatorRegistry;
pub use rewriters::{AnnotationRewriter, CleaningRewriter, SlangRewriter};

/// A pipeline stage operating on posts
pub trait Annotator: Send + Sync + fmt::Debug {
    /// Human-readable stage name
    fn name(&self) -> String;

    /// Annotate a single post in place
    fn annotate(&self, post: &mut Post) -> Result<()>;

    /// Annotate a batch of posts in place
    fn annotate_batch(&self, posts: &mut [Post]) -> Result<()> {
        for post in posts.iter_mut() {
            self.annotate(post)?;
        }
        Ok(())
    }
}

/// Stage that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct Nil;

impl Annotator for Nil {
    fn name(&self) -> String {
        "nil".to_string()
    }

    fn annotate(&self, _post: &mut Post) -> Result<()> {
        Ok(())
    }

    fn annotate_batch(&self, _posts: &mut [Post]) -> Result<()> {
        Ok(())
    }
}

fn joined_names(annotators: &[Box<dyn Annotator>]) -> String {
    annotators
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stages run in order on the same posts
#[derive(Debug)]
pub struct Sequence {
    annotators: Vec<Box<dyn Annotator>>,
}

impl Sequence {
    pub fn new(annotators: Vec<Box<dyn Annotator>>) -> Self {
        Self { annotators }
    }
}

impl Annotator for Sequence {
    fn name(&self) -> String {
        format!("sequence({})", joined_names(&self.annotators))
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        for annotator in &self.annotators {
            annotator.annotate(post)?;
        }
        Ok(())
    }

    fn annotate_batch(&self, posts: &mut [Post]) -> Result<()> {
        for annotator in &self.annotators {
            annotator.annotate_batch(posts)?;
        }
        Ok(())
    }
}

/// Stages run concurrently, each on its own copy of the posts.
///
/// The first stage works on the posts themselves; the others work on
/// clones that are merged back in stage order once every stage is done.
#[derive(Debug)]
pub struct Parallel {
    annotators: Vec<Box<dyn Annotator>>,
}

impl Parallel {
    pub fn new(annotators: Vec<Box<dyn Annotator>>) -> Self {
        Self { annotators }
    }
}

impl Annotator for Parallel {
    fn name(&self) -> String {
        format!("parallel({})", joined_names(&self.annotators))
    }

    fn annotate(&self, post: &mut Post) -> Result<()> {
        let Some((first, rest)) = self.annotators.split_first() else {
            return Ok(());
        };

        let mut copies: Vec<Post> = rest.iter().map(|_| post.clone()).collect();
        let (head, tail) = rayon::join(
            || first.annotate(post),
            || {
                rest.par_iter()
                    .zip(copies.par_iter_mut())
                    .try_for_each(|(annotator, copy)| annotator.annotate(copy))
            },
        );
        head?;
        tail?;

        for copy in &copies {
            let report = post.merge(copy);
            debug!(post = %post.id(), imported = report.imported, skipped = report.skipped, "Merged copy");
        }
        Ok(())
    }

    fn annotate_batch(&self, posts: &mut [Post]) -> Result<()> {
        let Some((first, rest)) = self.annotators.split_first() else {
            return Ok(());
        };

        let mut copies: Vec<Vec<Post>> = rest.iter().map(|_| posts.to_vec()).collect();
        let (head, tail) = rayon::join(
            || first.annotate_batch(posts),
            || {
                rest.par_iter()
                    .zip(copies.par_iter_mut())
                    .try_for_each(|(annotator, copy)| annotator.annotate_batch(copy))
            },
        );
        head?;
        tail?;

        for copy in &copies {
            for (post, annotated) in posts.iter_mut().zip(copy) {
                post.merge(annotated);
            }
        }
        Ok(())
    }
}

/// Compose stages sequentially, collapsing trivial cases
pub fn sequence(mut annotators: Vec<Box<dyn Annotator>>) -> Box<dyn Annotator> {
    match annotators.len() {
        0 => Box::new(Nil),
        1 => annotators.remove(0),
        _ => Box::new(Sequence::new(annotators)),
    }
}

/// Compose stages in parallel, collapsing trivial cases
pub fn parallel(mut annotators: Vec<Box<dyn Annotator>>) -> Box<dyn Annotator> {
    match annotators.len() {
        0 => Box::new(Nil),
        1 => annotators.remove(0),
        _ => Box::new(Parallel::new(annotators)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnotationKind;

    /// Adds an entity over a fixed range under its own qualifier
    #[derive(Debug)]
    struct FixedEntity {
        begin: usize,
        end: usize,
        qualifier: &'static str,
    }

    impl Annotator for FixedEntity {
        fn name(&self) -> String {
            format!("fixed({})", self.qualifier)
        }

        fn annotate(&self, post: &mut Post) -> Result<()> {
            post.add_annotation(AnnotationKind::Entity, self.begin, self.end, self.qualifier)?;
            Ok(())
        }
    }

    fn fixed(begin: usize, end: usize, qualifier: &'static str) -> Box<dyn Annotator> {
        Box::new(FixedEntity {
            begin,
            end,
            qualifier,
        })
    }

    #[test]
    fn test_trivial_compositions() {
        assert_eq!(sequence(vec![]).name(), "nil");
        assert_eq!(parallel(vec![fixed(0, 1, "a")]).name(), "fixed(a)");
        assert_eq!(
            sequence(vec![fixed(0, 1, "a"), fixed(0, 1, "b")]).name(),
            "sequence(fixed(a), fixed(b))"
        );
    }

    #[test]
    fn test_sequence_propagates_errors() {
        let stage = sequence(vec![fixed(0, 6, "ml"), fixed(2, 8, "ml")]);
        let mut post = Post::new("p").with_text("Barack Obama");
        assert!(stage.annotate(&mut post).is_err());
        assert_eq!(post.annotations().len(), 1);
    }

    #[test]
    fn test_parallel_merges_copies() {
        let stage = parallel(vec![fixed(0, 6, "a"), fixed(0, 12, "b"), fixed(7, 12, "c")]);
        let mut post = Post::new("p").with_text("Barack Obama");
        stage.annotate(&mut post).unwrap();

        let qualifiers: Vec<&str> = post.annotations().iter().map(|a| a.qualifier()).collect();
        assert_eq!(qualifiers, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parallel_batch_preserves_order() {
        let stage = parallel(vec![fixed(0, 2, "a"), fixed(0, 2, "b")]);
        let mut posts: Vec<Post> = (0..5)
            .map(|i| Post::new(format!("p{}", i)).with_text("ab cd"))
            .collect();
        stage.annotate_batch(&mut posts).unwrap();

        for (i, post) in posts.iter().enumerate() {
            assert_eq!(post.id(), format!("p{}", i));
            assert_eq!(post.annotations().len(), 2);
        }
    }
}
