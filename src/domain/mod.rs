//! Domain types for microneel.
//!
//! This module contains the core data structures:
//! - Annotation: Typed spans (mentions, hashtags, URLs, entities)
//! - Post: A tweet with its annotations and optional rewrite

pub mod annotation;
pub mod post;

// Re-export commonly used types
pub use annotation::{
    Annotation, AnnotationBody, AnnotationId, AnnotationKind, AnnotationRecord, Category, Entity,
    Hashtag, Mention, Url, DEFAULT_QUALIFIER,
};
pub use post::{Author, MergeReport, Post, PostError, PostRecord, TWITTER_PREFIX};
