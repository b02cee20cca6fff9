//! microneel - Tweet annotation and offset-preserving text rewriting
//!
//! Posts carry a text, typed annotations over character ranges of that
//! text, and optionally a rewrite of the text that can map any offset of
//! the rewritten form back to the original.
//!
//! # Architecture
//!
//! - Mentions, hashtags and short links are detected whenever a text is set
//! - Annotations never overlap unless the overlap rules allow it
//! - Rewrites are append-only lists of non-overlapping replacements
//! - Annotators are composed into pipelines defined in YAML
//!
//! # Modules
//!
//! - `annotators`: Annotator trait, combinators and built-in stages
//! - `core`: SpanIndex, TextRewrite, Pipeline, PostStore, BatchRunner
//! - `domain`: Data structures (Post, Annotation)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Annotate a file of posts with a pipeline
//! microneel annotate normalize --input tweets.jsonl --output out.jsonl
//!
//! # Validate a file of posts
//! microneel check --input tweets.jsonl
//! ```

pub mod annotators;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use annotators::{Annotator, AnnotatorRegistry};
pub use crate::core::{BatchRunner, Pipeline, PostStore, SpanIndex, TextRewrite};
pub use domain::{Annotation, AnnotationKind, Post};
