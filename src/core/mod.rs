//! Core text machinery.
//!
//! This module contains:
//! - SpanIndex: Ordered, overlap-checked annotation spans with auto-detection
//! - TextRewrite: Offset-preserving text rewriting
//! - Pipeline: Annotator pipeline definitions and loading
//! - PostStore: JSON-lines persistence for posts
//! - BatchRunner: Concurrent annotation of post batches

pub mod offsets;
pub mod pipeline;
pub mod post_store;
pub mod rewrite;
pub mod runner;
pub mod span_index;

// Re-export commonly used types
pub use pipeline::{Pipeline, StageConfig};
pub use post_store::{parse_line, read_posts, write_posts, PostStore};
pub use rewrite::{
    MappedOffset, MappingStatus, ReplacementRecord, RewriteError, RewriteRecord, Segment,
    SegmentKind, TextRewrite,
};
pub use runner::{BatchRunner, RunReport};
pub use span_index::{SpanError, SpanIndex};
