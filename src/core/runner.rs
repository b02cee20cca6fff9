//! Batch execution of an annotator over a collection of posts.
//!
//! Posts are split into chunks; each chunk is moved to a blocking worker,
//! annotated there and moved back, so a post is only ever reachable from
//! one worker. Results keep the input order.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::annotators::Annotator;
use crate::domain::Post;

/// Summary of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Posts annotated
    pub posts: usize,
    /// Chunks dispatched to workers
    pub chunks: usize,
    /// Wall-clock time in milliseconds
    pub duration_ms: u64,
}

/// Runs an annotator over batches of posts on tokio blocking workers
pub struct BatchRunner {
    annotator: Arc<dyn Annotator>,
    workers: usize,
    chunk_size: usize,
}

impl BatchRunner {
    pub fn new(annotator: Box<dyn Annotator>) -> Self {
        Self {
            annotator: Arc::from(annotator),
            workers: 1,
            chunk_size: 100,
        }
    }

    /// Maximum number of chunks annotated concurrently
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Number of posts per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Annotate `posts`, returning them in input order
    #[instrument(skip(self, posts), fields(annotator = %self.annotator.name()))]
    pub async fn run(&self, posts: Vec<Post>) -> Result<(Vec<Post>, RunReport)> {
        let start = Instant::now();
        let total = posts.len();
        info!(posts = total, workers = self.workers, "Starting annotation");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();
        let mut remaining = posts.into_iter();

        loop {
            let mut chunk: Vec<Post> = remaining.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .context("Worker pool closed")?;
            let annotator = Arc::clone(&self.annotator);
            let index = handles.len();

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                debug!(chunk = index, size = chunk.len(), "Annotating chunk");
                annotator
                    .annotate_batch(&mut chunk)
                    .with_context(|| format!("Failed to annotate chunk {}", index))?;
                Ok::<_, anyhow::Error>(chunk)
            }));
        }

        let chunks = handles.len();
        let mut annotated = Vec::with_capacity(total);
        for handle in handles {
            let chunk = handle.await.context("Annotation worker panicked")??;
            annotated.extend(chunk);
        }

        let report = RunReport {
            posts: annotated.len(),
            chunks,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            posts = report.posts,
            chunks = report.chunks,
            duration_ms = report.duration_ms,
            "Annotation completed"
        );

        Ok((annotated, report))
    }
}
