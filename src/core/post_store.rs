//! Newline-delimited JSON storage of posts.
//!
//! One post per line. Blank lines and lines starting with `#` are ignored.
//! For bootstrapping, a line may also be a bare numeric id or
//! `id<TAB>text`; such posts get the id `twitter:<id>`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::domain::{Post, TWITTER_PREFIX};

/// File-based post collection in JSONL format
pub struct PostStore {
    path: PathBuf,
}

impl PostStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every post, skipping (and logging) malformed lines
    pub async fn read(&self) -> Result<Vec<Post>> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open posts file: {}", self.path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.split(b'\n');
        let mut posts = Vec::new();
        let mut line_no = 0usize;

        while let Some(bytes) = lines
            .next_segment()
            .await
            .with_context(|| format!("Failed to read posts file: {}", self.path.display()))?
        {
            line_no += 1;
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping post line with invalid UTF-8");
                    continue;
                }
            };
            match parse_line(&line) {
                Ok(Some(post)) => posts.push(post),
                Ok(None) => {}
                Err(e) => warn!(line = line_no, error = %e, "Skipping malformed post line"),
            }
        }

        debug!(path = %self.path.display(), count = posts.len(), "Read posts");
        Ok(posts)
    }

    /// Replace the file content with `posts`, one compact JSON object per line
    pub async fn write(&self, posts: &[Post]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut content = String::new();
        for post in posts {
            let json = serde_json::to_string(post)
                .with_context(|| format!("Failed to serialize post {}", post.id()))?;
            content.push_str(&json);
            content.push('\n');
        }

        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write posts file: {}", self.path.display()))?;

        debug!(path = %self.path.display(), count = posts.len(), "Wrote posts");
        Ok(())
    }

    /// Append a single post
    pub async fn append(&self, post: &Post) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open posts file: {}", self.path.display()))?;

        let json = serde_json::to_string(post).context("Failed to serialize post")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write post")?;
        file.flush().await.context("Failed to flush post")?;

        Ok(())
    }

    /// Find the post with the given id
    pub async fn find(&self, id: &str) -> Result<Option<Post>> {
        let posts = self.read().await?;
        Ok(posts.into_iter().find(|p| p.id() == id))
    }
}

/// Read all posts from a JSONL file
pub async fn read_posts(path: &Path) -> Result<Vec<Post>> {
    PostStore::new(path).read().await
}

/// Write posts to a JSONL file, replacing its content
pub async fn write_posts(path: &Path, posts: &[Post]) -> Result<()> {
    PostStore::new(path).write(posts).await
}

/// Parse one line of a posts file.
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Post>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let json_error = match serde_json::from_str::<Post>(line) {
        Ok(post) => return Ok(Some(post)),
        Err(e) => e,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() > 2 {
        bail!("not a post: {} (JSON: {})", truncate(line), json_error);
    }
    let id: u64 = fields[0].trim().parse().with_context(|| {
        format!("not a post: {} (JSON: {})", truncate(line), json_error)
    })?;

    let mut post = Post::new(format!("{}{}", TWITTER_PREFIX, id));
    if let Some(text) = fields.get(1) {
        post.set_text(Some(text.to_string()));
    }
    Ok(Some(post))
}

fn truncate(line: &str) -> String {
    const MAX: usize = 80;
    match line.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &line[..i]),
        None => line.to_string(),
    }
}
