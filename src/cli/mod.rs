//! Command-line interface for microneel.
//!
//! Provides commands for running annotation pipelines over post files,
//! checking post files and inspecting single posts.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::annotators::AnnotatorRegistry;
use crate::config;
use crate::core::{read_posts, write_posts, BatchRunner, Pipeline, PostStore};
use crate::domain::Post;

/// microneel - Tweet annotation and offset-preserving rewriting
#[derive(Parser, Debug)]
#[command(name = "microneel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate a file of posts with a pipeline
    Annotate {
        /// Pipeline name (looks for <pipelines>/<name>.yaml) or path to a pipeline file
        pipeline: String,

        /// Input posts file (JSONL, or TSV of id and text)
        #[arg(short, long)]
        input: PathBuf,

        /// Output posts file (writes JSONL to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent workers (overrides configuration)
        #[arg(short, long, env = "MICRONEEL_WORKERS")]
        workers: Option<usize>,
    },

    /// Validate a posts file and summarize its annotations
    Check {
        /// Posts file to check
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show a single post with its annotations and rewriting
    Show {
        /// Posts file to search
        #[arg(short, long)]
        input: PathBuf,

        /// Post ID (a bare number is read as twitter:<number>)
        #[arg(long)]
        id: String,

        /// Print the post as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Annotate {
                pipeline,
                input,
                output,
                workers,
            } => annotate(&pipeline, &input, output.as_deref(), workers).await,
            Commands::Check { input } => check(&input).await,
            Commands::Show { input, id, json } => show_post(&input, &id, json).await,
            Commands::Config => show_config(),
        }
    }
}

/// Run a pipeline over a posts file
async fn annotate(
    pipeline_name: &str,
    input: &Path,
    output: Option<&Path>,
    workers: Option<usize>,
) -> Result<()> {
    let registry = AnnotatorRegistry::default();
    let pipeline = load_pipeline(pipeline_name, &registry)?;
    let annotator = pipeline.build(&registry)?;

    let posts = read_posts(input).await?;
    if posts.is_empty() {
        anyhow::bail!("No posts found in {}", input.display());
    }

    let workers = match workers {
        Some(n) => n,
        None => config::config()?.workers,
    };
    let runner = BatchRunner::new(annotator)
        .with_workers(workers)
        .with_chunk_size(pipeline.chunk_size);
    let (posts, report) = runner.run(posts).await?;

    match output {
        Some(path) => {
            write_posts(path, &posts).await?;
            eprintln!(
                "[Annotated {} posts with '{}' in {}ms -> {}]",
                report.posts,
                pipeline.name,
                report.duration_ms,
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for post in &posts {
                let json = serde_json::to_string(post)
                    .with_context(|| format!("Failed to serialize post {}", post.id()))?;
                writeln!(out, "{}", json).context("Failed to write to stdout")?;
            }
        }
    }

    Ok(())
}

/// Load a pipeline by name or path
fn load_pipeline(name: &str, registry: &AnnotatorRegistry) -> Result<Pipeline> {
    let pipeline_path = config::config()?.pipeline_path(name);

    if !pipeline_path.exists() {
        // Try the local pipelines/ directory
        let alt_path = PathBuf::from("pipelines").join(format!("{}.yaml", name));
        if alt_path.exists() {
            let pipeline = Pipeline::from_file(&alt_path)?;
            pipeline.validate(registry)?;
            return Ok(pipeline);
        }

        anyhow::bail!(
            "Pipeline '{}' not found. Looked for:\n  - {}\n  - {}",
            name,
            pipeline_path.display(),
            alt_path.display()
        );
    }

    let pipeline = Pipeline::from_file(&pipeline_path)?;
    pipeline.validate(registry)?;
    Ok(pipeline)
}

/// Summarize a posts file
async fn check(input: &Path) -> Result<()> {
    let posts = read_posts(input).await?;

    if posts.is_empty() {
        println!("No posts found");
        return Ok(());
    }

    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut without_text = 0;
    let mut rewritten = 0;

    println!("{:<28} {:>6} {:>12} {:<8}", "POST ID", "CHARS", "ANNOTATIONS", "REWRITE");
    println!("{}", "-".repeat(58));

    for post in &posts {
        for annotation in post.annotations() {
            *by_kind.entry(annotation.kind().to_string()).or_default() += 1;
        }
        if post.text().is_none() {
            without_text += 1;
        }
        if post.rewrite().is_some() {
            rewritten += 1;
        }

        println!(
            "{:<28} {:>6} {:>12} {:<8}",
            post.id(),
            post.spans().text_len(),
            post.annotations().len(),
            if post.rewrite().is_some() { "yes" } else { "-" }
        );
    }

    println!("\nTotal: {} posts", posts.len());
    println!("  Without text: {}", without_text);
    println!("  Rewritten:    {}", rewritten);
    for (kind, count) in &by_kind {
        println!("  {:<13} {}", format!("{}:", kind), count);
    }

    Ok(())
}

/// Show one post
async fn show_post(input: &Path, id: &str, json: bool) -> Result<()> {
    let id = if id.chars().all(|c| c.is_ascii_digit()) {
        format!("{}{}", crate::domain::TWITTER_PREFIX, id)
    } else {
        id.to_string()
    };

    let post = PostStore::new(input)
        .find(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found: {}", id))?;

    if json {
        let pretty = serde_json::to_string_pretty(&post).context("Failed to serialize post")?;
        println!("{}", pretty);
        return Ok(());
    }

    print_post(&post);
    Ok(())
}

fn print_post(post: &Post) {
    println!("ID: {}", post.id());
    if let Some(date) = post.date {
        println!("Date: {}", date);
    }
    if let Some(lang) = &post.lang {
        println!("Lang: {}", lang);
    }
    if let Some(username) = &post.author.username {
        println!("Author: @{}", username);
    }
    println!("Text: {}", post.text().unwrap_or("(none)"));

    println!("\nAnnotations:");
    if post.annotations().is_empty() {
        println!("  (none)");
    }
    for annotation in post.annotations() {
        println!(
            "  [{:>3}, {:>3}) {:<8} {:<10} {:?}",
            annotation.begin(),
            annotation.end(),
            annotation.kind().to_string(),
            annotation.qualifier(),
            annotation.text()
        );
    }

    let Some(rewrite) = post.rewrite() else {
        return;
    };

    println!("\nRewritten: {}", rewrite.rewritten());
    for segment in rewrite.replacements() {
        let original: String = rewrite
            .original()
            .chars()
            .skip(segment.original.start)
            .take(segment.original.len())
            .collect();
        let replaced: String = rewrite
            .rewritten()
            .chars()
            .skip(segment.rewritten.start)
            .take(segment.rewritten.len())
            .collect();
        println!(
            "  {:>3} {:?} -> {:>3} {:?}",
            segment.original.start, original, segment.rewritten.start, replaced
        );
    }
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("microneel configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", cfg.home.display());
    println!("  Pipelines: {}", cfg.pipelines.display());
    println!();
    println!("Runner:");
    println!("  Workers: {}", cfg.workers);
    println!();
    println!("Annotator types:");
    for tag in AnnotatorRegistry::default().tags() {
        println!("  {}", tag);
    }

    Ok(())
}
