//! Configuration for microneel paths and workers.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MICRONEEL_HOME, MICRONEEL_PIPELINES, MICRONEEL_WORKERS)
//! 2. Config file (.microneel/config.yaml)
//! 3. Defaults (~/.microneel)
//!
//! Config file discovery:
//! - Searches current directory and parents for .microneel/config.yaml
//! - Paths in config file are relative to the .microneel/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".microneel";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub runner: Option<RunnerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .microneel/)
    pub home: Option<String>,
    /// Pipeline definitions directory (relative to .microneel/)
    pub pipelines: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub workers: Option<usize>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to microneel home
    pub home: PathBuf,
    /// Directory searched for `<name>.yaml` pipeline definitions
    pub pipelines: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Concurrent annotation workers
    pub workers: usize,
}

impl ResolvedConfig {
    /// Resolve a pipeline reference: an existing file path, or a name looked
    /// up as `<pipelines>/<name>.yaml`
    pub fn pipeline_path(&self, name: &str) -> PathBuf {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return direct;
        }
        self.pipelines.join(format!("{}.yaml", name))
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_workers() -> Result<Option<usize>> {
    match std::env::var("MICRONEEL_WORKERS") {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid MICRONEEL_WORKERS: {}", value)),
        Err(_) => Ok(None),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = if let Ok(env_home) = std::env::var("MICRONEEL_HOME") {
        PathBuf::from(env_home)
    } else if let Some(home) = file.as_ref().and_then(|f| f.paths.home.as_deref()) {
        resolve_path(config_dir, home)
    } else {
        default_home
    };

    let pipelines = if let Ok(env_pipelines) = std::env::var("MICRONEEL_PIPELINES") {
        PathBuf::from(env_pipelines)
    } else if let Some(dir) = file.as_ref().and_then(|f| f.paths.pipelines.as_deref()) {
        resolve_path(config_dir, dir)
    } else {
        home.join("pipelines")
    };

    let workers = env_workers()?
        .or_else(|| file.as_ref().and_then(|f| f.runner.as_ref()?.workers))
        .unwrap_or_else(default_workers)
        .max(1);

    Ok(ResolvedConfig {
        home,
        pipelines,
        config_file,
        workers,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
