//! Pipeline configuration loaded from JSON and overridable from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::fileset::FileSet;

/// File name searched for in the working directory when no explicit config is given.
pub const DEFAULT_CONFIG_FILE: &str = "asset_hasher.config.json";

const DEFAULT_MINIFIER_TIMEOUT_SECS: u64 = 120;

/// Everything the pipeline needs to know about where assets live and how to treat them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Base directory of the asset (CSS/JS) file set.
  pub asset_dir: PathBuf,
  /// Glob patterns selecting assets below `asset_dir`.
  pub asset_includes: Vec<String>,
  /// Glob patterns removing assets from the selection.
  pub asset_excludes: Vec<String>,
  /// Base directory of the source files that reference assets.
  pub source_dir: PathBuf,
  /// Glob patterns selecting source files below `source_dir`.
  pub source_includes: Vec<String>,
  /// Glob patterns removing source files from the selection.
  pub source_excludes: Vec<String>,
  /// Directory, relative to `asset_dir`, that reference paths are computed from.
  pub resource_dir: PathBuf,
  /// Prefix prepended to every reference path, e.g. `/` for root-relative URLs.
  pub reference_prefix: String,
  /// Command prefix of the external minifier; input and `-o output` are appended.
  pub minifier: Vec<String>,
  /// Seconds to wait for the minifier before killing it; `0` waits forever.
  pub minifier_timeout_secs: u64,
  /// Abort on the first recoverable error instead of logging it.
  pub halt_on_error: bool,
  /// Re-apply the original permission bits to hashed files.
  pub preserve_permissions: bool,
  /// Carry modification times over to hashed files and rewritten sources.
  pub preserve_mtime: bool,
  /// Write a `.gz` sibling next to every hashed asset.
  pub gzip: bool,
  /// Optional path of a JSON manifest mapping reference paths to hashed reference paths.
  pub manifest: Option<PathBuf>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      asset_dir: PathBuf::from("build/www"),
      asset_includes: vec!["**/*.css".into(), "**/*.js".into()],
      asset_excludes: Vec::new(),
      source_dir: PathBuf::from("build"),
      source_includes: vec!["**/*.php".into(), "**/*.html".into()],
      source_excludes: Vec::new(),
      resource_dir: PathBuf::from("."),
      reference_prefix: String::new(),
      minifier: vec![
        "java".into(),
        "-jar".into(),
        "yuicompressor.jar".into(),
      ],
      minifier_timeout_secs: DEFAULT_MINIFIER_TIMEOUT_SECS,
      halt_on_error: true,
      preserve_permissions: true,
      preserve_mtime: false,
      gzip: false,
      manifest: None,
    }
  }
}

impl PipelineConfig {
  /// Load the default configuration file from `dir`, falling back to defaults when it is absent.
  pub fn discover(dir: &Path) -> Result<Self> {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.is_file() {
      return Ok(Self::default());
    }
    Self::from_path(&candidate)
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
  }

  /// File set describing the assets to hash.
  pub fn asset_set(&self) -> FileSet {
    FileSet::new(&self.asset_dir)
      .include(self.asset_includes.iter())
      .exclude(self.asset_excludes.iter())
  }

  /// File set describing the sources to rewrite.
  pub fn source_set(&self) -> FileSet {
    FileSet::new(&self.source_dir)
      .include(self.source_includes.iter())
      .exclude(self.source_excludes.iter())
  }

  /// Minifier timeout, `None` when waiting is unbounded.
  pub fn minifier_timeout(&self) -> Option<Duration> {
    (self.minifier_timeout_secs > 0).then(|| Duration::from_secs(self.minifier_timeout_secs))
  }
}
