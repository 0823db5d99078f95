//! Command line entry point: minify, hash and rewrite references for one build directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use asset_hasher::{CommandMinifier, Pipeline, PipelineConfig, PipelineReport};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  name = "asset-hasher",
  version,
  about = "Minify CSS/JS assets, rename them by content hash and rewrite their references"
)]
struct Cli {
  /// JSON configuration file (defaults to asset_hasher.config.json when present)
  #[arg(long, value_name = "PATH")]
  config: Option<PathBuf>,

  /// Base directory of the asset file set
  #[arg(long, value_name = "DIR")]
  asset_dir: Option<PathBuf>,

  /// Include pattern for assets (repeatable)
  #[arg(long = "include", value_name = "GLOB")]
  asset_includes: Vec<String>,

  /// Base directory of the source file set
  #[arg(long, value_name = "DIR")]
  source_dir: Option<PathBuf>,

  /// Include pattern for sources (repeatable)
  #[arg(long = "source-include", value_name = "GLOB")]
  source_includes: Vec<String>,

  /// Directory, relative to the asset dir, that reference paths are computed from
  #[arg(long, value_name = "DIR")]
  resource_dir: Option<PathBuf>,

  /// Prefix prepended to every reference path
  #[arg(long, value_name = "PREFIX")]
  reference_prefix: Option<String>,

  /// Minifier command prefix (repeat for each word, e.g. --minifier java --minifier -jar ...)
  #[arg(long = "minifier", value_name = "WORD", allow_hyphen_values = true)]
  minifier: Vec<String>,

  /// Seconds to wait for the minifier before killing it (0 disables the limit)
  #[arg(long, value_name = "SECS")]
  timeout: Option<u64>,

  /// Log errors and continue instead of stopping the build
  #[arg(long)]
  no_halt_on_error: bool,

  /// Do not copy permission bits onto hashed files
  #[arg(long)]
  no_preserve_permissions: bool,

  /// Carry modification times over to hashed files and rewritten sources
  #[arg(long)]
  preserve_mtime: bool,

  /// Write .gz siblings next to hashed assets
  #[arg(long)]
  gzip: bool,

  /// Write a JSON manifest of reference paths to hashed reference paths
  #[arg(long, value_name = "PATH")]
  manifest: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn load_config(&self) -> Result<PipelineConfig> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::from_path(path)?,
      None => PipelineConfig::discover(Path::new("."))?,
    };

    if let Some(dir) = &self.asset_dir {
      config.asset_dir = dir.clone();
    }
    if !self.asset_includes.is_empty() {
      config.asset_includes = self.asset_includes.clone();
    }
    if let Some(dir) = &self.source_dir {
      config.source_dir = dir.clone();
    }
    if !self.source_includes.is_empty() {
      config.source_includes = self.source_includes.clone();
    }
    if let Some(dir) = &self.resource_dir {
      config.resource_dir = dir.clone();
    }
    if let Some(prefix) = &self.reference_prefix {
      config.reference_prefix = prefix.clone();
    }
    if !self.minifier.is_empty() {
      config.minifier = self.minifier.clone();
    }
    if let Some(timeout) = self.timeout {
      config.minifier_timeout_secs = timeout;
    }
    if self.no_halt_on_error {
      config.halt_on_error = false;
    }
    if self.no_preserve_permissions {
      config.preserve_permissions = false;
    }
    if self.preserve_mtime {
      config.preserve_mtime = true;
    }
    if self.gzip {
      config.gzip = true;
    }
    if let Some(manifest) = &self.manifest {
      config.manifest = Some(manifest.clone());
    }
    Ok(config)
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
    )
    .with_target(false)
    .init();

  let config = cli.load_config()?;
  let minifier = CommandMinifier::new(&config.minifier, config.minifier_timeout())?;
  let report = Pipeline::new(&config, &minifier).run()?;

  tracing::info!(
    "Hashed {} asset references, rewrote {} source files.",
    report.assets.len(),
    report.rewritten_sources.len()
  );
  if report.skipped_errors > 0 {
    tracing::warn!("{} errors were skipped.", report.skipped_errors);
  }

  if let Some(path) = &config.manifest {
    write_manifest(path, &report)?;
  }
  Ok(())
}

fn write_manifest(path: &Path, report: &PipelineReport) -> Result<()> {
  let json = serde_json::to_string_pretty(report).context("failed to serialise manifest")?;
  fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
