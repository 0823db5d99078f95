//! Pipeline orchestrator running inventory, resolution, hashing and rewriting in order.

use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::engine::HashingEngine;
use crate::error::{ErrorPolicy, PipelineResult};
use crate::gzip::GzipWriter;
use crate::inventory::build_inventory;
use crate::minifier::Minifier;
use crate::models::{HashedAsset, Inventory, PipelineReport};
use crate::resolver::resolve_duplicates;
use crate::rewriter::{ReferenceRewriter, ReplacementTable};

/// High-level helper that minifies, hashes and rewrites references for one configuration.
pub struct Pipeline<'a, M: Minifier + ?Sized> {
  config: &'a PipelineConfig,
  minifier: &'a M,
}

impl<'a, M: Minifier + ?Sized> Pipeline<'a, M> {
  /// Create a pipeline using `minifier` for every asset that is not already minified.
  pub fn new(config: &'a PipelineConfig, minifier: &'a M) -> Self {
    Self { config, minifier }
  }

  /// Run every stage. No source file is touched before all assets have been hashed.
  pub fn run(&self) -> PipelineResult<PipelineReport> {
    let config = self.config;
    let policy = ErrorPolicy::new(config.halt_on_error);

    let Inventory {
      resource_root,
      assets,
      sources,
    } = build_inventory(config, &policy)?;

    let resolved = resolve_duplicates(assets, &policy)?;

    let hashed = HashingEngine::new(self.minifier, &resource_root, &config.reference_prefix)
      .preserve_permissions(config.preserve_permissions)
      .preserve_mtime(config.preserve_mtime)
      .process(resolved.assets, &policy)?;

    let table = ReplacementTable::build(&hashed)?;
    tracing::debug!("Prepared {} place holders.", table.len());
    let rewritten_sources = if table.is_empty() {
      Vec::new()
    } else {
      ReferenceRewriter::new(&table, &hashed)
        .preserve_mtime(config.preserve_mtime)
        .rewrite(sources, &policy)?
    };

    let gzipped = if config.gzip {
      GzipWriter::new(config.preserve_permissions, config.preserve_mtime)
        .write_all(&hashed, &policy)?
    } else {
      Vec::new()
    };

    Ok(PipelineReport {
      assets: reference_map(&hashed),
      removed: resolved.removed,
      rewritten_sources,
      gzipped,
      skipped_errors: policy.skipped(),
    })
  }
}

fn reference_map(hashed: &[HashedAsset]) -> BTreeMap<String, String> {
  hashed
    .iter()
    .flat_map(|asset| {
      asset
        .record
        .reference_paths()
        .map(|reference| (reference.to_string(), asset.hashed_reference_path.clone()))
    })
    .collect()
}
