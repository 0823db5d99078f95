//! Records passed between the pipeline stages.
//!
//! Each stage consumes the previous stage's records by value and returns a new collection, so
//! the boundaries between inventory, resolution, hashing and rewriting can be tested in isolation.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

/// One discovered CSS/JS asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
  /// Path as enumerated by the asset file set.
  pub original_relative_name: String,
  /// Canonical path on disk, unique per record.
  pub original_absolute_path: PathBuf,
  /// Scratch file receiving minified output.
  pub working_temp_path: PathBuf,
  /// How source files refer to this asset.
  pub reference_path: String,
  /// Permission bits captured before any mutation.
  pub permission_bits: u32,
  /// Set when the filename already carries a minified-name marker.
  pub is_pre_minified: bool,
  /// Reference path of the unminified counterpart of a pre-minified asset.
  pub alternate_reference_path: Option<String>,
}

impl AssetRecord {
  /// Every reference string that should resolve to this asset's hashed name.
  pub fn reference_paths(&self) -> impl Iterator<Item = &str> {
    std::iter::once(self.reference_path.as_str()).chain(self.alternate_reference_path.as_deref())
  }
}

/// An asset after minification, hashing and renaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedAsset {
  /// The record the hashed file was produced from.
  pub record: AssetRecord,
  /// Hex digest of the final bytes.
  pub content_hash: String,
  /// Final location on disk.
  pub hashed_absolute_path: PathBuf,
  /// Final reference string embedded in source files.
  pub hashed_reference_path: String,
}

/// A file whose asset references may need rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRecord {
  /// Location of the source file.
  pub absolute_path: PathBuf,
  content: Option<Vec<u8>>,
}

impl SourceFileRecord {
  /// Create a record; content is read on first access.
  pub fn new(absolute_path: impl Into<PathBuf>) -> Self {
    Self {
      absolute_path: absolute_path.into(),
      content: None,
    }
  }

  /// Load (once) and return the raw bytes of the file.
  pub fn content(&mut self) -> PipelineResult<&[u8]> {
    if self.content.is_none() {
      let bytes = fs::read(&self.absolute_path)
        .map_err(|err| PipelineError::io("unable to read file", &self.absolute_path, err))?;
      self.content = Some(bytes);
    }
    Ok(self.content.as_deref().unwrap_or_default())
  }
}

/// Output of the inventory stage.
#[derive(Debug, Clone)]
pub struct Inventory {
  /// Canonical resource root all reference paths are relative to.
  pub resource_root: PathBuf,
  /// Assets keyed by canonical path.
  pub assets: BTreeMap<PathBuf, AssetRecord>,
  /// Source files in enumeration order.
  pub sources: Vec<SourceFileRecord>,
}

/// Output of the duplicate/alternate resolver.
#[derive(Debug, Clone)]
pub struct ResolvedAssets {
  /// Surviving assets in processing order.
  pub assets: Vec<AssetRecord>,
  /// Unminified duplicates deleted from disk.
  pub removed: Vec<PathBuf>,
}

/// Serialisable summary of the run, written as the optional manifest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
  /// Reference path (original or alternate) to hashed reference path.
  pub assets: BTreeMap<String, String>,
  /// Unminified duplicates that were deleted.
  pub removed: Vec<PathBuf>,
  /// Source files rewritten in place.
  pub rewritten_sources: Vec<PathBuf>,
  /// Gzip siblings written next to hashed assets.
  pub gzipped: Vec<PathBuf>,
  /// Number of errors logged and skipped because halt-on-error was disabled.
  pub skipped_errors: usize,
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn reference_paths_include_the_alternate() {
    let record = AssetRecord {
      original_relative_name: "app-min.js".into(),
      original_absolute_path: "/www/app-min.js".into(),
      working_temp_path: "/www/app-min.js.tmp".into(),
      reference_path: "app-min.js".into(),
      permission_bits: 0o644,
      is_pre_minified: true,
      alternate_reference_path: Some("app.js".into()),
    };
    let references: Vec<&str> = record.reference_paths().collect();
    assert_eq!(references, vec!["app-min.js", "app.js"]);
  }

  #[test]
  fn source_content_is_loaded_lazily() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("index.html");
    let mut record = SourceFileRecord::new(&path);

    fs::write(&path, "<script src='app.js'>").unwrap();
    assert_eq!(record.content().unwrap(), b"<script src='app.js'>");

    fs::write(&path, "changed").unwrap();
    assert_eq!(record.content().unwrap(), b"<script src='app.js'>");
  }
}
