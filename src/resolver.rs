//! Duplicate/alternate resolution between minified and unminified assets.
//!
//! A project may ship both `jquery.js` and `jquery-min.js`. Only the minified file is kept: the
//! unminified one is deleted before hashing starts, and references to either name end up pointing
//! at the single hashed output.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use crate::error::{ErrorPolicy, PipelineError, PipelineResult};
use crate::models::{AssetRecord, ResolvedAssets};
use crate::naming::{parse_minified, strip_marker_from_reference};

/// Classify pre-minified assets and delete their unminified duplicates from disk.
///
/// Fails with [`PipelineError::DuplicateAsset`] when both `name-min.ext` and `name.min.ext` are
/// present, since there is no way to tell which one is current.
pub fn resolve_duplicates(
  assets: BTreeMap<PathBuf, AssetRecord>,
  policy: &ErrorPolicy,
) -> PipelineResult<ResolvedAssets> {
  let mut duplicates = BTreeSet::new();

  for path in assets.keys() {
    let Some(name) = parse_minified(path) else {
      continue;
    };

    let competing = name.alternate_spelling();
    if assets.contains_key(&competing) {
      return Err(PipelineError::DuplicateAsset {
        first: path.clone(),
        second: competing,
      });
    }

    if assets.contains_key(&name.unminified) {
      duplicates.insert(name.unminified);
    }
  }

  let mut removed = Vec::new();
  let mut survivors = Vec::with_capacity(assets.len() - duplicates.len());
  for (path, mut record) in assets {
    if duplicates.contains(&path) {
      match fs::remove_file(&path) {
        Ok(()) => {
          tracing::info!("Removed '{}'.", path.display());
          removed.push(path);
        }
        Err(err) => policy.handle(PipelineError::io("unable to remove file", &path, err))?,
      }
      continue;
    }

    if parse_minified(&path).is_some() {
      record.is_pre_minified = true;
      record.alternate_reference_path = Some(strip_marker_from_reference(&record.reference_path));
    }
    survivors.push(record);
  }

  Ok(ResolvedAssets {
    assets: survivors,
    removed,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use tempfile::tempdir;

  fn record(root: &Path, name: &str) -> (PathBuf, AssetRecord) {
    let path = root.join(name);
    fs::write(&path, name).unwrap();
    let record = AssetRecord {
      original_relative_name: name.to_string(),
      original_absolute_path: path.clone(),
      working_temp_path: root.join(format!("{name}.tmp")),
      reference_path: name.to_string(),
      permission_bits: 0o644,
      is_pre_minified: false,
      alternate_reference_path: None,
    };
    (path, record)
  }

  #[test]
  fn removes_unminified_duplicate() {
    let temp = tempdir().unwrap();
    let assets: BTreeMap<_, _> = ["app.js", "app-min.js", "other.js"]
      .into_iter()
      .map(|name| record(temp.path(), name))
      .collect();

    let resolved = resolve_duplicates(assets, &ErrorPolicy::default()).unwrap();

    assert_eq!(resolved.removed, vec![temp.path().join("app.js")]);
    assert!(!temp.path().join("app.js").exists());
    assert_eq!(resolved.assets.len(), 2);

    let minified = resolved
      .assets
      .iter()
      .find(|record| record.reference_path == "app-min.js")
      .unwrap();
    assert!(minified.is_pre_minified);
    assert_eq!(minified.alternate_reference_path.as_deref(), Some("app.js"));

    let other = resolved
      .assets
      .iter()
      .find(|record| record.reference_path == "other.js")
      .unwrap();
    assert!(!other.is_pre_minified);
    assert!(other.alternate_reference_path.is_none());
  }

  #[test]
  fn removes_unminified_duplicate_of_dot_min_file() {
    let temp = tempdir().unwrap();
    let assets: BTreeMap<_, _> = ["x.js", "x.min.js"]
      .into_iter()
      .map(|name| record(temp.path(), name))
      .collect();

    let resolved = resolve_duplicates(assets, &ErrorPolicy::default()).unwrap();

    assert_eq!(resolved.removed, vec![temp.path().join("x.js")]);
    assert!(!temp.path().join("x.js").exists());
    assert!(temp.path().join("x.min.js").exists());
    assert_eq!(resolved.assets.len(), 1);
    assert_eq!(resolved.assets[0].reference_path, "x.min.js");
    assert!(resolved.assets[0].is_pre_minified);
    assert_eq!(
      resolved.assets[0].alternate_reference_path.as_deref(),
      Some("x.js")
    );
  }

  #[test]
  fn minified_without_sibling_still_gets_alternate() {
    let temp = tempdir().unwrap();
    let assets: BTreeMap<_, _> = [record(temp.path(), "jquery.min.js")].into_iter().collect();

    let resolved = resolve_duplicates(assets, &ErrorPolicy::default()).unwrap();

    assert!(resolved.removed.is_empty());
    assert_eq!(
      resolved.assets[0].alternate_reference_path.as_deref(),
      Some("jquery.js")
    );
  }

  #[test]
  fn both_minified_spellings_are_ambiguous() {
    let temp = tempdir().unwrap();
    let assets: BTreeMap<_, _> = ["lib.js", "lib-min.js", "lib.min.js"]
      .into_iter()
      .map(|name| record(temp.path(), name))
      .collect();

    let error = resolve_duplicates(assets, &ErrorPolicy::new(false)).unwrap_err();

    assert!(matches!(error, PipelineError::DuplicateAsset { .. }));
    // Nothing is deleted when the pairing is ambiguous.
    assert!(temp.path().join("lib.js").exists());
  }
}
