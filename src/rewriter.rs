//! Reference rewriting: swap quoted asset references in source files for their hashed names.
//!
//! Substitution is literal and byte based, not a parse of the source language. Keys are wrapped
//! in quotes to keep accidental matches inside longer tokens rare, but a quoted reference that
//! happens to appear in unrelated text is still replaced.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use regex::bytes::{Captures, Regex, RegexBuilder};

use crate::error::{ErrorPolicy, PipelineError, PipelineResult};
use crate::metadata::{read_mtime, write_mtime};
use crate::models::{HashedAsset, SourceFileRecord};

const QUOTES: [char; 2] = ['\'', '"'];
const PATTERN_SIZE_LIMIT: usize = 64 * (1 << 20);

/// Quoted reference → quoted hashed reference, applied in a single left-to-right pass.
#[derive(Debug, Clone)]
pub struct ReplacementTable {
  pairs: BTreeMap<Vec<u8>, Vec<u8>>,
  pattern: Option<Regex>,
}

impl ReplacementTable {
  /// Build the table from hashed assets, including alternate reference paths.
  ///
  /// A key that would map to two different hashed names is a configuration error.
  pub fn build(assets: &[HashedAsset]) -> PipelineResult<Self> {
    tracing::debug!("Prepare place holders.");
    let mut pairs: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

    for asset in assets {
      for reference in asset.record.reference_paths() {
        for quote in QUOTES {
          let key = format!("{quote}{reference}{quote}").into_bytes();
          let value = format!("{quote}{}{quote}", asset.hashed_reference_path).into_bytes();

          if let Some(existing) = pairs.get(&key) {
            if *existing != value {
              return Err(PipelineError::configuration(format!(
                "reference {reference} maps to both {} and {}",
                String::from_utf8_lossy(existing),
                String::from_utf8_lossy(&value)
              )));
            }
            continue;
          }
          pairs.insert(key, value);
        }
      }
    }

    let pattern = compile_pattern(pairs.keys())?;
    Ok(Self { pairs, pattern })
  }

  /// Number of quoted keys in the table.
  pub fn len(&self) -> usize {
    self.pairs.len()
  }

  /// Returns `true` when no asset was hashed.
  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  #[cfg(test)]
  fn get(&self, key: &str) -> Option<&str> {
    self
      .pairs
      .get(key.as_bytes())
      .and_then(|value| std::str::from_utf8(value).ok())
  }

  /// Replace every non-overlapping key occurrence; the longest key wins at a given position.
  pub fn apply<'c>(&self, content: &'c [u8]) -> Cow<'c, [u8]> {
    let Some(pattern) = &self.pattern else {
      return Cow::Borrowed(content);
    };
    pattern.replace_all(content, |caps: &Captures<'_>| {
      self
        .pairs
        .get(&caps[0])
        .cloned()
        .unwrap_or_else(|| caps[0].to_vec())
    })
  }
}

fn compile_pattern<'k>(keys: impl Iterator<Item = &'k Vec<u8>>) -> PipelineResult<Option<Regex>> {
  let mut alternatives: Vec<String> = keys
    .map(|key| regex::escape(&String::from_utf8_lossy(key)))
    .collect();
  if alternatives.is_empty() {
    return Ok(None);
  }

  // Leftmost-first alternation: longer keys must come first to win over their prefixes.
  alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
  RegexBuilder::new(&alternatives.join("|"))
    .size_limit(PATTERN_SIZE_LIMIT)
    .build()
    .map(Some)
    .map_err(|err| {
      PipelineError::configuration(format!("unable to build reference pattern: {err}"))
    })
}

/// Rewrites source files using a [`ReplacementTable`].
pub struct ReferenceRewriter<'a> {
  table: &'a ReplacementTable,
  assets: &'a [HashedAsset],
  preserve_mtime: bool,
}

impl<'a> ReferenceRewriter<'a> {
  /// Create a rewriter; `assets` are consulted for modification times only.
  pub fn new(table: &'a ReplacementTable, assets: &'a [HashedAsset]) -> Self {
    Self {
      table,
      assets,
      preserve_mtime: false,
    }
  }

  /// Keep rewritten sources at least as new as themselves and every asset they reference.
  pub fn preserve_mtime(mut self, enabled: bool) -> Self {
    self.preserve_mtime = enabled;
    self
  }

  /// Rewrite every source, returning the paths that changed.
  pub fn rewrite(
    &self,
    sources: Vec<SourceFileRecord>,
    policy: &ErrorPolicy,
  ) -> PipelineResult<Vec<PathBuf>> {
    tracing::debug!("Replace include files with new compressed files.");
    let mut rewritten = Vec::new();
    for mut source in sources {
      if let Some(true) = policy.recover(self.rewrite_one(&mut source))? {
        rewritten.push(source.absolute_path);
      }
    }
    Ok(rewritten)
  }

  /// Rewrite a single source file in place; returns `false` when nothing needed replacing.
  pub fn rewrite_one(&self, source: &mut SourceFileRecord) -> PipelineResult<bool> {
    let path = source.absolute_path.clone();
    let content = source.content()?;
    let updated = self.table.apply(content);
    if updated.as_ref() == content {
      return Ok(false);
    }

    let latest = if self.preserve_mtime {
      Some(self.latest_mtime(&path, &updated)?)
    } else {
      None
    };

    fs::write(&path, &updated)
      .map_err(|err| PipelineError::io("updating file failed", &path, err))?;
    tracing::info!("Updated file '{}'.", path.display());

    if let Some(mtime) = latest {
      write_mtime(&path, mtime)?;
    }
    Ok(true)
  }

  /// Newest of the source's own mtime and the mtimes of the hashed assets it now references.
  fn latest_mtime(&self, path: &Path, content: &[u8]) -> PipelineResult<FileTime> {
    let mut latest = read_mtime(path)?;
    for asset in self.assets {
      if contains(content, asset.hashed_reference_path.as_bytes()) {
        latest = latest.max(read_mtime(&asset.hashed_absolute_path)?);
      }
    }
    Ok(latest)
  }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
  !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}
