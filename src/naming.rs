//! Filename conventions: minified-name markers and content hash splicing.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// The two spellings of the minified-name marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMarker {
  /// `name-min.ext`
  Hyphen,
  /// `name.min.ext`
  Dot,
}

impl MinMarker {
  fn suffix(self) -> &'static str {
    match self {
      Self::Hyphen => "-min",
      Self::Dot => ".min",
    }
  }

  /// The competing spelling.
  pub fn other(self) -> Self {
    match self {
      Self::Hyphen => Self::Dot,
      Self::Dot => Self::Hyphen,
    }
  }
}

/// A path whose stem carries a minified-name marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifiedName {
  /// Which spelling the file uses.
  pub marker: MinMarker,
  /// Same path with the marker stripped.
  pub unminified: PathBuf,
}

impl MinifiedName {
  /// The path using the other marker spelling for the same base name.
  pub fn alternate_spelling(&self) -> PathBuf {
    with_marker(&self.unminified, self.marker.other())
  }
}

fn minified_stem_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^(.+)([-.])min$").expect("invalid minified stem regex"))
}

/// Classify a path as minified, returning the marker and the unminified sibling.
pub fn parse_minified(path: &Path) -> Option<MinifiedName> {
  let stem = path.file_stem()?.to_str()?;
  let captures = minified_stem_pattern().captures(stem)?;
  let base = captures.get(1)?.as_str();
  let marker = match captures.get(2)?.as_str() {
    "-" => MinMarker::Hyphen,
    _ => MinMarker::Dot,
  };

  Some(MinifiedName {
    marker,
    unminified: replace_stem(path, base),
  })
}

/// Strip a minified-name marker from a path, returning it unchanged when there is none.
pub fn strip_marker(path: &Path) -> PathBuf {
  parse_minified(path)
    .map(|name| name.unminified)
    .unwrap_or_else(|| path.to_path_buf())
}

/// Strip a minified-name marker from a `/`-separated reference string.
pub fn strip_marker_from_reference(reference: &str) -> String {
  strip_marker(Path::new(reference))
    .to_string_lossy()
    .replace('\\', "/")
}

/// Insert `marker` between the stem and the extension of an unminified path.
pub fn with_marker(unminified: &Path, marker: MinMarker) -> PathBuf {
  let stem = unminified
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  replace_stem(unminified, &format!("{stem}{}", marker.suffix()))
}

/// `dir/name.ext` (or `dir/name-min.ext`) becomes `dir/name-{hash}.ext`.
pub fn hashed_name(path: &Path, hash: &str) -> PathBuf {
  let base = strip_marker(path);
  let stem = base
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  replace_stem(&base, &format!("{stem}-{hash}"))
}

fn replace_stem(path: &Path, stem: &str) -> PathBuf {
  let file_name = match path.extension() {
    Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
    None => stem.to_string(),
  };
  path.with_file_name(file_name)
}
