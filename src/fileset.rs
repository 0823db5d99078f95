//! Directory scanning for include/exclude file sets.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};

/// A base directory plus glob patterns selecting files below it.
///
/// Patterns are matched against `/`-separated paths relative to the base directory. `*` does not
/// cross directory boundaries while `**` does. Without include patterns every file is selected.
#[derive(Debug, Clone)]
pub struct FileSet {
  dir: PathBuf,
  includes: Vec<String>,
  excludes: Vec<String>,
}

impl FileSet {
  /// Create a file set rooted at `dir` that selects every file.
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      dir: dir.as_ref().to_path_buf(),
      includes: Vec::new(),
      excludes: Vec::new(),
    }
  }

  /// Add include patterns.
  pub fn include<I, S>(mut self, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self
      .includes
      .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
    self
  }

  /// Add exclude patterns.
  pub fn exclude<I, S>(mut self, patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self
      .excludes
      .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
    self
  }

  /// Base directory of the set.
  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Enumerate the selected files as sorted, `/`-separated relative names.
  pub fn scan(&self) -> PipelineResult<Vec<String>> {
    if !self.dir.is_dir() {
      return Err(PipelineError::configuration(format!(
        "file set directory '{}' does not exist",
        self.dir.display()
      )));
    }

    let includes = compile_patterns(&self.includes)?;
    let excludes = compile_patterns(&self.excludes)?;

    let mut names = Vec::new();
    for entry in WalkDir::new(&self.dir).follow_links(true) {
      let entry = entry.map_err(|err| {
        let path = err
          .path()
          .map(Path::to_path_buf)
          .unwrap_or_else(|| self.dir.clone());
        PipelineError::io("unable to scan", path, err.into())
      })?;
      if !entry.file_type().is_file() {
        continue;
      }

      let Ok(relative) = entry.path().strip_prefix(&self.dir) else {
        continue;
      };
      let name = relative.to_string_lossy().replace('\\', "/");

      let included = self.includes.is_empty() || includes.is_match(&name);
      if included && !excludes.is_match(&name) {
        names.push(name);
      }
    }

    names.sort();
    Ok(names)
  }
}

fn compile_patterns(patterns: &[String]) -> PipelineResult<GlobSet> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let glob = GlobBuilder::new(pattern)
      .literal_separator(true)
      .build()
      .map_err(|err| {
        PipelineError::configuration(format!("invalid file set pattern '{pattern}': {err}"))
      })?;
    builder.add(glob);
  }
  builder
    .build()
    .map_err(|err| PipelineError::configuration(format!("invalid file set patterns: {err}")))
}
