//! Error kinds raised by the asset pipeline and the policy deciding which of them halt a run.

use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used by every pipeline stage.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures produced while inventorying, resolving, hashing or rewriting assets.
#[derive(Debug, Error)]
pub enum PipelineError {
  /// The pipeline was configured with paths or patterns it cannot work with.
  #[error("configuration error: {message}")]
  Configuration {
    /// Human readable description including the offending path or pattern.
    message: String,
  },
  /// A filesystem operation on a specific file failed.
  #[error("{action} '{}': {source}", path.display())]
  Io {
    /// Short description of the attempted operation, e.g. `unable to read`.
    action: &'static str,
    /// File the operation was attempted on.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: io::Error,
  },
  /// The external minifier rejected an asset.
  #[error("failed to minimize file '{}' with messages:\n{output}", path.display())]
  Minification {
    /// Asset handed to the minifier.
    path: PathBuf,
    /// Captured stdout/stderr of the tool, or the reason it could not be run.
    output: String,
  },
  /// Both minified spellings of the same asset exist, so neither can be picked safely.
  #[error("found duplicate files '{}' and '{}'", first.display(), second.display())]
  DuplicateAsset {
    /// Minified file being classified.
    first: PathBuf,
    /// Competing minified file using the other marker spelling.
    second: PathBuf,
  },
}

impl PipelineError {
  /// Build a configuration error from any displayable message.
  pub fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration {
      message: message.into(),
    }
  }

  /// Wrap an I/O error together with the file and operation it belongs to.
  pub fn io(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
    Self::Io {
      action,
      path: path.as_ref().to_path_buf(),
      source,
    }
  }

  /// Configuration and duplicate errors stop the build even when halt-on-error is disabled.
  pub fn is_always_fatal(&self) -> bool {
    matches!(self, Self::Configuration { .. } | Self::DuplicateAsset { .. })
  }
}

/// Applies the halt-on-error setting to recoverable failures.
#[derive(Debug)]
pub struct ErrorPolicy {
  halt_on_error: bool,
  skipped: Cell<usize>,
}

impl ErrorPolicy {
  /// Create a policy; `halt_on_error = false` turns recoverable errors into log lines.
  pub fn new(halt_on_error: bool) -> Self {
    Self {
      halt_on_error,
      skipped: Cell::new(0),
    }
  }

  /// Number of errors logged instead of propagated so far.
  pub fn skipped(&self) -> usize {
    self.skipped.get()
  }

  /// Propagate the error when it must stop the run, otherwise log it and return `Ok`.
  ///
  /// Callers skip the item the error belongs to when this returns `Ok`.
  pub fn handle(&self, error: PipelineError) -> PipelineResult<()> {
    if self.halt_on_error || error.is_always_fatal() {
      return Err(error);
    }
    tracing::error!("{error}");
    self.skipped.set(self.skipped.get() + 1);
    Ok(())
  }

  /// Like [`ErrorPolicy::handle`] but for results, yielding `None` when the error was swallowed.
  pub fn recover<T>(&self, result: PipelineResult<T>) -> PipelineResult<Option<T>> {
    match result {
      Ok(value) => Ok(Some(value)),
      Err(error) => self.handle(error).map(|()| None),
    }
  }
}

impl Default for ErrorPolicy {
  fn default() -> Self {
    Self::new(true)
  }
}
