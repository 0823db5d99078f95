//! Minify-and-hash stage: produce `{name}-{hash}.{ext}` files and drop the originals.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{ErrorPolicy, PipelineError, PipelineResult};
use crate::inventory::reference_path_for;
use crate::metadata::{apply_mode, copy_mtime};
use crate::minifier::Minifier;
use crate::models::{AssetRecord, HashedAsset};
use crate::naming::hashed_name;

/// Number of digest bytes embedded in hashed filenames (32 hex characters).
const HASH_BYTES: usize = 16;

/// Hex digest of `bytes` used for cache-busting filenames.
pub fn content_hash(bytes: &[u8]) -> String {
  let digest = Sha256::digest(bytes);
  hex::encode(&digest[..HASH_BYTES])
}

/// Minifies assets through an injected [`Minifier`] and renames them by content hash.
pub struct HashingEngine<'a, M: Minifier + ?Sized> {
  minifier: &'a M,
  resource_root: &'a Path,
  reference_prefix: &'a str,
  preserve_permissions: bool,
  preserve_mtime: bool,
}

impl<'a, M: Minifier + ?Sized> HashingEngine<'a, M> {
  /// Create an engine writing reference paths relative to `resource_root`.
  pub fn new(minifier: &'a M, resource_root: &'a Path, reference_prefix: &'a str) -> Self {
    Self {
      minifier,
      resource_root,
      reference_prefix,
      preserve_permissions: true,
      preserve_mtime: false,
    }
  }

  /// Re-apply the captured permission bits to hashed files.
  pub fn preserve_permissions(mut self, enabled: bool) -> Self {
    self.preserve_permissions = enabled;
    self
  }

  /// Copy the original modification time onto hashed files.
  pub fn preserve_mtime(mut self, enabled: bool) -> Self {
    self.preserve_mtime = enabled;
    self
  }

  /// Process every asset; assets whose processing failed under a lenient policy are left out.
  pub fn process(
    &self,
    assets: Vec<AssetRecord>,
    policy: &ErrorPolicy,
  ) -> PipelineResult<Vec<HashedAsset>> {
    let mut hashed = Vec::with_capacity(assets.len());
    for record in assets {
      if let Some(asset) = policy.recover(self.process_one(record))? {
        hashed.push(asset);
      }
    }
    Ok(hashed)
  }

  /// Minify (or copy), hash, rename, preserve metadata, then remove the original.
  ///
  /// The original is only removed once the hashed file exists, so an abort never leaves an asset
  /// without a file under some name.
  pub fn process_one(&self, record: AssetRecord) -> PipelineResult<HashedAsset> {
    let (content_hash, hashed_absolute_path, hashed_reference_path) =
      match self.hash_into_place(&record) {
        Ok(placed) => placed,
        Err(err) => {
          discard_temp(&record.working_temp_path);
          return Err(err);
        }
      };

    let original = &record.original_absolute_path;
    if self.preserve_mtime {
      copy_mtime(original, &hashed_absolute_path)?;
    }
    if self.preserve_permissions {
      apply_mode(&hashed_absolute_path, record.permission_bits)?;
    }

    fs::remove_file(original)
      .map_err(|err| PipelineError::io("unable to remove file", original, err))?;

    Ok(HashedAsset {
      record,
      content_hash,
      hashed_absolute_path,
      hashed_reference_path,
    })
  }

  /// Produce the temp file, hash it and rename it to its hashed name.
  fn hash_into_place(&self, record: &AssetRecord) -> PipelineResult<(String, PathBuf, String)> {
    let original = &record.original_absolute_path;
    let temp = &record.working_temp_path;

    if record.is_pre_minified {
      tracing::debug!("Copying minimized '{}'.", original.display());
      fs::copy(original, temp)
        .map_err(|err| PipelineError::io("can not copy file", original, err))?;
    } else {
      tracing::info!("Minimizing '{}'.", original.display());
      self
        .minifier
        .minify(original, temp)
        .map_err(|err| PipelineError::Minification {
          path: original.clone(),
          output: err.to_string(),
        })?;
    }

    let bytes =
      fs::read(temp).map_err(|err| PipelineError::io("can not read the file", temp, err))?;
    let content_hash = content_hash(&bytes);
    let hashed_absolute_path = hashed_name(original, &content_hash);
    let hashed_reference_path =
      reference_path_for(&hashed_absolute_path, self.resource_root, self.reference_prefix)?;

    tracing::debug!(
      "Rename file '{}' to '{}'.",
      temp.display(),
      hashed_absolute_path.display()
    );
    fs::rename(temp, &hashed_absolute_path)
      .map_err(|err| PipelineError::io("can not rename file", temp, err))?;

    Ok((content_hash, hashed_absolute_path, hashed_reference_path))
  }
}

/// Remove a leftover working file so a failed asset leaves nothing behind in the output.
fn discard_temp(temp: &Path) {
  match fs::remove_file(temp) {
    Ok(()) => tracing::debug!("Removed working file '{}'.", temp.display()),
    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
    Err(err) => tracing::warn!("Unable to remove working file '{}': {err}", temp.display()),
  }
}
