//! Pre-compressed `.gz` siblings for hashed assets.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::{ErrorPolicy, PipelineError, PipelineResult};
use crate::metadata::{apply_mode, copy_mtime};
use crate::models::HashedAsset;

/// Where the gzip sibling of a hashed asset is written.
pub fn gzip_path(asset: &HashedAsset) -> PathBuf {
  let mut path = OsString::from(asset.hashed_absolute_path.as_os_str());
  path.push(".gz");
  PathBuf::from(path)
}

/// Writes `{hashed}.gz` files at the best compression level.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipWriter {
  preserve_permissions: bool,
  preserve_mtime: bool,
}

impl GzipWriter {
  /// Create a writer with the given metadata preservation settings.
  pub fn new(preserve_permissions: bool, preserve_mtime: bool) -> Self {
    Self {
      preserve_permissions,
      preserve_mtime,
    }
  }

  /// Compress every asset, returning the siblings that were written.
  pub fn write_all(
    &self,
    assets: &[HashedAsset],
    policy: &ErrorPolicy,
  ) -> PipelineResult<Vec<PathBuf>> {
    tracing::info!("Gzip compressing files.");
    let mut written = Vec::with_capacity(assets.len());
    for asset in assets {
      if let Some(path) = policy.recover(self.write_one(asset))? {
        written.push(path);
      }
    }
    Ok(written)
  }

  /// Compress a single hashed asset.
  pub fn write_one(&self, asset: &HashedAsset) -> PipelineResult<PathBuf> {
    let source = &asset.hashed_absolute_path;
    let target = gzip_path(asset);
    tracing::debug!(
      "Gzip compressing file '{}' to '{}'.",
      source.display(),
      target.display()
    );

    let data =
      fs::read(source).map_err(|err| PipelineError::io("can not read the file", source, err))?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder
      .write_all(&data)
      .map_err(|err| PipelineError::io("unable to compress file", source, err))?;
    let compressed = encoder
      .finish()
      .map_err(|err| PipelineError::io("unable to compress file", source, err))?;

    fs::write(&target, compressed)
      .map_err(|err| PipelineError::io("unable to write to file", &target, err))?;

    if self.preserve_mtime {
      copy_mtime(source, &target)?;
    }
    if self.preserve_permissions {
      apply_mode(&target, asset.record.permission_bits)?;
    }
    Ok(target)
  }
}
