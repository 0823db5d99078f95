//! Permission and modification time helpers shared by the hashing and rewriting stages.

use std::fs;
use std::path::Path;

use filetime::FileTime;

use crate::error::{PipelineError, PipelineResult};

/// Read the permission bits of a file.
#[cfg(unix)]
pub fn read_mode(path: &Path) -> PipelineResult<u32> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = fs::metadata(path)
    .map_err(|err| PipelineError::io("unable to get permissions of file", path, err))?;
  Ok(metadata.permissions().mode())
}

/// Read the permission bits of a file.
///
/// Only the read-only flag exists here, so it is folded into a unix-style mode.
#[cfg(not(unix))]
pub fn read_mode(path: &Path) -> PipelineResult<u32> {
  let metadata = fs::metadata(path)
    .map_err(|err| PipelineError::io("unable to get permissions of file", path, err))?;
  Ok(if metadata.permissions().readonly() { 0o444 } else { 0o644 })
}

/// Apply previously captured permission bits to a file.
#[cfg(unix)]
pub fn apply_mode(path: &Path, mode: u32) -> PipelineResult<()> {
  use std::os::unix::fs::PermissionsExt;

  fs::set_permissions(path, fs::Permissions::from_mode(mode))
    .map_err(|err| PipelineError::io("unable to set permissions for file", path, err))
}

/// Apply previously captured permission bits to a file.
#[cfg(not(unix))]
pub fn apply_mode(path: &Path, mode: u32) -> PipelineResult<()> {
  let mut permissions = fs::metadata(path)
    .map_err(|err| PipelineError::io("unable to set permissions for file", path, err))?
    .permissions();
  permissions.set_readonly(mode & 0o222 == 0);
  fs::set_permissions(path, permissions)
    .map_err(|err| PipelineError::io("unable to set permissions for file", path, err))
}

/// Last modification time of a file.
pub fn read_mtime(path: &Path) -> PipelineResult<FileTime> {
  let metadata =
    fs::metadata(path).map_err(|err| PipelineError::io("unable to get mtime of file", path, err))?;
  Ok(FileTime::from_last_modification_time(&metadata))
}

/// Set the modification time of a file, leaving its access time alone.
pub fn write_mtime(path: &Path, mtime: FileTime) -> PipelineResult<()> {
  filetime::set_file_mtime(path, mtime)
    .map_err(|err| PipelineError::io("unable to set mtime for file", path, err))
}

/// Copy the modification time of `source` onto `destination`.
pub fn copy_mtime(source: &Path, destination: &Path) -> PipelineResult<()> {
  let mtime = read_mtime(source)?;
  write_mtime(destination, mtime)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn copies_mtime_between_files() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("a.css");
    let destination = temp.path().join("b.css");
    fs::write(&source, "a").unwrap();
    fs::write(&destination, "b").unwrap();
    filetime::set_file_mtime(&source, FileTime::from_unix_time(1_000_000, 0)).unwrap();

    copy_mtime(&source, &destination).unwrap();
    assert_eq!(read_mtime(&destination).unwrap().unix_seconds(), 1_000_000);
  }

  #[cfg(unix)]
  #[test]
  fn round_trips_permission_bits() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("a.js");
    fs::write(&path, "a").unwrap();

    apply_mode(&path, 0o100600).unwrap();
    assert_eq!(read_mode(&path).unwrap() & 0o777, 0o600);
  }

  #[test]
  fn missing_files_report_their_path() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("missing.js");
    let error = read_mtime(&missing).unwrap_err();
    assert!(error.to_string().contains("missing.js"));
  }
}
