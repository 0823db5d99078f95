//! Inventory stage: enumerate assets and sources and capture what must survive mutation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{ErrorPolicy, PipelineError, PipelineResult};
use crate::metadata::read_mode;
use crate::models::{AssetRecord, Inventory, SourceFileRecord};

/// Enumerate the asset and source file sets described by `config`.
///
/// Fails with a configuration error when the resource root cannot be resolved or an asset lies
/// outside of it. Per-file I/O failures go through `policy`; skipped assets are left out.
pub fn build_inventory(config: &PipelineConfig, policy: &ErrorPolicy) -> PipelineResult<Inventory> {
  tracing::debug!("Get source and include file names.");
  let asset_set = config.asset_set();
  let asset_names = asset_set.scan()?;
  let source_set = config.source_set();
  let source_names = source_set.scan()?;

  let resource_root = resolve_resource_root(asset_set.dir(), &config.resource_dir)?;

  tracing::debug!("Get source files info.");
  let sources = source_names
    .iter()
    .map(|name| SourceFileRecord::new(source_set.dir().join(name)))
    .collect();

  tracing::debug!("Get include files info.");
  let mut assets = BTreeMap::new();
  for name in asset_names {
    let record = describe_asset(
      asset_set.dir(),
      &name,
      &resource_root,
      &config.reference_prefix,
    );
    let Some(record) = policy.recover(record)? else {
      continue;
    };

    if assets.contains_key(&record.original_absolute_path) {
      tracing::warn!(
        "Skipping '{}': resolves to already included '{}'.",
        name,
        record.original_absolute_path.display()
      );
      continue;
    }
    assets.insert(record.original_absolute_path.clone(), record);
  }

  Ok(Inventory {
    resource_root,
    assets,
    sources,
  })
}

/// Canonicalise `asset_dir/resource_dir`.
pub fn resolve_resource_root(asset_dir: &Path, resource_dir: &Path) -> PipelineResult<PathBuf> {
  let candidate = asset_dir.join(resource_dir);
  fs::canonicalize(&candidate).map_err(|err| {
    PipelineError::configuration(format!(
      "unable to resolve resource dir '{}': {err}",
      candidate.display()
    ))
  })
}

/// Path of `path` relative to the resource root, as written in source files.
pub fn reference_path_for(
  path: &Path,
  resource_root: &Path,
  reference_prefix: &str,
) -> PipelineResult<String> {
  let relative = path.strip_prefix(resource_root).map_err(|_| {
    PipelineError::configuration(format!(
      "'{}' is not below the resource dir '{}'",
      path.display(),
      resource_root.display()
    ))
  })?;
  let relative = relative.to_string_lossy().replace('\\', "/");
  Ok(format!("{reference_prefix}{relative}"))
}

fn describe_asset(
  base_dir: &Path,
  name: &str,
  resource_root: &Path,
  reference_prefix: &str,
) -> PipelineResult<AssetRecord> {
  let path = base_dir.join(name);
  let absolute = fs::canonicalize(&path)
    .map_err(|err| PipelineError::io("unable to resolve path of file", &path, err))?;
  let reference_path = reference_path_for(&absolute, resource_root, reference_prefix)?;
  let permission_bits = read_mode(&absolute)?;

  let mut working_temp_path = absolute.clone().into_os_string();
  working_temp_path.push(".tmp");

  Ok(AssetRecord {
    original_relative_name: name.to_string(),
    original_absolute_path: absolute,
    working_temp_path: PathBuf::from(working_temp_path),
    reference_path,
    permission_bits,
    is_pre_minified: false,
    alternate_reference_path: None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn config_for(root: &Path) -> PipelineConfig {
    PipelineConfig {
      asset_dir: root.join("www"),
      asset_includes: vec!["**/*.js".into(), "**/*.css".into()],
      source_dir: root.join("src"),
      source_includes: vec!["**/*.html".into()],
      resource_dir: PathBuf::from("."),
      ..PipelineConfig::default()
    }
  }

  fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  #[test]
  fn collects_assets_and_sources() {
    let temp = tempdir().unwrap();
    write(temp.path(), "www/js/app.js", "var a = 1;");
    write(temp.path(), "www/css/site.css", "body {}");
    write(temp.path(), "www/readme.txt", "ignored");
    write(temp.path(), "src/index.html", "<html>");

    let inventory = build_inventory(&config_for(temp.path()), &ErrorPolicy::default()).unwrap();

    let references: Vec<&str> = inventory
      .assets
      .values()
      .map(|record| record.reference_path.as_str())
      .collect();
    assert_eq!(references, vec!["css/site.css", "js/app.js"]);
    assert_eq!(inventory.sources.len(), 1);

    let app = inventory
      .assets
      .values()
      .find(|record| record.original_relative_name == "js/app.js")
      .unwrap();
    assert_eq!(
      app.working_temp_path,
      app.original_absolute_path.with_file_name("app.js.tmp")
    );
    assert!(!app.is_pre_minified);
  }

  #[test]
  fn references_are_relative_to_the_resource_dir() {
    let temp = tempdir().unwrap();
    write(temp.path(), "www/static/js/app.js", "var a = 1;");
    write(temp.path(), "src/index.html", "<html>");

    let mut config = config_for(temp.path());
    config.resource_dir = PathBuf::from("static");
    config.reference_prefix = "/".into();

    let inventory = build_inventory(&config, &ErrorPolicy::default()).unwrap();
    let record = inventory.assets.values().next().unwrap();
    assert_eq!(record.reference_path, "/js/app.js");
  }

  #[test]
  fn assets_outside_the_resource_dir_are_rejected() {
    let temp = tempdir().unwrap();
    write(temp.path(), "www/static/app.js", "var a = 1;");
    write(temp.path(), "www/other/lib.js", "var b = 2;");
    write(temp.path(), "src/index.html", "<html>");

    let mut config = config_for(temp.path());
    config.resource_dir = PathBuf::from("static");

    let error = build_inventory(&config, &ErrorPolicy::new(false)).unwrap_err();
    assert!(matches!(error, PipelineError::Configuration { .. }));
  }

  #[test]
  fn unresolvable_resource_dir_is_rejected() {
    let temp = tempdir().unwrap();
    write(temp.path(), "www/app.js", "var a = 1;");
    write(temp.path(), "src/index.html", "<html>");

    let mut config = config_for(temp.path());
    config.resource_dir = PathBuf::from("missing");

    let error = build_inventory(&config, &ErrorPolicy::default()).unwrap_err();
    assert!(error.to_string().contains("unable to resolve resource dir"));
  }
}
