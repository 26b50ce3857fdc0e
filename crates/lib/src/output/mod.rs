//! Producing the output directory of a run.
//!
//! Every fragment is merged in memory before anything touches the disk, so a
//! merge failure leaves no partial output behind. The directory is named
//! `<configuration>_<timestamp>`; when that name is taken the timestamp is
//! bumped until a fresh directory can be created.

pub mod compose;
pub mod config_file;
pub mod report;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::BuildConfiguration;
use crate::consts::{COMPOSE_FILE, CONFIG_FILE, ENV_FILE, REPORT_FILE};
use crate::execute::RunResult;
use crate::placeholder::image_variable;
use crate::util::fs::copy_tree;

use compose::{ComposeDocument, ImageResolver, apply_overrides, substitute_value};
use config_file::merge_config;
pub use config_file::MergedConfig;
pub use report::Report;

/// Fragments that cannot be combined into one coherent manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
  #[error("component '{component}' overrides service '{service}' which its manifest does not declare")]
  UnknownService { component: String, service: String },

  #[error("multiple definitions of '{key}' in section '{section}' (from component '{component}')")]
  DuplicateDefinition {
    component: String,
    section: String,
    key: String,
  },

  #[error("section '{section}' of component '{component}' is not a mapping")]
  MalformedSection { component: String, section: String },
}

#[derive(Debug, Error)]
pub enum OutputError {
  #[error(transparent)]
  Merge(#[from] MergeError),

  #[error("output root {0} is not a directory")]
  NotADirectory(PathBuf),

  #[error("failed to write {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize output: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
  move |source| OutputError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// The merged artifacts of a successful run.
#[derive(Debug)]
pub struct MergedOutput {
  pub compose: String,
  pub config: MergedConfig,
  pub env: String,
}

/// Merge the fragments of every built component, in build order.
pub fn merge(config: &BuildConfiguration, result: &RunResult) -> Result<MergedOutput, OutputError> {
  let resolver = ImageResolver::new(&result.built);
  let mut document = ComposeDocument::new();

  for entry in &result.outputs {
    let mut fragment = entry.output.manifest.document().clone();
    if let Some(spec) = config.component(&entry.component) {
      apply_overrides(&entry.component, &mut fragment, &spec.services)?;
    }

    let mut value = Value::Mapping(fragment);
    substitute_value(&mut value, &resolver);
    if let Value::Mapping(fragment) = value {
      document.fold(&entry.component, fragment)?;
    }
  }

  if config.use_security {
    document.add_kerberos()?;
  }

  let compose = serde_yaml::to_string(&document.into_document())?;
  let config = merge_config(
    result
      .outputs
      .iter()
      .map(|entry| (entry.component.as_str(), &entry.output.config)),
    &resolver,
  );
  let env = result
    .built
    .iter()
    .map(|(component, attributes)| format!("{}={}\n", image_variable(component), attributes.image_name))
    .collect();

  Ok(MergedOutput { compose, config, env })
}

/// Create a fresh `<name>_<timestamp>` directory under `root`.
///
/// Returns the directory and the timestamp actually used.
pub fn create_output_dir(root: &Path, name: &str, timestamp: i64) -> Result<(PathBuf, i64), OutputError> {
  if root.exists() && !root.is_dir() {
    return Err(OutputError::NotADirectory(root.to_path_buf()));
  }
  fs::create_dir_all(root).map_err(io_error(root))?;

  let mut timestamp = timestamp;
  loop {
    let dir = root.join(format!("{name}_{timestamp}"));
    match fs::create_dir(&dir) {
      Ok(()) => return Ok((dir, timestamp)),
      Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
        debug!(dir = %dir.display(), "output directory exists");
        timestamp += 1;
      }
      Err(err) => return Err(io_error(&dir)(err)),
    }
  }
}

fn write(path: &Path, contents: &str) -> Result<(), OutputError> {
  fs::write(path, contents).map_err(io_error(path))
}

/// Write the output directory of a run and return its path.
///
/// A failed run gets only the report; a successful one also gets the merged
/// manifest, configuration, `.env` and every component's support files.
pub fn generate_output(
  config: &BuildConfiguration,
  result: &RunResult,
  output_root: &Path,
  timestamp: i64,
) -> Result<PathBuf, OutputError> {
  let merged = if result.is_success() {
    Some(merge(config, result)?)
  } else {
    None
  };

  let (dir, timestamp) = create_output_dir(output_root, &config.name, timestamp)?;

  let report = Report::new(config, result, timestamp).to_yaml()?;
  write(&dir.join(REPORT_FILE), &report)?;

  let Some(merged) = merged else {
    info!(dir = %dir.display(), "wrote report of failed run");
    return Ok(dir);
  };

  write(&dir.join(COMPOSE_FILE), &merged.compose)?;
  write(&dir.join(CONFIG_FILE), &merged.config.render())?;
  write(&dir.join(ENV_FILE), &merged.env)?;

  for entry in &result.outputs {
    if let Some(support) = &entry.output.support_dir {
      let target = dir.join(&entry.component);
      copy_tree(support, &target).map_err(io_error(&target))?;
    }
  }

  info!(dir = %dir.display(), "output generated");
  Ok(dir)
}
