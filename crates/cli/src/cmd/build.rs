//! Implementation of the `dbd build` command.
//!
//! Loads the build configuration, builds every component in dependency order
//! and writes the output directory.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use dbd_lib::cache::Cache;
use dbd_lib::config::BuildConfiguration;
use dbd_lib::execute::{ExecuteConfig, ForceRebuild, Orchestrator, RunError};
use dbd_lib::platform::paths::{cache_dir, expand_home};

use crate::output::{print_info, print_stat, print_success};

pub struct BuildArgs {
  pub config: PathBuf,
  pub output_dir: PathBuf,
  pub force: Option<Vec<String>>,
  pub cache: Option<PathBuf>,
  pub cache_size: usize,
  pub resources: PathBuf,
  pub repository: String,
}

/// `--force` alone rebuilds everything, `--force a b` only the named components.
pub fn force_selection(force: Option<Vec<String>>) -> ForceRebuild {
  match force {
    None => ForceRebuild::None,
    Some(components) if components.is_empty() => ForceRebuild::All,
    Some(components) => ForceRebuild::Components(components.into_iter().collect()),
  }
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let started = Instant::now();

  let config = BuildConfiguration::load_file(&args.config)
    .map_err(RunError::from)
    .with_context(|| format!("Failed to load configuration: {}", args.config.display()))?;

  let cache_base = match args.cache {
    Some(path) => expand_home(&path),
    None => cache_dir().ok_or_else(|| anyhow!("Cannot determine a cache directory, pass --cache"))?,
  };
  debug!(cache = %cache_base.display(), size = args.cache_size, "using stage cache");

  let settings = ExecuteConfig {
    resource_root: expand_home(&args.resources),
    repository: args.repository,
    force: force_selection(args.force),
  };
  let orchestrator = Orchestrator::new(settings, Cache::new(cache_base, args.cache_size));

  print_info(&format!("Building '{}' ({} components)", config.name, config.components.len()));
  let completed = orchestrator
    .execute(&config, &expand_home(&args.output_dir))
    .with_context(|| format!("Build of '{}' failed", config.name))?;

  println!();
  for (component, attributes) in completed.result.built.iter() {
    let status = if attributes.reused { "reused" } else { "built" };
    print_stat(component, &format!("{} ({status})", attributes.image_name));
  }
  println!();
  print_success(&format!(
    "Output written to {} in {}",
    completed.output_dir.display(),
    humantime::format_duration(Duration::from_secs(started.elapsed().as_secs()))
  ));

  Ok(())
}
