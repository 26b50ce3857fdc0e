//! Implementation of the `dbd plan` command.
//!
//! Resolves and validates the dependency graph of a configuration and prints
//! the build order without building anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use dbd_lib::cache::Cache;
use dbd_lib::config::BuildConfiguration;
use dbd_lib::consts::DEFAULT_CACHE_SIZE;
use dbd_lib::execute::{ExecuteConfig, Orchestrator, RunError};
use dbd_lib::platform::paths::expand_home;

use crate::output::{OutputFormat, print_json, print_stat, print_success, symbols};

/// A private, empty cache that is removed with the returned directory.
fn scratch_cache() -> Result<(TempDir, Cache)> {
  let dir = TempDir::new().context("Failed to create a scratch cache directory")?;
  let cache = Cache::new(dir.path(), DEFAULT_CACHE_SIZE);
  Ok((dir, cache))
}

pub fn cmd_plan(config_path: &Path, resources: PathBuf, format: OutputFormat) -> Result<()> {
  let config = BuildConfiguration::load_file(config_path)
    .map_err(RunError::from)
    .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

  let settings = ExecuteConfig {
    resource_root: expand_home(&resources),
    ..Default::default()
  };
  let (_scratch, cache) = scratch_cache()?;
  let orchestrator = Orchestrator::new(settings, cache);
  let plan = orchestrator.plan(&config).context("Failed to plan build")?;

  if format.is_json() {
    let json = serde_json::json!({
      "name": config.name,
      "order": plan.order,
      "waves": plan.waves,
      "dependencies": plan.dependencies,
    });
    return print_json(&json);
  }

  print_success(&format!("Build order for '{}'", config.name));
  for (index, component) in plan.order.iter().enumerate() {
    let dependencies = &plan.dependencies[component];
    if dependencies.is_empty() {
      println!("  {}. {}", index + 1, component);
    } else {
      println!("  {}. {} {} {}", index + 1, component, symbols::ARROW, dependencies.join(", "));
    }
  }

  println!();
  for (index, wave) in plan.waves.iter().enumerate() {
    print_stat(&format!("Wave {}", index + 1), &wave.join(", "));
  }

  Ok(())
}
