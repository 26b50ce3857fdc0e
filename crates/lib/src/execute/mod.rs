//! Build orchestration.
//!
//! This module provides the main entry points for building a configuration.
//! It handles:
//! - resolving every component to a builder and closing over dependencies
//! - rejecting unknown components, cycles and unconfigured dependencies before
//!   any build starts
//! - building components one at a time in dependency order
//! - stopping at the first failure
//! - handing the fragments of the built components to the output writer

pub mod dag;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::builder::{
  BuildContext, BuildError, BuildFailure, BuiltComponents, DockerCli, Fetcher, HttpFetcher, ImageEngine,
};
use crate::cache::Cache;
use crate::config::{BuildConfiguration, ConfigError};
use crate::output::generate_output;
use crate::registry::{BuilderRegistry, Plugins, RegistryError};
use crate::resources::ResourceLayout;

pub use dag::{DependencyGraph, GraphError};
pub use types::{BuildPlan, ComponentOutput, ComponentState, Completed, ExecuteConfig, ForceRebuild, RunError, RunResult};

/// Drives a configuration from validation to the output directory.
pub struct Orchestrator {
  settings: ExecuteConfig,
  plugins: Plugins,
  cache: Cache,
  engine: Arc<dyn ImageEngine>,
  fetcher: Arc<dyn Fetcher>,
}

impl Orchestrator {
  /// An orchestrator using the `docker` CLI and HTTP downloads.
  pub fn new(settings: ExecuteConfig, cache: Cache) -> Self {
    Self {
      settings,
      plugins: Plugins::new(),
      cache,
      engine: Arc::new(DockerCli::from_env()),
      fetcher: Arc::new(HttpFetcher::new()),
    }
  }

  pub fn with_plugins(mut self, plugins: Plugins) -> Self {
    self.plugins = plugins;
    self
  }

  pub fn with_engine(mut self, engine: Arc<dyn ImageEngine>) -> Self {
    self.engine = engine;
    self
  }

  pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn settings(&self) -> &ExecuteConfig {
    &self.settings
  }

  pub fn cache(&self) -> &Cache {
    &self.cache
  }

  fn registry(&self, config: &BuildConfiguration) -> BuilderRegistry {
    let layout = ResourceLayout::new(&self.settings.resource_root, config.use_security);
    let mut registry = BuilderRegistry::new(
      self.plugins.clone(),
      layout,
      self.cache.clone(),
      Arc::clone(&self.engine),
      Arc::clone(&self.fetcher),
    );
    for (name, spec) in &config.components {
      registry = registry.with_component_options(name.clone(), spec.raw.clone());
    }
    registry
  }

  /// Build and validate the dependency graph of `config`.
  fn resolve(&self, config: &BuildConfiguration, registry: &mut BuilderRegistry) -> Result<DependencyGraph, RunError> {
    let dag = DependencyGraph::construct(config.component_names(), |name: &str| match registry.resolve(name) {
      Ok(builder) => Ok(Some(builder.dependencies().to_vec())),
      Err(RegistryError::UnknownComponent(_)) => Ok(None),
      Err(err) => Err(RunError::from(err)),
    })?;
    dag.validate_acyclic()?;

    for component in dag.nodes() {
      for dependency in dag.dependencies_of(component) {
        if config.component(dependency).is_none() {
          return Err(
            ConfigError::MissingDependencyConfig {
              component: dependency.to_string(),
              required_by: component.to_string(),
            }
            .into(),
          );
        }
      }
    }

    info!(components = dag.len(), "dependency graph resolved");
    Ok(dag)
  }

  /// Validate `config` and compute its build order without building anything.
  pub fn plan(&self, config: &BuildConfiguration) -> Result<BuildPlan, RunError> {
    let mut registry = self.registry(config);
    let dag = self.resolve(config, &mut registry)?;

    let order = dag.compute_order()?;
    let waves = dag.waves()?;
    let dependencies = order
      .iter()
      .map(|name| {
        let deps = dag.dependencies_of(name).into_iter().map(str::to_string).collect();
        (name.clone(), deps)
      })
      .collect();

    Ok(BuildPlan {
      order,
      waves,
      dependencies,
    })
  }

  /// Build every component of `config` in dependency order.
  ///
  /// Configuration and graph errors are returned before anything is built. A
  /// failing build stops the run; it is reported in [`RunResult::failed`]
  /// together with everything built before it.
  pub fn run(&self, config: &BuildConfiguration) -> Result<RunResult, RunError> {
    let mut registry = self.registry(config);
    let dag = self.resolve(config, &mut registry)?;
    let order = dag.compute_order()?;
    info!(order = ?order, "computed build order");

    let mut result = RunResult {
      states: order
        .iter()
        .map(|name| (name.clone(), ComponentState::Pending))
        .collect(),
      order: order.clone(),
      built: BuiltComponents::new(),
      ..Default::default()
    };

    // `resolve` has checked that every node of the graph is configured.
    let specs: Vec<_> = order
      .iter()
      .filter_map(|name| config.component(name).map(|spec| (name, spec)))
      .collect();
    debug_assert_eq!(specs.len(), order.len());

    for (name, spec) in specs {
      let builder = registry.resolve(name)?;

      result.states.insert(name.clone(), ComponentState::Building);
      info!(component = %name, dist = %spec.dist.kind(), "building component");

      let ctx = BuildContext {
        component: name,
        spec,
        resources: registry.resources(),
        built: &result.built,
        repository: &self.settings.repository,
        force_rebuild: self.settings.force.applies_to(name),
      };

      let failure = match builder.build(&ctx) {
        Ok(output) => match result.built.record(name, output.attributes.clone()) {
          Ok(()) => {
            info!(
              component = %name,
              image = %output.attributes.image_name,
              version = %output.attributes.version,
              reused = output.attributes.reused,
              "component built"
            );
            result.states.insert(name.clone(), ComponentState::Built);
            result.outputs.push(ComponentOutput {
              component: name.clone(),
              output,
            });
            None
          }
          Err(duplicate) => Some(BuildError::new(name.as_str(), BuildFailure::Message(duplicate.to_string()))),
        },
        Err(err) => Some(BuildError::new(name.as_str(), err.source)),
      };

      if let Some(err) = failure {
        error!(component = %name, error = %err.source, "build failed");
        result.states.insert(name.clone(), ComponentState::Failed);
        result.failed = Some(err);
        break;
      }
    }

    let skipped = result
      .states
      .values()
      .filter(|state| **state == ComponentState::Pending)
      .count();
    if skipped > 0 {
      warn!(skipped, "remaining components were not built");
    }
    Ok(result)
  }

  /// Run the build and write the output directory under `output_root`.
  ///
  /// After a failed build only the report is written, and the build error is
  /// returned.
  pub fn execute(&self, config: &BuildConfiguration, output_root: &Path) -> Result<Completed, RunError> {
    let mut result = self.run(config)?;

    let timestamp = chrono::Utc::now().timestamp();
    let output_dir = generate_output(config, &result, output_root, timestamp)?;

    match self.cache.enforce_max_size() {
      Ok(removed) => debug!(removed, "cache size enforced"),
      Err(err) => warn!(cache = %self.cache.base().display(), error = %err, "failed to trim cache"),
    }

    if let Some(err) = result.failed.take() {
      info!(report = %output_dir.display(), "build report written");
      return Err(RunError::Build(err));
    }

    info!(output = %output_dir.display(), "output written");
    Ok(Completed { output_dir, result })
  }
}
