//! Resolving component names to builders.
//!
//! A component is built by the plugin registered under its exact name when
//! there is one, otherwise by a [`GenericBuilder`] configured from the
//! component's `assembly.yaml`. A name with neither is unknown.
//!
//! Resolution is memoized per run: resolving a name twice hands back the same
//! builder without calling the factory or reading the descriptor again.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_yaml::Mapping;
use thiserror::Error;
use tracing::debug;

use crate::assembly::{ComponentDescriptor, DescriptorError};
use crate::builder::{BuildFailure, ComponentBuilder, Fetcher, GenericBuilder, ImageEngine};
use crate::cache::Cache;
use crate::resources::ResourceLayout;

/// Factory producing a plugin builder from the component's raw configuration
/// mapping and the shared stage cache.
pub type BuilderFactory =
  Arc<dyn Fn(&Mapping, &Cache) -> Result<Arc<dyn ComponentBuilder>, BuildFailure> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("unknown component '{0}': no builder plugin and no resource metadata")]
  UnknownComponent(String),

  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error("builder plugin for '{component}' failed to initialize: {source}")]
  Factory {
    component: String,
    #[source]
    source: BuildFailure,
  },
}

/// Statically registered builder plugins, keyed by component name.
#[derive(Clone, Default)]
pub struct Plugins {
  factories: BTreeMap<String, BuilderFactory>,
}

impl std::fmt::Debug for Plugins {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_set().entries(self.factories.keys()).finish()
  }
}

impl Plugins {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `factory` for `component`, replacing an earlier registration.
  pub fn register<F>(&mut self, component: impl Into<String>, factory: F) -> &mut Self
  where
    F: Fn(&Mapping, &Cache) -> Result<Arc<dyn ComponentBuilder>, BuildFailure> + Send + Sync + 'static,
  {
    self.factories.insert(component.into(), Arc::new(factory));
    self
  }

  pub fn contains(&self, component: &str) -> bool {
    self.factories.contains_key(component)
  }

  pub fn get(&self, component: &str) -> Option<&BuilderFactory> {
    self.factories.get(component)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }
}

/// Per-run resolver from component names to builders.
pub struct BuilderRegistry {
  plugins: Plugins,
  resources: ResourceLayout,
  cache: Cache,
  engine: Arc<dyn ImageEngine>,
  fetcher: Arc<dyn Fetcher>,
  /// Raw configuration mapping per configured component.
  options: HashMap<String, Mapping>,
  resolved: HashMap<String, Arc<dyn ComponentBuilder>>,
}

impl BuilderRegistry {
  pub fn new(
    plugins: Plugins,
    resources: ResourceLayout,
    cache: Cache,
    engine: Arc<dyn ImageEngine>,
    fetcher: Arc<dyn Fetcher>,
  ) -> Self {
    Self {
      plugins,
      resources,
      cache,
      engine,
      fetcher,
      options: HashMap::new(),
      resolved: HashMap::new(),
    }
  }

  /// Provide the raw configuration mapping handed to `component`'s plugin factory.
  pub fn with_component_options(mut self, component: impl Into<String>, raw: Mapping) -> Self {
    self.options.insert(component.into(), raw);
    self
  }

  pub fn resources(&self) -> &ResourceLayout {
    &self.resources
  }

  /// Whether `component` has a plugin or resource metadata.
  pub fn contains(&self, component: &str) -> bool {
    self.plugins.contains(component) || self.resources.has_component(component)
  }

  pub fn resolve(&mut self, component: &str) -> Result<Arc<dyn ComponentBuilder>, RegistryError> {
    if let Some(builder) = self.resolved.get(component) {
      return Ok(Arc::clone(builder));
    }

    let builder = if let Some(factory) = self.plugins.get(component) {
      debug!(component = %component, "using builder plugin");
      let empty = Mapping::new();
      let raw = self.options.get(component).unwrap_or(&empty);
      factory(raw, &self.cache).map_err(|source| RegistryError::Factory {
        component: component.to_string(),
        source,
      })?
    } else if self.resources.has_component(component) {
      debug!(component = %component, "using generic builder");
      let descriptor = ComponentDescriptor::load(component, &self.resources.assembly(component))?;
      Arc::new(GenericBuilder::new(
        component,
        descriptor,
        self.cache.clone(),
        Arc::clone(&self.engine),
        Arc::clone(&self.fetcher),
      )) as Arc<dyn ComponentBuilder>
    } else {
      return Err(RegistryError::UnknownComponent(component.to_string()));
    };

    self.resolved.insert(component.to_string(), Arc::clone(&builder));
    Ok(builder)
  }
}
