//! The append-only record of components built so far in a run.

use std::collections::HashMap;

use thiserror::Error;

use super::BuiltAttributes;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("component '{0}' has already been built in this run")]
pub struct AlreadyBuilt(pub String);

/// Built attributes keyed by component, in the order they were recorded.
///
/// Each entry is written once and never replaced.
#[derive(Debug, Clone, Default)]
pub struct BuiltComponents {
  order: Vec<String>,
  entries: HashMap<String, BuiltAttributes>,
}

impl BuiltComponents {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, component: &str, attributes: BuiltAttributes) -> Result<(), AlreadyBuilt> {
    if self.entries.contains_key(component) {
      return Err(AlreadyBuilt(component.to_string()));
    }
    self.order.push(component.to_string());
    self.entries.insert(component.to_string(), attributes);
    Ok(())
  }

  pub fn get(&self, component: &str) -> Option<&BuiltAttributes> {
    self.entries.get(component)
  }

  pub fn image_name(&self, component: &str) -> Option<&str> {
    self.get(component).map(|attributes| attributes.image_name.as_str())
  }

  pub fn contains(&self, component: &str) -> bool {
    self.entries.contains_key(component)
  }

  /// Entries in recording order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &BuiltAttributes)> {
    self
      .order
      .iter()
      .filter_map(|name| self.entries.get(name).map(|attributes| (name.as_str(), attributes)))
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }
}
