//! The run report written to every output directory.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{BuildConfiguration, DistKind};
use crate::execute::{ComponentState, RunResult};

#[derive(Debug, Serialize)]
pub struct Report<'a> {
  pub name: &'a str,
  pub timestamp: i64,
  pub success: bool,
  pub order: &'a [String],
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failed: Option<FailedEntry>,
  pub components: BTreeMap<&'a str, ComponentEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FailedEntry {
  pub component: String,
  pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ComponentEntry<'a> {
  pub state: ComponentState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dist: Option<DistKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_name: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reused: Option<bool>,
}

impl<'a> Report<'a> {
  pub fn new(config: &'a BuildConfiguration, result: &'a RunResult, timestamp: i64) -> Self {
    let failed = result.failed.as_ref().map(|err| FailedEntry {
      component: err.component.clone(),
      error: err.source.to_string(),
    });

    let components = result
      .states
      .iter()
      .map(|(component, state)| {
        let attributes = result.built.get(component);
        let entry = ComponentEntry {
          state: *state,
          dist: attributes
            .map(|attributes| attributes.dist)
            .or_else(|| config.component(component).map(|spec| spec.dist.kind())),
          version: attributes.map(|attributes| attributes.version.as_str()),
          image_name: attributes.map(|attributes| attributes.image_name.as_str()),
          reused: attributes.map(|attributes| attributes.reused),
        };
        (component.as_str(), entry)
      })
      .collect();

    Self {
      name: &config.name,
      timestamp,
      success: result.is_success(),
      order: &result.order,
      failed,
      components,
    }
  }

  pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(self)
  }
}
