//! Loading and validating the user-supplied build configuration.
//!
//! The configuration is a YAML mapping:
//!
//! ```yaml
//! name: demo
//! kerberos: false
//! components:
//!   hadoop:
//!     release: 3.1.1
//!   oozie:
//!     snapshot: ~/oozie/distro/target/oozie-5.2.0-distro.tar.gz
//!     services:
//!       oozieserver:
//!         ports: ["11000:11000"]
//! ```
//!
//! Only the document shape and the `release`/`snapshot` exclusivity are checked
//! here; builder-specific keys are passed through opaquely.

mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub use types::{BuildConfiguration, ComponentSpec, Dist, DistKind};

const NAME_KEY: &str = "name";
const SECURITY_KEY: &str = "kerberos";
const COMPONENTS_KEY: &str = "components";
const RELEASE_KEY: &str = "release";
const SNAPSHOT_KEY: &str = "snapshot";
const SERVICES_KEY: &str = "services";

/// A malformed build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("configuration is not valid YAML: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("configuration must be a mapping")]
  NotAMapping,

  #[error("configuration is missing the required key '{0}'")]
  MissingKey(&'static str),

  #[error("key '{key}' must be {expected}")]
  WrongType { key: String, expected: &'static str },

  #[error("configuration name must not be empty")]
  EmptyName,

  #[error("component '{component}' specifies both release and snapshot")]
  BothDists { component: String },

  #[error("component '{component}' specifies neither release nor snapshot")]
  NoDist { component: String },

  #[error("component '{component}' is required by '{required_by}' but has no entry under 'components'")]
  MissingDependencyConfig { component: String, required_by: String },
}

impl BuildConfiguration {
  /// Parse a configuration document.
  pub fn load(raw: &str) -> Result<Self, ConfigError> {
    let value: Value = serde_yaml::from_str(raw)?;
    Self::from_value(&value)
  }

  /// Read and parse a configuration file.
  pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loading build configuration");
    Self::load(&raw)
  }

  /// Build a configuration from an already parsed YAML value.
  pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
    let root = value.as_mapping().ok_or(ConfigError::NotAMapping)?;

    let name = match root.get(NAME_KEY) {
      None => return Err(ConfigError::MissingKey(NAME_KEY)),
      Some(value) => value.as_str().ok_or_else(|| wrong_type(NAME_KEY, "a string"))?,
    };
    if name.trim().is_empty() {
      return Err(ConfigError::EmptyName);
    }

    let use_security = match root.get(SECURITY_KEY) {
      None | Some(Value::Null) => false,
      Some(value) => value.as_bool().ok_or_else(|| wrong_type(SECURITY_KEY, "a boolean"))?,
    };

    let components_value = root.get(COMPONENTS_KEY).ok_or(ConfigError::MissingKey(COMPONENTS_KEY))?;
    let components_map = components_value
      .as_mapping()
      .ok_or_else(|| wrong_type(COMPONENTS_KEY, "a mapping of component names"))?;

    let mut components = BTreeMap::new();
    for (key, value) in components_map {
      let component = key
        .as_str()
        .ok_or_else(|| wrong_type(COMPONENTS_KEY, "a mapping with string keys"))?;
      let spec = parse_component(component, value)?;
      components.insert(component.to_string(), spec);
    }

    Ok(Self {
      name: name.to_string(),
      use_security,
      components,
    })
  }
}

fn parse_component(component: &str, value: &Value) -> Result<ComponentSpec, ConfigError> {
  let raw = match value {
    Value::Mapping(map) => map.clone(),
    // `hadoop:` with nothing under it still has to name a distribution.
    Value::Null => Mapping::new(),
    _ => return Err(wrong_type(&format!("{COMPONENTS_KEY}.{component}"), "a mapping")),
  };

  let dist = match (raw.get(RELEASE_KEY), raw.get(SNAPSHOT_KEY)) {
    (Some(_), Some(_)) => {
      return Err(ConfigError::BothDists {
        component: component.to_string(),
      });
    }
    (None, None) => {
      return Err(ConfigError::NoDist {
        component: component.to_string(),
      });
    }
    (Some(release), None) => Dist::Release(release_version(component, release)?),
    (None, Some(snapshot)) => {
      let path = snapshot
        .as_str()
        .ok_or_else(|| wrong_type(&format!("{component}.{SNAPSHOT_KEY}"), "a path string"))?;
      Dist::Snapshot(PathBuf::from(path))
    }
  };

  let services = match raw.get(SERVICES_KEY) {
    None | Some(Value::Null) => BTreeMap::new(),
    Some(value) => parse_services(component, value)?,
  };

  let options = raw
    .iter()
    .filter(|(key, _)| !matches!(key.as_str(), Some(RELEASE_KEY | SNAPSHOT_KEY | SERVICES_KEY)))
    .map(|(key, value)| (key.clone(), value.clone()))
    .collect();

  Ok(ComponentSpec {
    dist,
    services,
    options,
    raw,
  })
}

/// Versions are usually quoted, but `release: 2.0` parses as a number.
///
/// A fractional number has already lost trailing zeros (`3.10` reads as `3.1`),
/// so it is accepted with a warning.
fn release_version(component: &str, value: &Value) -> Result<String, ConfigError> {
  match value {
    Value::String(version) if !version.trim().is_empty() => Ok(version.clone()),
    Value::Number(number) if number.is_f64() => {
      warn!(
        component = %component,
        version = %number,
        "unquoted release parsed as a number, quote it to keep trailing zeros"
      );
      Ok(number.to_string())
    }
    Value::Number(number) => Ok(number.to_string()),
    _ => Err(wrong_type(&format!("{component}.{RELEASE_KEY}"), "a version string")),
  }
}

fn parse_services(component: &str, value: &Value) -> Result<BTreeMap<String, Mapping>, ConfigError> {
  let key = format!("{component}.{SERVICES_KEY}");
  let map = value
    .as_mapping()
    .ok_or_else(|| wrong_type(&key, "a mapping of service overrides"))?;

  let mut services = BTreeMap::new();
  for (service, override_value) in map {
    let service = service
      .as_str()
      .ok_or_else(|| wrong_type(&key, "a mapping with string keys"))?;
    let override_map = override_value
      .as_mapping()
      .ok_or_else(|| wrong_type(&format!("{key}.{service}"), "a mapping"))?;
    services.insert(service.to_string(), override_map.clone());
  }
  Ok(services)
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
  ConfigError::WrongType {
    key: key.to_string(),
    expected,
  }
}
