//! Merging manifest fragments into one compose document.

use std::collections::{BTreeMap, HashMap};

use serde_yaml::{Mapping, Value};

use super::MergeError;
use crate::builder::BuiltComponents;
use crate::consts::{COMPOSE_FILE_VERSION, KERBEROS_IMAGE, KERBEROS_SERVICE};
use crate::placeholder::{Resolver, image_variable, substitute};

const VERSION_KEY: &str = "version";
const SERVICES_KEY: &str = "services";

/// Resolves `${<COMPONENT>_IMAGE}` to the image built for that component.
pub struct ImageResolver {
  images: HashMap<String, String>,
}

impl ImageResolver {
  pub fn new(built: &BuiltComponents) -> Self {
    Self {
      images: built
        .iter()
        .map(|(component, attributes)| (image_variable(component), attributes.image_name.clone()))
        .collect(),
    }
  }
}

impl Resolver for ImageResolver {
  fn resolve(&self, name: &str) -> Option<&str> {
    self.images.get(&name.to_ascii_uppercase()).map(String::as_str)
  }
}

/// Override `base` with `overlay`, descending into nested mappings so that
/// only the keys given in `overlay` change.
pub fn deep_merge(base: &mut Mapping, overlay: &Mapping) {
  for (key, value) in overlay {
    match (base.get_mut(key), value) {
      (Some(Value::Mapping(existing)), Value::Mapping(nested)) => deep_merge(existing, nested),
      _ => {
        base.insert(key.clone(), value.clone());
      }
    }
  }
}

/// Apply a component's `services` overrides on top of its own fragment.
pub fn apply_overrides(
  component: &str,
  fragment: &mut Mapping,
  overrides: &BTreeMap<String, Mapping>,
) -> Result<(), MergeError> {
  for (service, override_map) in overrides {
    let unknown = || MergeError::UnknownService {
      component: component.to_string(),
      service: service.clone(),
    };
    let target = fragment
      .get_mut(SERVICES_KEY)
      .and_then(Value::as_mapping_mut)
      .and_then(|services| services.get_mut(service.as_str()))
      .ok_or_else(unknown)?;

    match target {
      Value::Mapping(existing) => deep_merge(existing, override_map),
      // `service:` with no body
      other @ Value::Null => *other = Value::Mapping(override_map.clone()),
      _ => {
        return Err(MergeError::MalformedSection {
          component: component.to_string(),
          section: format!("{SERVICES_KEY}.{service}"),
        });
      }
    }
  }
  Ok(())
}

/// Replace known placeholders in every string of `value`.
pub fn substitute_value(value: &mut Value, resolver: &impl Resolver) {
  match value {
    Value::String(text) => {
      let replaced = substitute(text, resolver);
      *text = replaced;
    }
    Value::Sequence(items) => {
      for item in items {
        substitute_value(item, resolver);
      }
    }
    Value::Mapping(map) => {
      for (_, item) in map.iter_mut() {
        substitute_value(item, resolver);
      }
    }
    Value::Tagged(tagged) => substitute_value(&mut tagged.value, resolver),
    Value::Null | Value::Bool(_) | Value::Number(_) => {}
  }
}

/// Accumulates the top-level sections of every fragment.
#[derive(Debug, Default)]
pub struct ComposeDocument {
  sections: Mapping,
}

impl ComposeDocument {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fold `fragment` in. A key already defined in the same section by an
  /// earlier fragment is an error; `version` is ignored.
  pub fn fold(&mut self, component: &str, fragment: Mapping) -> Result<(), MergeError> {
    for (section, body) in fragment {
      let section_name = section.as_str().map(str::to_string).unwrap_or_else(|| format!("{section:?}"));
      if section_name == VERSION_KEY {
        continue;
      }

      let body = match body {
        Value::Mapping(body) => body,
        Value::Null => Mapping::new(),
        _ => {
          return Err(MergeError::MalformedSection {
            component: component.to_string(),
            section: section_name,
          });
        }
      };

      let aggregate = self
        .sections
        .entry(section)
        .or_insert_with(|| Value::Mapping(Mapping::new()));
      let Value::Mapping(aggregate) = aggregate else {
        return Err(MergeError::MalformedSection {
          component: component.to_string(),
          section: section_name,
        });
      };

      for (key, value) in body {
        if aggregate.contains_key(&key) {
          return Err(MergeError::DuplicateDefinition {
            component: component.to_string(),
            section: section_name,
            key: key.as_str().map(str::to_string).unwrap_or_else(|| format!("{key:?}")),
          });
        }
        aggregate.insert(key, value);
      }
    }
    Ok(())
  }

  pub fn has_service(&self, service: &str) -> bool {
    self
      .sections
      .get(SERVICES_KEY)
      .and_then(Value::as_mapping)
      .is_some_and(|services| services.contains_key(service))
  }

  /// Add the kerberos KDC service unless a component already declared it.
  pub fn add_kerberos(&mut self) -> Result<(), MergeError> {
    if self.has_service(KERBEROS_SERVICE) {
      return Ok(());
    }
    let mut service = Mapping::new();
    service.insert("image".into(), KERBEROS_IMAGE.into());
    let mut services = Mapping::new();
    services.insert(KERBEROS_SERVICE.into(), Value::Mapping(service));
    let mut fragment = Mapping::new();
    fragment.insert(SERVICES_KEY.into(), Value::Mapping(services));
    self.fold(KERBEROS_SERVICE, fragment)
  }

  /// The final document, starting with `version`.
  pub fn into_document(self) -> Mapping {
    let mut document = Mapping::new();
    document.insert(VERSION_KEY.into(), COMPOSE_FILE_VERSION.into());
    for (section, body) in self.sections {
      document.insert(section, body);
    }
    document
  }
}
