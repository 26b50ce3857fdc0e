//! Merging flat configuration fragments.
//!
//! Fragments are combined in build order. When several components set the same
//! key, the component built last wins, and the key is written in that
//! component's section only. `${<COMPONENT>_IMAGE}` placeholders in values are
//! replaced with the built images.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::fragment::ConfigFragment;
use crate::placeholder::{Resolver, substitute};

/// The merged entries, grouped by the component that owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedConfig {
  pub sections: Vec<(String, Vec<(String, String)>)>,
}

impl MergedConfig {
  /// The winning value of `key`.
  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .sections
      .iter()
      .flat_map(|(_, entries)| entries.iter())
      .find(|(entry_key, _)| entry_key == key)
      .map(|(_, value)| value.as_str())
  }

  /// Render as `# <component>` headed blocks of `key=value` lines.
  pub fn render(&self) -> String {
    let mut text = String::new();
    for (component, entries) in &self.sections {
      let _ = writeln!(text, "# {component}");
      for (key, value) in entries {
        let _ = writeln!(text, "{key}={value}");
      }
      text.push('\n');
    }
    text
  }
}

/// Merge `fragments`, given in build order.
pub fn merge_config<'a>(
  fragments: impl IntoIterator<Item = (&'a str, &'a ConfigFragment)>,
  resolver: &impl Resolver,
) -> MergedConfig {
  let fragments: Vec<_> = fragments.into_iter().collect();

  // key -> (index of the winning fragment, value)
  let mut winners: HashMap<&str, (usize, &str)> = HashMap::new();
  for (index, (_, fragment)) in fragments.iter().enumerate() {
    for (key, value) in &fragment.entries {
      winners.insert(key.as_str(), (index, value.as_str()));
    }
  }

  let mut sections = Vec::new();
  for (index, (component, fragment)) in fragments.iter().enumerate() {
    let mut entries: Vec<(String, String)> = Vec::new();
    for (key, _) in &fragment.entries {
      let (winner, value) = winners[key.as_str()];
      if winner != index || entries.iter().any(|(existing, _)| existing == key) {
        continue;
      }
      entries.push((key.clone(), substitute(value, resolver)));
    }
    if !entries.is_empty() {
      sections.push((component.to_string(), entries));
    }
  }

  MergedConfig { sections }
}
