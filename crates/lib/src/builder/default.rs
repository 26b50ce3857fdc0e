//! The builder used for components without a registered plugin.
//!
//! Everything it needs comes from the component's `assembly.yaml`:
//!
//! - release builds download `url` (with `{version}` substituted) into the cache
//! - snapshot builds take the configured path as-is and find out the version by
//!   running `version_command` in the built image and matching `version_regex`
//!
//! The artifact lands in the `generated/` directory of a temporary copy of the
//! component's `docker_context/`, which is then built with one
//! `<DEPENDENCY>_IMAGE` build argument per dependency.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use super::fetch::url_to_filename;
use super::{
  BuildContext, BuildError, BuildFailure, BuildOutput, BuiltAttributes, ComponentBuilder, Fetcher, ImageEngine,
};
use crate::assembly::{ComponentDescriptor, DescriptorError};
use crate::cache::Cache;
use crate::config::{Dist, DistKind};
use crate::consts::GENERATED_DIR_NAME;
use crate::fragment::{ConfigFragment, ManifestFragment};
use crate::placeholder::image_variable;
use crate::platform::paths::expand_home;
use crate::util::fs::{copy_path, copy_tree};
use crate::util::hash::snapshot_id;

const DOWNLOAD_STAGE: &str = "download";

pub struct GenericBuilder {
  name: String,
  descriptor: ComponentDescriptor,
  cache: Cache,
  engine: Arc<dyn ImageEngine>,
  fetcher: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for GenericBuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GenericBuilder")
      .field("name", &self.name)
      .field("descriptor", &self.descriptor)
      .field("cache", &self.cache)
      .finish_non_exhaustive()
  }
}

impl GenericBuilder {
  pub fn new(
    name: impl Into<String>,
    descriptor: ComponentDescriptor,
    cache: Cache,
    engine: Arc<dyn ImageEngine>,
    fetcher: Arc<dyn Fetcher>,
  ) -> Self {
    Self {
      name: name.into(),
      descriptor,
      cache,
      engine,
      fetcher,
    }
  }

  /// `<repository>/<component>:<id>` followed by `_<dependency><tag>` for each
  /// dependency in sorted order.
  pub fn image_name(&self, ctx: &BuildContext<'_>, id: &str) -> Result<String, BuildFailure> {
    let mut dependencies: Vec<&String> = self.descriptor.dependencies.iter().collect();
    dependencies.sort();

    let mut name = format!("{}/{}:{}", ctx.repository, self.name, id);
    for dependency in dependencies {
      let built = ctx.dependency(dependency)?;
      name.push('_');
      name.push_str(dependency);
      name.push_str(built.image_tag());
    }
    Ok(name)
  }

  fn image_id(&self, dist: &Dist) -> Result<String, BuildFailure> {
    match dist {
      Dist::Release(version) => Ok(version.clone()),
      Dist::Snapshot(path) => Ok(snapshot_id(&expand_home(path))?),
    }
  }

  fn release_url(&self, version: &str) -> Result<String, DescriptorError> {
    self.descriptor.release_url(version).ok_or_else(|| DescriptorError::MissingField {
      component: self.name.clone(),
      field: "url",
    })
  }

  fn version_probe(&self) -> Result<(&str, Regex), DescriptorError> {
    let missing = |field| DescriptorError::MissingField {
      component: self.name.clone(),
      field,
    };
    let command = self.descriptor.version_command.as_deref().ok_or_else(|| missing("version_command"))?;
    let pattern = self.descriptor.version_regex.as_deref().ok_or_else(|| missing("version_regex"))?;

    let regex = Regex::new(pattern).map_err(|source| DescriptorError::InvalidRegex {
      component: self.name.clone(),
      source,
    })?;
    // captures_len counts the implicit whole-match group
    let groups = regex.captures_len() - 1;
    if groups != 1 {
      return Err(DescriptorError::RegexGroups {
        component: self.name.clone(),
        groups,
      });
    }
    Ok((command, regex))
  }

  /// The artifact to place into the build context.
  fn prepare_artifact(&self, dist: &Dist) -> Result<PathBuf, BuildFailure> {
    match dist {
      Dist::Release(version) => {
        let url = self.release_url(version)?;
        let path = self.cache.path(
          &self.name,
          DOWNLOAD_STAGE,
          DistKind::Release,
          version,
          &url_to_filename(&url),
        );
        if path.is_file() {
          info!(component = %self.name, path = ?path, "using cached download");
        } else {
          info!(component = %self.name, version = %version, url = %url, "downloading release");
          self.fetcher.fetch(&url, &path)?;
        }
        Ok(path)
      }
      Dist::Snapshot(path) => {
        let path = expand_home(path);
        info!(component = %self.name, path = ?path, "using snapshot");
        Ok(path)
      }
    }
  }

  fn build_image(&self, ctx: &BuildContext<'_>, image: &str, artifact: &Path) -> Result<(), BuildFailure> {
    let source = ctx.resources.docker_context(&self.name);
    if !source.is_dir() {
      return Err(BuildFailure::MissingContext(source));
    }

    let context = tempfile::Builder::new().prefix("dbd-context-").tempdir()?;
    copy_tree(&source, context.path())?;

    let file_name = artifact
      .file_name()
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(&self.name));
    copy_path(artifact, &context.path().join(GENERATED_DIR_NAME).join(file_name))?;

    let mut build_args = BTreeMap::new();
    for dependency in &self.descriptor.dependencies {
      let built = ctx.dependency(dependency)?;
      build_args.insert(image_variable(dependency), built.image_name.clone());
    }
    build_args.insert("GENERATED_DIR".to_string(), GENERATED_DIR_NAME.to_string());

    self.engine.build_image(context.path(), image, &build_args)
  }

  fn find_version(&self, image: &str) -> Result<String, BuildFailure> {
    let (command, regex) = self.version_probe()?;
    let output = self.engine.run_capture(image, command)?;
    regex
      .captures(&output)
      .and_then(|captures| captures.get(1))
      .map(|version| version.as_str().to_string())
      .ok_or_else(|| BuildFailure::VersionNotFound {
        command: command.to_string(),
      })
  }

  fn build_inner(&self, ctx: &BuildContext<'_>) -> Result<BuildOutput, BuildFailure> {
    let dist = &ctx.spec.dist;

    // Fail on an incomplete descriptor before touching the network or the engine.
    match dist {
      Dist::Release(version) => {
        self.release_url(version)?;
      }
      Dist::Snapshot(_) => {
        self.version_probe()?;
      }
    }

    let id = self.image_id(dist)?;
    let image = self.image_name(ctx, &id)?;

    let reused = !ctx.force_rebuild && self.engine.image_exists(&image)?;
    if reused {
      info!(component = %self.name, image = %image, "reusing existing image");
    } else {
      let artifact = self.prepare_artifact(dist)?;
      self.build_image(ctx, &image, &artifact)?;
    }

    let version = match dist {
      Dist::Release(version) => version.clone(),
      Dist::Snapshot(_) => self.find_version(&image)?,
    };
    debug!(component = %self.name, version = %version, "resolved version");

    Ok(BuildOutput {
      manifest: ManifestFragment::load(&ctx.resources.compose_part(&self.name))?,
      config: ConfigFragment::load(&ctx.resources.config_part(&self.name))?,
      attributes: BuiltAttributes {
        dist: dist.kind(),
        version,
        image_name: image,
        reused,
      },
      support_dir: ctx.resources.scripts(&self.name),
    })
  }
}

impl ComponentBuilder for GenericBuilder {
  fn name(&self) -> &str {
    &self.name
  }

  fn dependencies(&self) -> &[String] {
    &self.descriptor.dependencies
  }

  fn build(&self, ctx: &BuildContext<'_>) -> Result<BuildOutput, BuildError> {
    self.build_inner(ctx).map_err(|source| BuildError::new(&self.name, source))
  }
}
