//! Shared helpers for library integration tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dbd_lib::builder::{BuildFailure, Fetcher, ImageEngine};
use dbd_lib::cache::Cache;
use dbd_lib::config::BuildConfiguration;
use dbd_lib::execute::{ExecuteConfig, Orchestrator};
use tempfile::TempDir;

/// Container engine that records builds instead of running docker.
#[derive(Default)]
pub struct FakeEngine {
  /// Images reported as already present.
  pub existing: Mutex<Vec<String>>,
  /// Builds of images starting with one of these prefixes fail.
  pub failing: Vec<String>,
  pub version_output: String,
  pub builds: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl FakeEngine {
  pub fn failing(prefix: &str) -> Self {
    Self {
      failing: vec![prefix.to_string()],
      ..Default::default()
    }
  }

  pub fn built_images(&self) -> Vec<String> {
    self.builds.lock().unwrap().iter().map(|(image, _)| image.clone()).collect()
  }

  pub fn build_args(&self, image: &str) -> Option<BTreeMap<String, String>> {
    self
      .builds
      .lock()
      .unwrap()
      .iter()
      .find(|(built, _)| built == image)
      .map(|(_, args)| args.clone())
  }
}

impl ImageEngine for FakeEngine {
  fn image_exists(&self, image: &str) -> Result<bool, BuildFailure> {
    Ok(self.existing.lock().unwrap().iter().any(|existing| existing == image))
  }

  fn build_image(&self, context: &Path, image: &str, build_args: &BTreeMap<String, String>) -> Result<(), BuildFailure> {
    assert!(context.join("Dockerfile").is_file(), "build context is missing its Dockerfile");
    if self.failing.iter().any(|prefix| image.starts_with(prefix)) {
      return Err(BuildFailure::Command {
        command: format!("docker build -t {image}"),
        code: Some(1),
        stderr: "step 3/7 failed".to_string(),
      });
    }
    self
      .builds
      .lock()
      .unwrap()
      .push((image.to_string(), build_args.clone()));
    self.existing.lock().unwrap().push(image.to_string());
    Ok(())
  }

  fn run_capture(&self, _image: &str, _command: &str) -> Result<String, BuildFailure> {
    Ok(self.version_output.clone())
  }
}

/// Downloader that writes a placeholder archive.
#[derive(Default)]
pub struct FakeFetcher {
  pub urls: Mutex<Vec<String>>,
}

impl Fetcher for FakeFetcher {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildFailure> {
    self.urls.lock().unwrap().push(url.to_string());
    if let Some(parent) = dest.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, format!("archive of {url}"))?;
    Ok(())
  }
}

/// Isolated resources, cache and output directories.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn resources_path(&self) -> PathBuf {
    self.temp.path().join("resources")
  }

  pub fn cache_path(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  pub fn output_path(&self) -> PathBuf {
    self.temp.path().join("output")
  }

  /// Write a file relative to the resource directory.
  pub fn write_resource(&self, relative_path: &str, content: &str) {
    let path = self.resources_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Lay out the resources of a component built by the generic builder.
  pub fn component(&self, name: &str, dependencies: &[&str], compose: &str, config: &str) {
    self.write_resource(
      &format!("{name}/assembly.yaml"),
      &format!(
        "dependencies: [{}]\nurl: https://example.invalid/{name}/{name}-{{version}}.tar.gz\n",
        dependencies.join(", ")
      ),
    );
    self.write_resource(&format!("{name}/docker_context/Dockerfile"), "FROM scratch\n");
    self.write_resource(&format!("{name}/docker-compose_part.yaml"), compose);
    self.write_resource(&format!("{name}/compose-config_part"), config);
  }

  pub fn settings(&self) -> ExecuteConfig {
    ExecuteConfig {
      resource_root: self.resources_path(),
      ..Default::default()
    }
  }

  pub fn orchestrator(&self, engine: Arc<FakeEngine>, fetcher: Arc<FakeFetcher>) -> Orchestrator {
    self.orchestrator_with(self.settings(), 15, engine, fetcher)
  }

  pub fn orchestrator_with(
    &self,
    settings: ExecuteConfig,
    cache_size: usize,
    engine: Arc<FakeEngine>,
    fetcher: Arc<FakeFetcher>,
  ) -> Orchestrator {
    Orchestrator::new(settings, Cache::new(self.cache_path(), cache_size))
      .with_engine(engine)
      .with_fetcher(fetcher)
  }

  /// Directories created under the output root.
  pub fn output_dirs(&self) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(self.output_path()) else {
      return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries.map(|entry| entry.unwrap().path()).collect();
    dirs.sort();
    dirs
  }
}

/// The two-component demo: `app` depends on `base`.
pub fn demo_env() -> TestEnv {
  let env = TestEnv::new();
  env.component(
    "base",
    &[],
    "services:\n  base:\n    image: ${BASE_IMAGE}\n",
    "BASE-SITE.XML_base.setting=1\n",
  );
  env.component(
    "app",
    &["base"],
    "services:\n  app:\n    image: ${APP_IMAGE}\n    environment:\n      BASE_IMAGE: ${BASE_IMAGE}\n",
    "# app settings\nAPP-SITE.XML_app.setting=2\n",
  );
  env
}

pub const DEMO_CONFIG: &str = "\
name: demo
components:
  base:
    release: '1.0'
  app:
    release: '2.0'
";

pub fn demo_config() -> BuildConfiguration {
  BuildConfiguration::load(DEMO_CONFIG).unwrap()
}
