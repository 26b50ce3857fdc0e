use std::sync::Arc;

use dbd_lib::builder::BuildFailure;
use dbd_lib::config::{BuildConfiguration, ConfigError};
use dbd_lib::execute::{ComponentState, ExecuteConfig, ForceRebuild, GraphError, RunError};

use super::common::{FakeEngine, FakeFetcher, TestEnv, demo_config, demo_env};

#[test]
fn demo_builds_in_dependency_order() {
  let env = demo_env();
  let engine = Arc::new(FakeEngine::default());
  let fetcher = Arc::new(FakeFetcher::default());
  let orchestrator = env.orchestrator(engine.clone(), fetcher.clone());

  let completed = orchestrator.execute(&demo_config(), &env.output_path()).unwrap();

  assert_eq!(completed.result.order, vec!["base", "app"]);
  assert!(completed.result.is_success());
  assert_eq!(engine.built_images(), vec!["dbd/base:1.0", "dbd/app:2.0_base1.0"]);
  assert_eq!(
    *fetcher.urls.lock().unwrap(),
    vec![
      "https://example.invalid/base/base-1.0.tar.gz",
      "https://example.invalid/app/app-2.0.tar.gz",
    ]
  );

  let args = engine.build_args("dbd/app:2.0_base1.0").unwrap();
  assert_eq!(args.get("BASE_IMAGE").map(String::as_str), Some("dbd/base:1.0"));

  let name = completed.output_dir.file_name().unwrap().to_string_lossy().to_string();
  assert!(name.starts_with("demo_"), "unexpected output directory {name}");
}

#[test]
fn failing_build_stops_dependents() {
  let env = demo_env();
  let engine = Arc::new(FakeEngine::failing("dbd/base:"));
  let orchestrator = env.orchestrator(engine.clone(), Arc::new(FakeFetcher::default()));

  let result = orchestrator.run(&demo_config()).unwrap();

  assert!(!result.is_success());
  assert_eq!(result.failed_component(), Some("base"));
  assert_eq!(result.state("base"), Some(ComponentState::Failed));
  assert_eq!(result.state("app"), Some(ComponentState::Pending));
  assert!(engine.built_images().is_empty());
  assert!(result.outputs.is_empty());
}

#[test]
fn failed_execute_reports_the_failing_component() {
  let env = demo_env();
  let engine = Arc::new(FakeEngine::failing("dbd/app:"));
  let orchestrator = env.orchestrator(engine.clone(), Arc::new(FakeFetcher::default()));

  let err = orchestrator.execute(&demo_config(), &env.output_path()).unwrap_err();

  let RunError::Build(build) = &err else {
    panic!("expected a build error, got {err:?}");
  };
  assert_eq!(build.component, "app");
  assert!(matches!(build.source, BuildFailure::Command { code: Some(1), .. }));
  assert_eq!(err.exit_code(), 5);
  assert_eq!(engine.built_images(), vec!["dbd/base:1.0"]);

  // Only the report is written.
  let dirs = env.output_dirs();
  assert_eq!(dirs.len(), 1);
  let files: Vec<_> = std::fs::read_dir(&dirs[0]).unwrap().collect();
  assert_eq!(files.len(), 1);
  assert!(dirs[0].join("output_configuration.yaml").is_file());
}

#[test]
fn unknown_component_is_rejected_before_building() {
  let env = demo_env();
  let engine = Arc::new(FakeEngine::default());
  let orchestrator = env.orchestrator(engine.clone(), Arc::new(FakeFetcher::default()));
  let config = BuildConfiguration::load("name: demo\ncomponents:\n  base:\n    release: '1.0'\n  nope:\n    release: '1'\n")
    .unwrap();

  let err = orchestrator.execute(&config, &env.output_path()).unwrap_err();

  assert!(matches!(
    err,
    RunError::Graph(GraphError::UnknownComponent { ref component, .. }) if component == "nope"
  ));
  assert_eq!(err.exit_code(), 3);
  assert!(engine.built_images().is_empty());
  assert!(env.output_dirs().is_empty());
}

#[test]
fn cycle_is_rejected_before_building() {
  let env = TestEnv::new();
  env.component("a", &["b"], "services: {}\n", "");
  env.component("b", &["a"], "services: {}\n", "");
  let engine = Arc::new(FakeEngine::default());
  let orchestrator = env.orchestrator(engine.clone(), Arc::new(FakeFetcher::default()));
  let config =
    BuildConfiguration::load("name: loop\ncomponents:\n  a:\n    release: '1'\n  b:\n    release: '1'\n").unwrap();

  let err = orchestrator.run(&config).unwrap_err();

  let RunError::Graph(GraphError::CyclicDependency { members }) = &err else {
    panic!("expected a cycle, got {err:?}");
  };
  assert!(members.contains(&"a".to_string()));
  assert!(members.contains(&"b".to_string()));
  assert_eq!(err.exit_code(), 4);
  assert!(engine.built_images().is_empty());
}

#[test]
fn unconfigured_dependency_is_a_config_error() {
  let env = demo_env();
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));
  let config = BuildConfiguration::load("name: demo\ncomponents:\n  app:\n    release: '2.0'\n").unwrap();

  let err = orchestrator.plan(&config).unwrap_err();

  assert!(matches!(
    err,
    RunError::Config(ConfigError::MissingDependencyConfig { ref component, ref required_by })
      if component == "base" && required_by == "app"
  ));
  assert_eq!(err.exit_code(), 2);
}

#[test]
fn plan_groups_independent_components() {
  let env = demo_env();
  env.component("tool", &[], "services: {}\n", "");
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));
  let config = BuildConfiguration::load(
    "name: demo\ncomponents:\n  app:\n    release: '2.0'\n  base:\n    release: '1.0'\n  tool:\n    release: '0.1'\n",
  )
  .unwrap();

  let plan = orchestrator.plan(&config).unwrap();

  let base = plan.order.iter().position(|name| name == "base").unwrap();
  let app = plan.order.iter().position(|name| name == "app").unwrap();
  assert!(base < app);
  assert_eq!(plan.waves.len(), 2);
  assert!(plan.waves[0].contains(&"base".to_string()));
  assert!(plan.waves[0].contains(&"tool".to_string()));
  assert_eq!(plan.waves[1], vec!["app"]);
  assert_eq!(plan.dependencies["app"], vec!["base"]);
}

#[test]
fn existing_images_are_reused_unless_forced() {
  let env = demo_env();
  let engine = Arc::new(FakeEngine::default());
  engine
    .existing
    .lock()
    .unwrap()
    .extend(["dbd/base:1.0".to_string(), "dbd/app:2.0_base1.0".to_string()]);
  let fetcher = Arc::new(FakeFetcher::default());

  let result = env
    .orchestrator(engine.clone(), fetcher.clone())
    .run(&demo_config())
    .unwrap();
  assert!(result.is_success());
  assert!(result.built.iter().all(|(_, attributes)| attributes.reused));
  assert!(engine.built_images().is_empty());
  assert!(fetcher.urls.lock().unwrap().is_empty());

  let settings = ExecuteConfig {
    force: ForceRebuild::Components(["app".to_string()].into_iter().collect()),
    ..env.settings()
  };
  let result = env
    .orchestrator_with(settings, 15, engine.clone(), fetcher.clone())
    .run(&demo_config())
    .unwrap();
  assert!(result.built.get("base").unwrap().reused);
  assert!(!result.built.get("app").unwrap().reused);
  assert_eq!(engine.built_images(), vec!["dbd/app:2.0_base1.0"]);
}

#[test]
fn downloads_are_cached_between_runs() {
  let env = demo_env();
  let fetcher = Arc::new(FakeFetcher::default());
  let settings = ExecuteConfig {
    force: ForceRebuild::All,
    ..env.settings()
  };

  for _ in 0..2 {
    let orchestrator = env.orchestrator_with(settings.clone(), 15, Arc::new(FakeEngine::default()), fetcher.clone());
    orchestrator.run(&demo_config()).unwrap();
  }

  assert_eq!(fetcher.urls.lock().unwrap().len(), 2);
}

#[test]
fn cache_is_trimmed_after_execute() {
  let env = demo_env();
  let orchestrator = env.orchestrator_with(
    env.settings(),
    1,
    Arc::new(FakeEngine::default()),
    Arc::new(FakeFetcher::default()),
  );

  orchestrator.execute(&demo_config(), &env.output_path()).unwrap();

  let files = walkdir::WalkDir::new(env.cache_path())
    .into_iter()
    .filter_map(Result::ok)
    .filter(|entry| entry.file_type().is_file())
    .count();
  assert_eq!(files, 1);
}

mod plugins {
  use std::sync::Arc;

  use dbd_lib::builder::{BuildContext, BuildError, BuildOutput, BuiltAttributes, ComponentBuilder};
  use dbd_lib::config::{BuildConfiguration, DistKind};
  use dbd_lib::fragment::{ConfigFragment, ManifestFragment};
  use dbd_lib::registry::Plugins;

  use super::super::common::{FakeEngine, FakeFetcher, TestEnv};

  /// A plugin that builds nothing and reports a fixed image.
  struct StaticBuilder {
    name: String,
    dependencies: Vec<String>,
  }

  impl ComponentBuilder for StaticBuilder {
    fn name(&self) -> &str {
      &self.name
    }

    fn dependencies(&self) -> &[String] {
      &self.dependencies
    }

    fn build(&self, ctx: &BuildContext<'_>) -> Result<BuildOutput, BuildError> {
      let mut tag = "1".to_string();
      for dependency in &self.dependencies {
        let built = ctx
          .dependency(dependency)
          .map_err(|err| BuildError::new(&self.name, err))?;
        tag.push('_');
        tag.push_str(built.image_tag());
      }
      let manifest = serde_yaml::from_str(&format!(
        "services:\n  {}:\n    image: ${{{}_IMAGE}}\n",
        self.name,
        self.name.to_uppercase()
      ))
      .map_err(|err| BuildError::new(&self.name, dbd_lib::builder::BuildFailure::Message(err.to_string())))?;

      Ok(BuildOutput {
        manifest: ManifestFragment::new(manifest),
        config: ConfigFragment::new(vec![(format!("{}_KEY", self.name), "on".to_string())]),
        attributes: BuiltAttributes {
          dist: DistKind::Release,
          version: "1".to_string(),
          image_name: format!("test/{}:{tag}", self.name),
          reused: false,
        },
        support_dir: None,
      })
    }
  }

  fn register(plugins: &mut Plugins, name: &'static str, dependencies: &'static [&'static str]) {
    plugins.register(name, move |_, _| {
      let builder: Arc<dyn ComponentBuilder> = Arc::new(StaticBuilder {
        name: name.to_string(),
        dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
      });
      Ok(builder)
    });
  }

  #[test]
  fn registered_plugins_take_part_in_the_build() {
    let env = TestEnv::new();
    let engine = Arc::new(FakeEngine::default());
    let mut plugins = Plugins::new();
    register(&mut plugins, "kdc", &[]);
    register(&mut plugins, "store", &["kdc"]);
    register(&mut plugins, "query", &["store", "kdc"]);
    let orchestrator = env
      .orchestrator(engine.clone(), Arc::new(FakeFetcher::default()))
      .with_plugins(plugins);
    let config = BuildConfiguration::load(
      "name: plugged\ncomponents:\n  query:\n    release: '1'\n  store:\n    release: '1'\n  kdc:\n    release: '1'\n",
    )
    .unwrap();

    let completed = orchestrator.execute(&config, &env.output_path()).unwrap();

    assert_eq!(completed.result.order, vec!["kdc", "store", "query"]);
    assert_eq!(completed.result.built.image_name("query"), Some("test/query:1_1_1_1"));
    assert!(engine.built_images().is_empty());

    let compose = std::fs::read_to_string(completed.output_dir.join("docker-compose.yaml")).unwrap();
    assert!(compose.contains("test/store:1_1"));
    let config = std::fs::read_to_string(completed.output_dir.join("compose-config")).unwrap();
    assert!(config.contains("# kdc\nkdc_KEY=on\n"));
  }
}
