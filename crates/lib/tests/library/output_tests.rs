use std::sync::Arc;

use dbd_lib::config::BuildConfiguration;
use dbd_lib::execute::RunError;
use dbd_lib::output::MergeError;
use serde_yaml::Value;

use super::common::{DEMO_CONFIG, FakeEngine, FakeFetcher, demo_config, demo_env};

fn read_yaml(path: &std::path::Path) -> Value {
  serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn demo_output_references_both_images() {
  let env = demo_env();
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));

  let completed = orchestrator.execute(&demo_config(), &env.output_path()).unwrap();
  let dir = completed.output_dir;

  let compose = read_yaml(&dir.join("docker-compose.yaml"));
  assert_eq!(compose["version"], Value::from("3"));
  assert_eq!(compose["services"]["base"]["image"], Value::from("dbd/base:1.0"));
  assert_eq!(compose["services"]["app"]["image"], Value::from("dbd/app:2.0_base1.0"));
  assert_eq!(
    compose["services"]["app"]["environment"]["BASE_IMAGE"],
    Value::from("dbd/base:1.0")
  );

  let config = std::fs::read_to_string(dir.join("compose-config")).unwrap();
  assert!(config.contains("# base\nBASE-SITE.XML_base.setting=1\n"));
  assert!(config.contains("# app\nAPP-SITE.XML_app.setting=2\n"));
  assert!(!config.contains("app settings"));

  let env_file = std::fs::read_to_string(dir.join(".env")).unwrap();
  assert_eq!(env_file, "BASE_IMAGE=dbd/base:1.0\nAPP_IMAGE=dbd/app:2.0_base1.0\n");

  let report = read_yaml(&dir.join("output_configuration.yaml"));
  assert_eq!(report["name"], Value::from("demo"));
  assert_eq!(report["success"], Value::from(true));
  assert_eq!(report["components"]["base"]["dist"], Value::from("release"));
  assert_eq!(report["components"]["app"]["version"], Value::from("2.0"));
}

#[test]
fn repeated_runs_never_share_a_directory() {
  let env = demo_env();
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));

  let first = orchestrator.execute(&demo_config(), &env.output_path()).unwrap();
  let second = orchestrator.execute(&demo_config(), &env.output_path()).unwrap();

  assert_ne!(first.output_dir, second.output_dir);
  assert_eq!(env.output_dirs().len(), 2);
}

#[test]
fn config_values_reference_built_images() {
  let env = demo_env();
  env.write_resource("app/compose-config_part", "APP-SITE.XML_base.image=${BASE_IMAGE}\n");
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));

  let dir = orchestrator.execute(&demo_config(), &env.output_path()).unwrap().output_dir;

  let config = std::fs::read_to_string(dir.join("compose-config")).unwrap();
  assert!(config.contains("# app\nAPP-SITE.XML_base.image=dbd/base:1.0\n"), "{config}");
  assert!(!config.contains("${"));
}

#[test]
fn service_overrides_and_kerberos_reach_the_manifest() {
  let env = demo_env();
  env.write_resource(
    "base/kerberos/assembly.yaml",
    "url: https://example.invalid/base/base-{version}.tar.gz\n",
  );
  env.write_resource("base/kerberos/docker_context/Dockerfile", "FROM scratch\n");
  env.write_resource(
    "base/kerberos/docker-compose_part.yaml",
    "services:\n  base:\n    image: ${BASE_IMAGE}\n    environment:\n      SECURE: 'true'\n      MODE: default\n",
  );
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));
  let config = BuildConfiguration::load(&format!(
    "kerberos: true\n{DEMO_CONFIG}    services:\n      app:\n        ports: ['8080:8080']\n"
  ))
  .unwrap();

  let dir = orchestrator.execute(&config, &env.output_path()).unwrap().output_dir;
  let compose = read_yaml(&dir.join("docker-compose.yaml"));

  assert_eq!(compose["services"]["krb5"]["image"], Value::from("flokkr/krb5"));
  assert_eq!(compose["services"]["base"]["environment"]["SECURE"], Value::from("true"));
  assert_eq!(compose["services"]["app"]["ports"][0], Value::from("8080:8080"));
  assert_eq!(compose["services"]["app"]["image"], Value::from("dbd/app:2.0_base1.0"));
}

#[test]
fn override_of_undeclared_service_is_a_merge_error() {
  let env = demo_env();
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));
  let config = BuildConfiguration::load(&format!(
    "{DEMO_CONFIG}    services:\n      missing:\n        ports: ['1:1']\n"
  ))
  .unwrap();

  let err = orchestrator.execute(&config, &env.output_path()).unwrap_err();

  assert!(matches!(
    err,
    RunError::Merge(MergeError::UnknownService { ref component, ref service })
      if component == "app" && service == "missing"
  ));
  assert_eq!(err.exit_code(), 6);
  assert!(env.output_dirs().is_empty());
}

#[test]
fn duplicate_service_is_a_merge_error() {
  let env = demo_env();
  env.write_resource(
    "app/docker-compose_part.yaml",
    "services:\n  base:\n    image: ${APP_IMAGE}\n",
  );
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));

  let err = orchestrator.execute(&demo_config(), &env.output_path()).unwrap_err();

  assert!(matches!(
    err,
    RunError::Merge(MergeError::DuplicateDefinition { ref key, .. }) if key == "base"
  ));
}

#[test]
fn support_scripts_are_copied() {
  let env = demo_env();
  env.write_resource("app/scripts/init.sh", "#!/bin/sh\necho ready\n");
  let orchestrator = env.orchestrator(Arc::new(FakeEngine::default()), Arc::new(FakeFetcher::default()));

  let dir = orchestrator
    .execute(&demo_config(), &env.output_path())
    .unwrap()
    .output_dir;

  assert_eq!(
    std::fs::read_to_string(dir.join("app").join("init.sh")).unwrap(),
    "#!/bin/sh\necho ready\n"
  );
  assert!(!dir.join("base").exists());
}
