#![cfg(unix)]

use predicates::prelude::*;

use super::common::TestEnv;

fn demo_config(env: &TestEnv) -> String {
  format!(
    "name: demo\ncomponents:\n  base:\n    snapshot: {}\n  app:\n    snapshot: {}\n",
    env.snapshot("base").display(),
    env.snapshot("app").display()
  )
}

#[test]
fn build_writes_output_directory() {
  let env = TestEnv::new();
  env.component("base", &[]);
  env.component("app", &["base"]);
  let docker = env.fake_docker(None);

  env
    .build_cmd(&demo_config(&env), &docker)
    .assert()
    .success()
    .stdout(predicate::str::contains("Output written to"));

  let dirs = env.output_dirs();
  assert_eq!(dirs.len(), 1);
  let dir = &dirs[0];
  assert!(dir.file_name().unwrap().to_string_lossy().starts_with("demo_"));

  let compose = std::fs::read_to_string(dir.join("docker-compose.yaml")).unwrap();
  assert!(compose.contains("dbd/base:"));
  assert!(compose.contains("dbd/app:"));
  assert!(!compose.contains("${"));

  let config = std::fs::read_to_string(dir.join("compose-config")).unwrap();
  assert!(config.contains("BASE-SITE.XML_key=base"));
  assert!(config.contains("APP-SITE.XML_key=app"));

  let report = std::fs::read_to_string(dir.join("output_configuration.yaml")).unwrap();
  assert!(report.contains("1.2.3"));
  assert!(report.contains("dist: snapshot"));

  // base is built before app, and app is built against base's image
  let calls = env.docker_calls();
  let base_build = calls.find("build --rm -t dbd/base:").unwrap();
  let app_build = calls.find("build --rm -t dbd/app:").unwrap();
  assert!(base_build < app_build);
  assert!(calls.contains("--build-arg BASE_IMAGE=dbd/base:"));
}

#[test]
fn failed_build_exits_with_build_status() {
  let env = TestEnv::new();
  env.component("base", &[]);
  env.component("app", &["base"]);
  let docker = env.fake_docker(Some("dbd/base:"));

  env
    .build_cmd(&demo_config(&env), &docker)
    .assert()
    .code(5)
    .stderr(predicate::str::contains("failed to build 'base'"));

  assert!(!env.docker_calls().contains("dbd/app:"));

  let dirs = env.output_dirs();
  assert_eq!(dirs.len(), 1);
  assert!(dirs[0].join("output_configuration.yaml").is_file());
  assert!(!dirs[0].join("docker-compose.yaml").exists());
}

#[test]
fn missing_version_probe_is_a_build_error() {
  let env = TestEnv::new();
  env.component("base", &[]);
  env.write_file("resources/base/assembly.yaml", "dependencies: []\n");
  let docker = env.fake_docker(None);
  let config = format!(
    "name: demo\ncomponents:\n  base:\n    snapshot: {}\n",
    env.snapshot("base").display()
  );

  env
    .build_cmd(&config, &docker)
    .assert()
    .code(5)
    .stderr(predicate::str::contains("version_command"));

  assert!(env.docker_calls().is_empty());
}

#[test]
fn force_rebuilds_only_named_components() {
  let env = TestEnv::new();
  env.component("base", &[]);
  let docker = env.fake_docker(None);
  let config = format!(
    "name: demo\ncomponents:\n  base:\n    snapshot: {}\n",
    env.snapshot("base").display()
  );

  env
    .build_cmd(&config, &docker)
    .arg("--force")
    .arg("base")
    .assert()
    .success();

  let calls = env.docker_calls();
  assert!(!calls.contains("image inspect"));
  assert!(calls.contains("build --rm -t dbd/base:"));
}
