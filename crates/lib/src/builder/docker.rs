//! Container engine access.
//!
//! Builders talk to the engine through [`ImageEngine`]; [`DockerCli`] drives the
//! `docker` command line. The binary can be replaced through `DBD_DOCKER`.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, info};

use super::BuildFailure;
use crate::consts::DOCKER_ENV;

pub trait ImageEngine: Send + Sync {
  /// Whether `image` is present in the local image store.
  fn image_exists(&self, image: &str) -> Result<bool, BuildFailure>;

  /// Build `context` into an image tagged `image`.
  fn build_image(&self, context: &Path, image: &str, build_args: &BTreeMap<String, String>) -> Result<(), BuildFailure>;

  /// Run `command` in a throwaway container of `image` and return everything it
  /// printed, stdout followed by stderr.
  fn run_capture(&self, image: &str, command: &str) -> Result<String, BuildFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerCli {
  program: String,
}

impl Default for DockerCli {
  fn default() -> Self {
    Self::new("docker")
  }
}

impl DockerCli {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// `docker`, or the binary named by `DBD_DOCKER`.
  pub fn from_env() -> Self {
    match std::env::var(DOCKER_ENV) {
      Ok(program) if !program.trim().is_empty() => Self::new(program),
      _ => Self::default(),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  fn output(&self, args: &[String]) -> Result<Output, BuildFailure> {
    debug!(program = %self.program, args = ?args, "spawning container engine");
    Command::new(&self.program)
      .args(args)
      .output()
      .map_err(|source| BuildFailure::Spawn {
        program: self.program.clone(),
        source,
      })
  }

  fn run(&self, args: &[String]) -> Result<Output, BuildFailure> {
    let output = self.output(args)?;
    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).to_string();
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      return Err(BuildFailure::Command {
        command: format!("{} {}", self.program, args.join(" ")),
        code: output.status.code(),
        stderr,
      });
    }
    Ok(output)
  }
}

impl ImageEngine for DockerCli {
  fn image_exists(&self, image: &str) -> Result<bool, BuildFailure> {
    let args = ["image", "inspect", "--format", "{{.Id}}", image].map(String::from);
    let exists = self.output(&args)?.status.success();
    debug!(image = %image, exists, "checked local image");
    Ok(exists)
  }

  fn build_image(&self, context: &Path, image: &str, build_args: &BTreeMap<String, String>) -> Result<(), BuildFailure> {
    let mut args = vec!["build".to_string(), "--rm".to_string(), "-t".to_string(), image.to_string()];
    for (key, value) in build_args {
      args.push("--build-arg".to_string());
      args.push(format!("{key}={value}"));
    }
    args.push(context.to_string_lossy().to_string());

    info!(image = %image, "building image");
    self.run(&args)?;
    info!(image = %image, "image built");
    Ok(())
  }

  fn run_capture(&self, image: &str, command: &str) -> Result<String, BuildFailure> {
    let mut args = vec!["run".to_string(), "--rm".to_string(), image.to_string()];
    args.extend(shlex::split(command).ok_or_else(|| BuildFailure::MalformedCommand(command.to_string()))?);

    let output = self.run(&args)?;
    let mut captured = String::from_utf8_lossy(&output.stdout).to_string();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));
    debug!(image = %image, output = %captured.trim(), "command output");
    Ok(captured)
  }
}
