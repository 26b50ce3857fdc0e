mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbd_lib::consts::{DEFAULT_CACHE_SIZE, DEFAULT_REPOSITORY, RESOURCE_PATH_ENV};
use dbd_lib::execute::RunError;

use cmd::{BuildArgs, cmd_build, cmd_plan};
use output::{OutputFormat, print_error};

/// dbd - build docker images of big-data components and compose them
#[derive(Parser)]
#[command(name = "dbd")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every configured component and write the output directory
  Build {
    /// Path to the build configuration
    config: PathBuf,

    /// Directory receiving `<name>_<timestamp>`
    #[arg(default_value = ".")]
    output_dir: PathBuf,

    /// Rebuild images even if they exist; without names, rebuild all
    #[arg(short, long, num_args = 0.., value_name = "COMPONENT")]
    force: Option<Vec<String>>,

    /// Stage cache directory
    #[arg(short, long)]
    cache: Option<PathBuf>,

    /// Maximum number of files kept in the stage cache
    #[arg(short = 's', long, default_value_t = DEFAULT_CACHE_SIZE)]
    cache_size: usize,

    /// Root of the per-component resource directories
    #[arg(short, long, env = RESOURCE_PATH_ENV, default_value = "resources")]
    resources: PathBuf,

    /// Repository prefix of built image names
    #[arg(long, default_value = DEFAULT_REPOSITORY)]
    repository: String,
  },

  /// Show the build order without building anything
  Plan {
    /// Path to the build configuration
    config: PathBuf,

    /// Root of the per-component resource directories
    #[arg(short, long, env = RESOURCE_PATH_ENV, default_value = "resources")]
    resources: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Build {
      config,
      output_dir,
      force,
      cache,
      cache_size,
      resources,
      repository,
    } => cmd_build(BuildArgs {
      config,
      output_dir,
      force,
      cache,
      cache_size,
      resources,
      repository,
    }),
    Commands::Plan {
      config,
      resources,
      format,
    } => cmd_plan(&config, resources, format),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      let code = err.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
      ExitCode::from(u8::try_from(code).unwrap_or(1))
    }
  }
}
