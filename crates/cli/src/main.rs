mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use stagehand_lib::toolchain::{DEFAULT_COMPILER, DEFAULT_HARNESS, DEFAULT_HARNESS_MAIN, DEFAULT_SEARCH_PATH_FLAG};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// Stage, compile, test and package a project's sources into a zip archive
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  /// Name of the archive, written next to the working directory (../<NAME>)
  pub archive: String,

  /// Registry file describing the file groups (relative to the working directory)
  #[arg(long, default_value = "stagehand.json")]
  pub registry: PathBuf,

  /// Working directory holding the sources (default: current directory)
  #[arg(short = 'C', long)]
  pub workdir: Option<PathBuf>,

  /// Use this staging directory instead of a fresh unique one; it is removed afterwards
  #[arg(long)]
  pub staging_dir: Option<PathBuf>,

  /// Write the archive into this directory instead of the working directory's parent
  #[arg(long)]
  pub out_dir: Option<PathBuf>,

  /// Compiler program, invoked once per file group
  #[arg(long, default_value = DEFAULT_COMPILER)]
  pub compiler: String,

  /// Extra argument passed to the compiler before the search path (repeatable)
  #[arg(long = "compiler-arg", allow_hyphen_values = true)]
  pub compiler_args: Vec<String>,

  /// Flag introducing the search path for the compiler and the test harness
  #[arg(long, default_value = DEFAULT_SEARCH_PATH_FLAG, allow_hyphen_values = true)]
  pub search_path_flag: String,

  /// Test harness program
  #[arg(long, default_value = DEFAULT_HARNESS)]
  pub harness: String,

  /// Entry point passed to the harness before the test units (empty to omit)
  #[arg(long, default_value = DEFAULT_HARNESS_MAIN)]
  pub harness_main: String,

  /// Also run `mvn clean test -B` in the working directory after the tests
  #[arg(long)]
  pub maven: bool,

  /// Abort any single tool invocation after this long (e.g. "90s", "10m")
  #[arg(long, value_parser = humantime::parse_duration)]
  pub tool_timeout: Option<Duration>,

  /// Show what would be staged, compiled and archived without running anything
  #[arg(long)]
  pub plan: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,

  /// Enable verbose logging
  #[arg(short, long)]
  pub verbose: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cmd::run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::report_failure(&err, cli.output);
      ExitCode::FAILURE
    }
  }
}
