//! Command implementations.
//!
//! Both modes share the same resolution of the working directory, registry
//! and toolchain from the command line.

mod assemble;
mod plan;

use std::path::PathBuf;

use anyhow::{Context, Result};
use stagehand_lib::stage::StagingLocation;
use stagehand_lib::{AssembleOptions, Registry, Toolchain};
use tracing::debug;

use crate::Cli;

pub use assemble::cmd_assemble;
pub use plan::cmd_plan;

/// Everything a run needs, resolved from the command line.
pub struct Settings {
  pub workdir: PathBuf,
  pub registry: Registry,
  pub options: AssembleOptions,
}

impl Settings {
  pub fn from_cli(cli: &Cli) -> Result<Self> {
    let requested = match &cli.workdir {
      Some(dir) => dir.clone(),
      None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let workdir = dunce::canonicalize(&requested)
      .with_context(|| format!("Working directory not found: {}", requested.display()))?;

    let mut options = AssembleOptions::new(&workdir, &cli.archive)?;
    if let Some(dir) = &cli.out_dir {
      options.output = workdir.join(dir).join(&cli.archive);
    }
    if let Some(dir) = &cli.staging_dir {
      options.staging = StagingLocation::At(workdir.join(dir));
    }
    options.toolchain = toolchain(cli);

    let registry = Registry::load(&workdir.join(&cli.registry))?;
    debug!(workdir = %workdir.display(), output = %options.output.display(), "resolved settings");

    Ok(Self {
      workdir,
      registry,
      options,
    })
  }
}

fn toolchain(cli: &Cli) -> Toolchain {
  let toolchain = Toolchain {
    compiler: cli.compiler.clone(),
    compiler_args: cli.compiler_args.clone(),
    search_path_flag: cli.search_path_flag.clone(),
    harness: cli.harness.clone(),
    harness_args: if cli.harness_main.is_empty() {
      Vec::new()
    } else {
      vec![cli.harness_main.clone()]
    },
    verify: None,
    timeout: cli.tool_timeout,
  };
  if cli.maven { toolchain.with_maven_verify() } else { toolchain }
}

pub fn run(cli: &Cli) -> Result<()> {
  let settings = Settings::from_cli(cli)?;
  if cli.plan {
    cmd_plan(&settings, cli.output)
  } else {
    cmd_assemble(&settings, cli.output)
  }
}
