//! The assembly pipeline.
//!
//! Stage, compile, test, package, clean up. Stages run strictly one after the
//! other; the first fatal error stops the run. The staging area is removed on
//! every exit path, and a cleanup failure never hides an earlier error.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::compile::{CompilationError, SearchPath, compile_groups};
use crate::package::{PackagingError, write_archive};
use crate::process::ProcessRunner;
use crate::registry::Registry;
use crate::stage::{CleanupError, StagingArea, StagingError, StagingLocation};
use crate::test_runner::{TestFailure, TestReport, discover_units, run_tests, run_verification};
use crate::toolchain::Toolchain;

/// Any fatal pipeline error.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("usage error: {0}")]
  Usage(String),

  #[error("staging error: {0}")]
  Staging(#[from] StagingError),

  #[error("compilation error: {0}")]
  Compilation(#[from] CompilationError),

  #[error("test failure: {0}")]
  Test(#[from] TestFailure),

  #[error("packaging error: {0}")]
  Packaging(#[from] PackagingError),

  #[error("cleanup error: {0}")]
  Cleanup(#[from] CleanupError),

  #[error("interrupted")]
  Interrupted,
}

impl PipelineError {
  /// Short machine-readable kind, used in JSON output.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Usage(_) => "UsageError",
      Self::Staging(_) => "StagingError",
      Self::Compilation(_) => "CompilationError",
      Self::Test(_) => "TestFailure",
      Self::Packaging(_) => "PackagingError",
      Self::Cleanup(_) => "CleanupError",
      Self::Interrupted => "Interrupted",
    }
  }
}

/// Everything a run needs besides the registry and the runner.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
  /// Directory the registry's source paths are relative to; compiler and
  /// harness run here.
  pub workdir: PathBuf,
  /// Destination of the finished archive.
  pub output: PathBuf,
  pub staging: StagingLocation,
  pub toolchain: Toolchain,
}

impl AssembleOptions {
  /// Options for `archive_name` written next to `workdir` (`../<name>`),
  /// staged in a unique directory inside `workdir`.
  pub fn new(workdir: impl Into<PathBuf>, archive_name: &str) -> Result<Self, PipelineError> {
    let workdir = workdir.into();
    let output = workdir.join("..").join(validate_archive_name(archive_name)?);
    Ok(Self {
      staging: StagingLocation::Unique {
        parent: workdir.clone(),
      },
      workdir,
      output,
      toolchain: Toolchain::default(),
    })
  }
}

/// Check that `name` is a bare file name.
pub fn validate_archive_name(name: &str) -> Result<&str, PipelineError> {
  if name.trim().is_empty() {
    return Err(PipelineError::Usage("archive name must not be empty".to_string()));
  }
  if name.contains(['/', '\\']) || name == "." || name == ".." {
    return Err(PipelineError::Usage(format!(
      "archive name `{}` must be a file name, not a path",
      name
    )));
  }
  Ok(name)
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
  pub archive: PathBuf,
  pub archive_bytes: u64,
  pub entries: Vec<String>,
  pub compiled_groups: Vec<String>,
  pub test_units: Vec<String>,
  #[serde(skip)]
  pub test_report: String,
  pub search_path: Vec<PathBuf>,
  #[serde(with = "duration_millis", rename = "duration_ms")]
  pub duration: Duration,
}

mod duration_millis {
  use std::time::Duration;

  use serde::Serializer;

  pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
  }
}

/// Run the whole pipeline until it finishes or `shutdown` resolves.
///
/// When `shutdown` wins, the running stage is dropped (child processes are
/// killed) and the run fails with [`PipelineError::Interrupted`]. Cleanup runs
/// in every case.
pub async fn assemble<R, S>(
  registry: &Registry,
  options: &AssembleOptions,
  runner: &R,
  shutdown: S,
) -> Result<AssemblyReport, PipelineError>
where
  R: ProcessRunner,
  S: Future<Output = ()>,
{
  let started = Instant::now();
  let staging = StagingArea::create(&options.staging, registry, &options.workdir)?;

  let outcome = tokio::select! {
    result = run_stages(registry, options, runner, &staging) => result,
    () = shutdown => {
      warn!("shutdown requested, aborting");
      Err(PipelineError::Interrupted)
    }
  };

  let cleanup = staging.cleanup();
  if let (Ok(report), Err(_)) = (&outcome, &cleanup) {
    discard_archive(&report.archive);
  }
  let mut report = settle(outcome, cleanup)?;
  report.duration = started.elapsed();
  info!(archive = %report.archive.display(), "assembly complete");
  Ok(report)
}

/// Combine a run's outcome with its cleanup result.
///
/// A stage error wins over a cleanup error, which is only logged; with no
/// stage error the cleanup error is the result.
fn settle<T>(outcome: Result<T, PipelineError>, cleanup: Result<(), CleanupError>) -> Result<T, PipelineError> {
  match (outcome, cleanup) {
    (Ok(value), Ok(())) => Ok(value),
    (Ok(_), Err(cleanup)) => Err(cleanup.into()),
    (Err(e), Ok(())) => Err(e),
    (Err(e), Err(cleanup)) => {
      error!(error = %cleanup, "staging cleanup failed after an earlier error");
      Err(e)
    }
  }
}

/// A run that fails, even only in cleanup, leaves no archive behind.
fn discard_archive(path: &Path) {
  match std::fs::remove_file(path) {
    Ok(()) => warn!(archive = %path.display(), "removed archive of a run that failed cleanup"),
    Err(e) => error!(archive = %path.display(), error = %e, "failed to remove archive"),
  }
}

async fn run_stages<R: ProcessRunner>(
  registry: &Registry,
  options: &AssembleOptions,
  runner: &R,
  staging: &StagingArea,
) -> Result<AssemblyReport, PipelineError> {
  let workdir = options.workdir.as_path();
  let toolchain = &options.toolchain;

  let staged = staging.stage(registry, workdir)?;

  let search_path = compile_groups(runner, toolchain, workdir, &staged, SearchPath::working_dir()).await?;

  let test_group = registry
    .test_group()
    .and_then(|group| staged.iter().find(|s| s.name == group.name).map(|s| (group, s)));
  let tests = match test_group {
    Some((group, staged_tests)) => {
      let units = discover_units(group, staged_tests)?;
      run_tests(runner, toolchain, workdir, units, &search_path).await?
    }
    None => {
      info!("registry has no test group, skipping tests");
      TestReport::default()
    }
  };
  run_verification(runner, toolchain, workdir).await?;

  let summary = write_archive(&registry.archive_entries(workdir), &options.output)?;

  Ok(AssemblyReport {
    archive: summary.path,
    archive_bytes: summary.bytes,
    entries: summary.entries,
    compiled_groups: staged.into_iter().map(|g| g.name).collect(),
    test_units: tests.units,
    test_report: tests.report,
    search_path: search_path.dirs().to_vec(),
    duration: Duration::ZERO,
  })
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
  #[cfg(unix)]
  {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
      Ok(mut term) => {
        tokio::select! {
          _ = tokio::signal::ctrl_c() => {}
          _ = term.recv() => {}
        }
      }
      Err(e) => {
        warn!(error = %e, "cannot listen for SIGTERM");
        let _ = tokio::signal::ctrl_c().await;
      }
    }
  }

  #[cfg(not(unix))]
  {
    let _ = tokio::signal::ctrl_c().await;
  }
}

/// Never resolves; for runs that cannot be interrupted.
pub fn no_shutdown() -> impl Future<Output = ()> {
  std::future::pending()
}

/// The output path as the user would expect to see it.
pub fn display_output(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
