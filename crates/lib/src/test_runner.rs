//! Test discovery and execution.
//!
//! Units are discovered in the staged test destination, never in the working
//! directory, and only files declared as test includes qualify.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::compile::SearchPath;
use crate::process::{Invocation, ProcessRunner};
use crate::registry::FileGroup;
use crate::stage::StagedGroup;
use crate::toolchain::Toolchain;

/// Errors raised while running tests.
#[derive(Debug, Error)]
pub enum TestFailure {
  #[error("tests failed with exit code {code:?}:\n{report}")]
  Failed { code: Option<i32>, report: String },

  #[error("verification `{command}` failed with exit code {code:?}:\n{report}")]
  Verification {
    command: String,
    code: Option<i32>,
    report: String,
  },

  #[error("failed to run `{program}`: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to list test directory {path}: {source}")]
  Discovery {
    path: String,
    #[source]
    source: io::Error,
  },
}

/// Outcome of a passing test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
  /// Units handed to the harness, in include order.
  pub units: Vec<String>,
  /// Harness output.
  pub report: String,
}

/// Find the test units present in the staged test destination.
///
/// A staged file qualifies when its name is one of `group`'s includes (and
/// matches its unit suffix, if any). Units come back in include order, named
/// by file stem.
pub fn discover_units(group: &FileGroup, staged: &StagedGroup) -> Result<Vec<String>, TestFailure> {
  let entries = std::fs::read_dir(&staged.dest_dir).map_err(|source| TestFailure::Discovery {
    path: staged.dest_dir.display().to_string(),
    source,
  })?;

  let mut present = HashSet::new();
  for entry in entries {
    let entry = entry.map_err(|source| TestFailure::Discovery {
      path: staged.dest_dir.display().to_string(),
      source,
    })?;
    if !entry.path().is_file() {
      continue;
    }
    match entry.file_name().into_string() {
      Ok(name) if group.is_unit(&name) => {
        present.insert(name);
      }
      Ok(name) => debug!(file = %name, "ignoring staged file that is not a test unit"),
      Err(name) => debug!(file = ?name, "ignoring staged file with non-utf8 name"),
    }
  }

  Ok(
    group
      .includes
      .iter()
      .filter(|file| present.contains(file.as_str()))
      .map(|file| unit_name(file))
      .collect(),
  )
}

fn unit_name(file: &str) -> String {
  Path::new(file)
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| file.to_string())
}

/// Run the harness once over every unit.
pub async fn run_tests<R: ProcessRunner>(
  runner: &R,
  toolchain: &Toolchain,
  cwd: &Path,
  units: Vec<String>,
  search_path: &SearchPath,
) -> Result<TestReport, TestFailure> {
  if units.is_empty() {
    warn!("no test units discovered, skipping test harness");
    return Ok(TestReport::default());
  }

  let joined = search_path.join().map_err(|e| TestFailure::Spawn {
    program: toolchain.harness.clone(),
    source: io::Error::new(io::ErrorKind::InvalidInput, e),
  })?;

  info!(units = units.len(), "running tests");
  let invocation = toolchain.test(cwd, joined, &units);
  let output = runner.run(&invocation).await.map_err(|source| TestFailure::Spawn {
    program: toolchain.harness.clone(),
    source,
  })?;

  if !output.success() {
    error!(code = ?output.code, "tests failed");
    return Err(TestFailure::Failed {
      code: output.code,
      report: output.diagnostics(),
    });
  }

  info!(units = units.len(), "tests passed");
  Ok(TestReport {
    units,
    report: output.diagnostics(),
  })
}

/// Run the toolchain's verification command, if any.
pub async fn run_verification<R: ProcessRunner>(
  runner: &R,
  toolchain: &Toolchain,
  cwd: &Path,
) -> Result<(), TestFailure> {
  let Some(invocation) = toolchain.verification(cwd) else {
    return Ok(());
  };
  verify(runner, &invocation).await
}

async fn verify<R: ProcessRunner>(runner: &R, invocation: &Invocation) -> Result<(), TestFailure> {
  let command = invocation.command_line();
  info!(cmd = %command, "running verification");

  let output = runner.run(invocation).await.map_err(|source| TestFailure::Spawn {
    program: invocation.program.to_string_lossy().into_owned(),
    source,
  })?;

  if !output.success() {
    return Err(TestFailure::Verification {
      command,
      code: output.code,
      report: output.diagnostics(),
    });
  }
  Ok(())
}
