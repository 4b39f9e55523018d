//! Group compilation.
//!
//! Groups compile one at a time, in registry order, with one compiler call per
//! group. Each successful call yields a longer [`SearchPath`] so later groups
//! can resolve what earlier groups defined.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::process::ProcessRunner;
use crate::stage::StagedGroup;
use crate::toolchain::Toolchain;

/// Ordered directories consulted to resolve references across groups.
///
/// The value is never mutated in place: [`SearchPath::with`] returns the
/// extended path, which keeps the order each stage saw observable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPath {
  dirs: Vec<PathBuf>,
}

impl SearchPath {
  /// The search path every build starts from: the working directory.
  pub fn working_dir() -> Self {
    Self {
      dirs: vec![PathBuf::from(".")],
    }
  }

  pub fn from_dirs<I, P>(dirs: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
  {
    Self {
      dirs: dirs.into_iter().map(Into::into).collect(),
    }
  }

  /// A new search path with `dir` appended.
  pub fn with(&self, dir: impl Into<PathBuf>) -> Self {
    let mut dirs = self.dirs.clone();
    dirs.push(dir.into());
    Self { dirs }
  }

  pub fn dirs(&self) -> &[PathBuf] {
    &self.dirs
  }

  pub fn contains(&self, dir: &Path) -> bool {
    self.dirs.iter().any(|d| d == dir)
  }

  /// Join with the platform path separator (`:` on unix, `;` on windows).
  pub fn join(&self) -> Result<OsString, std::env::JoinPathsError> {
    std::env::join_paths(&self.dirs)
  }
}

/// Errors raised while compiling a group.
#[derive(Debug, Error)]
pub enum CompilationError {
  #[error("compilation of group `{group}` failed with exit code {code:?}:\n{diagnostics}")]
  Failed {
    group: String,
    code: Option<i32>,
    diagnostics: String,
  },

  #[error("failed to run compiler `{program}` for group `{group}`: {source}")]
  Spawn {
    group: String,
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("compiler timed out on group `{group}`: {source}")]
  TimedOut {
    group: String,
    #[source]
    source: io::Error,
  },

  #[error("search path for group `{group}` cannot be joined: {source}")]
  SearchPath {
    group: String,
    #[source]
    source: std::env::JoinPathsError,
  },
}

impl CompilationError {
  pub fn group(&self) -> &str {
    match self {
      Self::Failed { group, .. }
      | Self::Spawn { group, .. }
      | Self::TimedOut { group, .. }
      | Self::SearchPath { group, .. } => group,
    }
  }
}

/// Compile a single group against `search_path`.
pub async fn compile_group<R: ProcessRunner>(
  runner: &R,
  toolchain: &Toolchain,
  cwd: &Path,
  group: &StagedGroup,
  search_path: &SearchPath,
) -> Result<(), CompilationError> {
  let joined = search_path.join().map_err(|source| CompilationError::SearchPath {
    group: group.name.clone(),
    source,
  })?;

  info!(group = %group.name, files = group.files.len(), search_path = ?joined, "compiling group");
  let invocation = toolchain.compile(cwd, joined, &group.files);

  let output = runner.run(&invocation).await.map_err(|source| {
    if source.kind() == io::ErrorKind::TimedOut {
      CompilationError::TimedOut {
        group: group.name.clone(),
        source,
      }
    } else {
      CompilationError::Spawn {
        group: group.name.clone(),
        program: toolchain.compiler.clone(),
        source,
      }
    }
  })?;

  if !output.success() {
    error!(group = %group.name, code = ?output.code, "compilation failed");
    return Err(CompilationError::Failed {
      group: group.name.clone(),
      code: output.code,
      diagnostics: output.diagnostics(),
    });
  }

  Ok(())
}

/// Compile every group in order, returning the final search path.
///
/// The first failure stops the run; later groups are never attempted.
pub async fn compile_groups<R: ProcessRunner>(
  runner: &R,
  toolchain: &Toolchain,
  cwd: &Path,
  groups: &[StagedGroup],
  base: SearchPath,
) -> Result<SearchPath, CompilationError> {
  let mut search_path = base;
  for group in groups {
    compile_group(runner, toolchain, cwd, group, &search_path).await?;
    search_path = search_path.with(&group.dest_dir);
  }
  Ok(search_path)
}
