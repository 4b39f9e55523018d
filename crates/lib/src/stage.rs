//! Staging area management.
//!
//! The staging area is a disposable directory holding copies of every
//! registered file, laid out by destination. It is owned by a single pipeline
//! run and removed when the run ends, whichever way it ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::registry::{FileGroup, GroupRole, Registry};
use crate::util::fs::{copy_preserving, list_files, resolve};

const STAGING_PREFIX: &str = ".stagehand-";

/// Written into every caller-scoped root; only roots carrying it are reused.
const ROOT_MARKER: &str = ".stagehand-root";

/// Where the staging root lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingLocation {
  /// A fresh directory with a random name under `parent`, unique per run.
  Unique { parent: PathBuf },
  /// A caller-chosen directory. An existing directory is reused only if an
  /// earlier run created it; its stale contents are then removed.
  At(PathBuf),
}

/// Errors raised while preparing the staging area.
#[derive(Debug, Error)]
pub enum StagingError {
  #[error("failed to create staging root {path}: {source}")]
  CreateRoot {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("refusing to use {path} as staging root: it contains the working directory")]
  UnsafeRoot { path: PathBuf },

  #[error("refusing to use {path} as staging root: it overlaps the sources of group `{group}`")]
  OverlapsSource { path: PathBuf, group: String },

  #[error("refusing to reuse {path} as staging root: it already exists and was not created by stagehand")]
  ForeignRoot { path: PathBuf },

  #[error("source file missing for group `{group}`: {path}")]
  MissingSource { group: String, path: PathBuf },

  #[error("failed to create destination {path} for group `{group}`: {source}")]
  CreateDest {
    group: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Failure to remove the staging area.
#[derive(Debug, Error)]
#[error("failed to remove staging directory {path}: {source}")]
pub struct CleanupError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

/// Staged copies of one group, in include order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedGroup {
  pub name: String,
  pub role: GroupRole,
  /// Absolute `staging_root/dest_layout`.
  pub dest_dir: PathBuf,
  /// Absolute staged paths, in include order.
  pub files: Vec<PathBuf>,
}

impl StagedGroup {
  pub fn is_test(&self) -> bool {
    self.role == GroupRole::Test
  }
}

enum Root {
  Unique(tempfile::TempDir),
  Scoped(PathBuf),
}

/// An exclusively owned staging directory.
///
/// Call [`StagingArea::cleanup`] to remove it and observe failures. If the
/// area is dropped first (an early return, a panic, a cancelled future) the
/// directory is still removed and failures are logged.
pub struct StagingArea {
  root: Option<Root>,
  path: PathBuf,
}

impl StagingArea {
  /// Create the staging root.
  ///
  /// `workdir` is the directory the registry's source paths are relative to.
  /// Cleanup removes the whole root, so a caller-scoped root may neither
  /// contain the working directory nor overlap any group's sources, and an
  /// existing directory is only reused when it carries the stagehand marker.
  pub fn create(location: &StagingLocation, registry: &Registry, workdir: &Path) -> Result<Self, StagingError> {
    let (root, path) = match location {
      StagingLocation::Unique { parent } => {
        let temp = tempfile::Builder::new()
          .prefix(STAGING_PREFIX)
          .tempdir_in(parent)
          .map_err(|source| StagingError::CreateRoot {
            path: parent.clone(),
            source,
          })?;
        let path = temp.path().to_path_buf();
        (Root::Unique(temp), path)
      }
      StagingLocation::At(path) => {
        create_scoped(path, registry, workdir)?;
        (Root::Scoped(path.clone()), path.clone())
      }
    };

    let path = dunce::canonicalize(&path).unwrap_or(path);
    info!(root = %path.display(), "created staging area");

    Ok(Self { root: Some(root), path })
  }

  pub fn root(&self) -> &Path {
    &self.path
  }

  /// Copy every registered file into the staging area.
  ///
  /// Groups are processed in registry order and files in include order.
  /// Sources are resolved against `workdir`.
  pub fn stage(&self, registry: &Registry, workdir: &Path) -> Result<Vec<StagedGroup>, StagingError> {
    registry
      .groups()
      .iter()
      .map(|group| self.stage_group(group, workdir))
      .collect()
  }

  fn stage_group(&self, group: &FileGroup, workdir: &Path) -> Result<StagedGroup, StagingError> {
    let source_dir = group.source_dir_in(workdir);
    let dest_dir = self.path.join(group.layout());

    fs::create_dir_all(&dest_dir).map_err(|source| StagingError::CreateDest {
      group: group.name.clone(),
      path: dest_dir.clone(),
      source,
    })?;

    let mut files = Vec::with_capacity(group.includes.len());
    for file in &group.includes {
      let from = source_dir.join(file);
      if !from.is_file() {
        return Err(StagingError::MissingSource {
          group: group.name.clone(),
          path: from,
        });
      }

      let to = dest_dir.join(file);
      debug!(from = %from.display(), to = %to.display(), "copying");
      copy_preserving(&from, &to).map_err(|source| StagingError::Copy {
        from: from.clone(),
        to: to.clone(),
        source,
      })?;
      files.push(to);
    }

    info!(group = %group.name, files = files.len(), dest = %dest_dir.display(), "staged group");

    Ok(StagedGroup {
      name: group.name.clone(),
      role: group.role,
      dest_dir,
      files,
    })
  }

  /// Every staged file currently under the staging root.
  pub fn files(&self) -> io::Result<Vec<PathBuf>> {
    let marker = self.path.join(ROOT_MARKER);
    Ok(list_files(&self.path)?.into_iter().filter(|p| *p != marker).collect())
  }

  /// Remove the staging root and everything under it.
  pub fn cleanup(mut self) -> Result<(), CleanupError> {
    match self.root.take() {
      Some(root) => remove_root(root, &self.path),
      None => Ok(()),
    }
  }
}

impl Drop for StagingArea {
  fn drop(&mut self) {
    if let Some(root) = self.root.take() {
      warn!(root = %self.path.display(), "staging area dropped before cleanup, removing");
      if let Err(e) = remove_root(root, &self.path) {
        error!(error = %e, "staging cleanup failed");
      }
    }
  }
}

impl std::fmt::Debug for StagingArea {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StagingArea")
      .field("path", &self.path)
      .field("active", &self.root.is_some())
      .finish()
  }
}

fn create_scoped(path: &Path, registry: &Registry, workdir: &Path) -> Result<(), StagingError> {
  let create_err = |source| StagingError::CreateRoot {
    path: path.to_path_buf(),
    source,
  };

  let root = resolve(path);
  let workdir = resolve(workdir);
  if workdir.starts_with(&root) {
    return Err(StagingError::UnsafeRoot { path: root });
  }
  for group in registry.groups() {
    let sources = resolve(&group.source_dir_in(&workdir));
    if root.starts_with(&sources) || sources.starts_with(&root) {
      return Err(StagingError::OverlapsSource {
        path: root,
        group: group.name.clone(),
      });
    }
  }

  if fs::symlink_metadata(&root).is_ok() {
    if !root.join(ROOT_MARKER).is_file() {
      return Err(StagingError::ForeignRoot { path: root });
    }
    debug!(root = %root.display(), "clearing stale staging root");
    fs::remove_dir_all(&root).map_err(create_err)?;
  }

  fs::create_dir_all(&root).map_err(create_err)?;
  fs::write(root.join(ROOT_MARKER), "").map_err(create_err)
}

fn remove_root(root: Root, path: &Path) -> Result<(), CleanupError> {
  let result = match root {
    Root::Unique(temp) => temp.close(),
    Root::Scoped(scoped) => match fs::remove_dir_all(&scoped) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      other => other,
    },
  };

  match result {
    Ok(()) => {
      info!(root = %path.display(), "removed staging area");
      Ok(())
    }
    Err(source) => Err(CleanupError {
      path: path.to_path_buf(),
      source,
    }),
  }
}
