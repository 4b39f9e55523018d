//! Types for the file-group registry.
//!
//! A registry is an ordered list of [`FileGroup`]s. The order is significant:
//! it is the staging order, the compilation dependency order, and the order in
//! which entries are written to the archive.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a group contributes to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
  /// Compiled and packaged, never handed to the test harness.
  #[default]
  Source,
  /// Compiled and packaged; its units are handed to the test harness.
  Test,
}

/// One class of files that are staged, compiled and packaged together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
  /// Human-readable group name, used in logs and error messages.
  pub name: String,

  #[serde(default)]
  pub role: GroupRole,

  /// Directory holding the original files, relative to the working directory
  /// unless absolute.
  pub source_dir: PathBuf,

  /// Relative prefix the files are placed under, both in the staging area and
  /// in the archive.
  pub dest_layout: String,

  /// File names to include, in order.
  pub includes: Vec<String>,

  /// Only includes ending with this suffix are treated as test units.
  /// When unset every include of a test group is a unit.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unit_suffix: Option<String>,
}

impl FileGroup {
  pub fn new(name: impl Into<String>, source_dir: impl Into<PathBuf>, dest_layout: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      role: GroupRole::Source,
      source_dir: source_dir.into(),
      dest_layout: dest_layout.into(),
      includes: Vec::new(),
      unit_suffix: None,
    }
  }

  pub fn with_role(mut self, role: GroupRole) -> Self {
    self.role = role;
    self
  }

  pub fn with_unit_suffix(mut self, suffix: impl Into<String>) -> Self {
    self.unit_suffix = Some(suffix.into());
    self
  }

  pub fn include(mut self, file: impl Into<String>) -> Self {
    self.includes.push(file.into());
    self
  }

  pub fn include_all<I, S>(mut self, files: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.includes.extend(files.into_iter().map(Into::into));
    self
  }

  pub fn is_test(&self) -> bool {
    self.role == GroupRole::Test
  }

  /// The directory holding the originals, resolved against `root`.
  pub fn source_dir_in(&self, root: &Path) -> PathBuf {
    root.join(&self.source_dir)
  }

  /// `dest_layout` with `.` segments and empty segments dropped, joined by `/`.
  ///
  /// `"./src/"`, `"src"` and `"src/."` all name the same layout, `"src"`.
  pub fn layout(&self) -> String {
    Path::new(&self.dest_layout)
      .components()
      .filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy()),
        _ => None,
      })
      .collect::<Vec<_>>()
      .join("/")
  }

  /// Path of an include inside the archive (always `/`-separated).
  pub fn archive_path(&self, file: &str) -> String {
    let layout = self.layout();
    if layout.is_empty() {
      file.to_string()
    } else {
      format!("{}/{}", layout, file)
    }
  }

  /// Whether `file` is one of this group's test units.
  pub fn is_unit(&self, file: &str) -> bool {
    self.is_test()
      && self.includes.iter().any(|f| f == file)
      && self.unit_suffix.as_deref().is_none_or(|suffix| file.ends_with(suffix))
  }
}

/// A file to be written into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
  /// The original file, read at packaging time.
  pub source: PathBuf,
  /// Where the file lives inside the archive.
  pub archive_path: String,
}

/// Errors raised while building or loading a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("registry declares no file groups")]
  Empty,

  #[error("file group name must not be empty")]
  EmptyName,

  #[error("duplicate file group name: {0}")]
  DuplicateGroup(String),

  #[error("file group `{0}` has no includes")]
  NoIncludes(String),

  #[error("file group `{group}` includes `{file}` more than once")]
  DuplicateInclude { group: String, file: String },

  #[error("file group `{group}` include `{file}` must be a plain file name")]
  InvalidInclude { group: String, file: String },

  #[error("file group `{group}` has invalid destination layout `{layout}`")]
  InvalidLayout { group: String, layout: String },

  #[error("archive path `{path}` is produced by both `{first}` and `{second}`")]
  ArchiveCollision { path: String, first: String, second: String },

  #[error("only one test group is supported, found `{first}` and `{second}`")]
  MultipleTestGroups { first: String, second: String },

  #[error("failed to read registry file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse registry file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}
