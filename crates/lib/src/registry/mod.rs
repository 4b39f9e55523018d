//! File-group registry.
//!
//! The registry is an immutable, explicitly constructed value describing which
//! files take part in a build. It is validated once at construction, so later
//! stages can rely on its shape.

mod types;

use std::collections::HashMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use types::{ArchiveEntry, FileGroup, GroupRole, RegistryError};

/// On-disk representation of a registry.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
  groups: Vec<FileGroup>,
}

/// Ordered, validated list of file groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registry {
  groups: Vec<FileGroup>,
}

impl Registry {
  /// Build a registry, validating group names, includes and layouts.
  pub fn new(groups: Vec<FileGroup>) -> Result<Self, RegistryError> {
    validate(&groups)?;
    Ok(Self { groups })
  }

  /// The conventional two-group layout: `src/main/<lang>` staged under `src`
  /// followed by `src/test/<lang>` staged under `test`.
  #[cfg(test)]
  pub fn conventional<S, T>(lang: &str, sources: S, tests: T) -> Result<Self, RegistryError>
  where
    S: IntoIterator,
    S::Item: Into<String>,
    T: IntoIterator,
    T::Item: Into<String>,
  {
    let sources = FileGroup::new("sources", Path::new("src").join("main").join(lang), "src").include_all(sources);
    let tests = FileGroup::new("tests", Path::new("src").join("test").join(lang), "test")
      .with_role(GroupRole::Test)
      .with_unit_suffix(format!(".{}", lang))
      .include_all(tests);
    Self::new(vec![sources, tests])
  }

  pub fn from_json_str(content: &str, origin: &Path) -> Result<Self, RegistryError> {
    let file: RegistryFile = serde_json::from_str(content).map_err(|source| RegistryError::Parse {
      path: origin.to_path_buf(),
      source,
    })?;
    Self::new(file.groups)
  }

  /// Load a registry from a JSON file.
  pub fn load(path: &Path) -> Result<Self, RegistryError> {
    info!(path = %path.display(), "loading registry");
    let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let registry = Self::from_json_str(&content, path)?;
    debug!(groups = registry.groups.len(), "registry loaded");
    Ok(registry)
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&RegistryFile {
      groups: self.groups.clone(),
    })
  }

  pub fn groups(&self) -> &[FileGroup] {
    &self.groups
  }

  pub fn test_group(&self) -> Option<&FileGroup> {
    self.groups.iter().find(|g| g.is_test())
  }

  /// Total number of included files across all groups.
  pub fn file_count(&self) -> usize {
    self.groups.iter().map(|g| g.includes.len()).sum()
  }

  /// Archive entries in registry order, then include order within a group.
  ///
  /// Sources are resolved against `root` and always point at the originals.
  pub fn archive_entries(&self, root: &Path) -> Vec<ArchiveEntry> {
    self
      .groups
      .iter()
      .flat_map(|group| {
        let source_dir = group.source_dir_in(root);
        group.includes.iter().map(move |file| ArchiveEntry {
          source: source_dir.join(file),
          archive_path: group.archive_path(file),
        })
      })
      .collect()
  }
}

fn validate(groups: &[FileGroup]) -> Result<(), RegistryError> {
  if groups.is_empty() {
    return Err(RegistryError::Empty);
  }

  let mut names: Vec<&str> = Vec::with_capacity(groups.len());
  let mut archive_paths: HashMap<String, &str> = HashMap::new();
  let mut test_group: Option<&str> = None;

  for group in groups {
    if group.name.trim().is_empty() {
      return Err(RegistryError::EmptyName);
    }
    if names.contains(&group.name.as_str()) {
      return Err(RegistryError::DuplicateGroup(group.name.clone()));
    }
    names.push(&group.name);

    if group.is_test() {
      if let Some(first) = test_group {
        return Err(RegistryError::MultipleTestGroups {
          first: first.to_string(),
          second: group.name.clone(),
        });
      }
      test_group = Some(&group.name);
    }

    if !is_relative_layout(&group.dest_layout) {
      return Err(RegistryError::InvalidLayout {
        group: group.name.clone(),
        layout: group.dest_layout.clone(),
      });
    }

    if group.includes.is_empty() {
      return Err(RegistryError::NoIncludes(group.name.clone()));
    }

    for (i, file) in group.includes.iter().enumerate() {
      if !is_plain_file_name(file) {
        return Err(RegistryError::InvalidInclude {
          group: group.name.clone(),
          file: file.clone(),
        });
      }
      if group.includes[..i].contains(file) {
        return Err(RegistryError::DuplicateInclude {
          group: group.name.clone(),
          file: file.clone(),
        });
      }
      let path = group.archive_path(file);
      if let Some(first) = archive_paths.insert(path.clone(), &group.name) {
        return Err(RegistryError::ArchiveCollision {
          path,
          first: first.to_string(),
          second: group.name.clone(),
        });
      }
    }
  }

  Ok(())
}

fn is_plain_file_name(file: &str) -> bool {
  let mut components = Path::new(file).components();
  matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none() && !file.contains(['/', '\\'])
}

fn is_relative_layout(layout: &str) -> bool {
  Path::new(layout)
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    && !layout.starts_with(['/', '\\'])
}
