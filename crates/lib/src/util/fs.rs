//! Filesystem helpers.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Copy `src` to `dest`, keeping permissions and access/modification times.
///
/// Permissions are carried over by [`fs::copy`]; timestamps are applied
/// afterwards where the platform supports it.
pub fn copy_preserving(src: &Path, dest: &Path) -> io::Result<u64> {
  let bytes = fs::copy(src, dest)?;
  let metadata = fs::metadata(src)?;

  let mut times = FileTimes::new();
  if let Ok(accessed) = metadata.accessed() {
    times = times.set_accessed(accessed);
  }
  if let Ok(modified) = metadata.modified() {
    times = times.set_modified(modified);
  }
  // Owners may set times through a read-only handle on unix, which keeps this
  // working for files copied without write permission.
  #[cfg(unix)]
  let file = File::open(dest)?;
  #[cfg(not(unix))]
  let file = File::options().write(true).open(dest)?;
  file.set_times(times)?;

  Ok(bytes)
}

/// Every regular file under `root`, sorted.
pub fn list_files(root: &Path) -> io::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in WalkDir::new(root).follow_links(false) {
    let entry = entry.map_err(io::Error::other)?;
    if entry.file_type().is_file() {
      files.push(entry.into_path());
    }
  }
  files.sort();
  Ok(files)
}

/// Canonical form of `path`, which need not exist yet.
///
/// The longest existing ancestor is canonicalized and the missing tail is
/// appended as given, so paths can be compared before they are created.
pub fn resolve(path: &Path) -> PathBuf {
  let mut missing = Vec::new();
  let mut existing = path;
  loop {
    if let Ok(canonical) = dunce::canonicalize(existing) {
      return missing.iter().rev().fold(canonical, |acc, part| acc.join(part));
    }
    match (existing.parent(), existing.file_name()) {
      (Some(parent), Some(name)) => {
        missing.push(name.to_os_string());
        existing = parent;
      }
      _ => return path.to_path_buf(),
    }
  }
}

/// Unix permission bits of `path`, if the platform has them.
#[cfg(unix)]
pub fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
  use std::os::unix::fs::PermissionsExt;
  Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
pub fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
  None
}
