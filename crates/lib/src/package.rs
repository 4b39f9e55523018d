//! Archive packaging.
//!
//! The archive is built from the original files, never from staged copies.
//! It is written to a temporary file next to the destination and only moved
//! into place once complete, so a failed run leaves no artifact behind.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::registry::ArchiveEntry;
use crate::util::fs::unix_mode;

/// Errors raised while writing the archive.
#[derive(Debug, Error)]
pub enum PackagingError {
  #[error("output directory {path} does not exist")]
  OutputDir { path: PathBuf },

  #[error("failed to create archive in {dir}: {source}")]
  Create {
    dir: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("source file vanished before packaging: {path}")]
  SourceVanished { path: PathBuf },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write archive entry {entry}: {source}")]
  Zip {
    entry: String,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("failed to move archive into place at {path}: {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Summary of a written archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
  pub path: PathBuf,
  pub entries: Vec<String>,
  pub bytes: u64,
}

/// Write `entries`, in order, to a zip archive at `output`.
///
/// Every source is checked again right before it is added.
pub fn write_archive(entries: &[ArchiveEntry], output: &Path) -> Result<ArchiveSummary, PackagingError> {
  let dir = match output.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  if !dir.is_dir() {
    return Err(PackagingError::OutputDir { path: dir });
  }

  info!(path = %output.display(), entries = entries.len(), "writing archive");

  let temp = tempfile::Builder::new()
    .prefix(".stagehand-archive-")
    .tempfile_in(&dir)
    .map_err(|source| PackagingError::Create {
      dir: dir.clone(),
      source,
    })?;

  let file = temp.reopen().map_err(|source| PackagingError::Create {
    dir: dir.clone(),
    source,
  })?;
  let mut zip = ZipWriter::new(BufWriter::new(file));

  let mut names = Vec::with_capacity(entries.len());
  for entry in entries {
    add_entry(&mut zip, entry)?;
    names.push(entry.archive_path.clone());
  }

  let mut writer = zip.finish().map_err(|source| PackagingError::Zip {
    entry: "<central directory>".to_string(),
    source,
  })?;
  io::Write::flush(&mut writer).map_err(|source| PackagingError::Persist {
    path: output.to_path_buf(),
    source,
  })?;
  drop(writer);

  temp.persist(output).map_err(|e| PackagingError::Persist {
    path: output.to_path_buf(),
    source: e.error,
  })?;

  let bytes = fs::metadata(output).map(|m| m.len()).unwrap_or_default();
  info!(path = %output.display(), bytes, "archive written");

  Ok(ArchiveSummary {
    path: output.to_path_buf(),
    entries: names,
    bytes,
  })
}

fn add_entry<W: io::Write + io::Seek>(zip: &mut ZipWriter<W>, entry: &ArchiveEntry) -> Result<(), PackagingError> {
  let metadata = match fs::metadata(&entry.source) {
    Ok(metadata) if metadata.is_file() => metadata,
    Ok(_) => {
      return Err(PackagingError::SourceVanished {
        path: entry.source.clone(),
      });
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(PackagingError::SourceVanished {
        path: entry.source.clone(),
      });
    }
    Err(source) => {
      return Err(PackagingError::Read {
        path: entry.source.clone(),
        source,
      });
    }
  };

  let mut source = File::open(&entry.source).map_err(|source| PackagingError::Read {
    path: entry.source.clone(),
    source,
  })?;

  // Fixed timestamp (the zip epoch) keeps archives reproducible.
  let mut options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default());
  if let Some(mode) = unix_mode(&metadata) {
    options = options.unix_permissions(mode);
  }

  debug!(from = %entry.source.display(), to = %entry.archive_path, "adding");
  zip
    .start_file(entry.archive_path.as_str(), options)
    .map_err(|source| PackagingError::Zip {
      entry: entry.archive_path.clone(),
      source,
    })?;
  io::copy(&mut source, zip).map_err(|source| PackagingError::Read {
    path: entry.source.clone(),
    source,
  })?;

  Ok(())
}
