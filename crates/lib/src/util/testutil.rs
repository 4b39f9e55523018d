//! Test utilities for stagehand-lib.
//!
//! Cross-platform shell helpers plus fake toolchains for pipeline tests.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::process::{Invocation, ProcessOutput, ProcessRunner};

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, content).unwrap();
  path
}

/// A fake toolchain that understands a tiny "language".
///
/// A line `class Name` defines `Name`; a line `uses Name` needs `Name` to be
/// defined by a file in the same compiler call or by a file already present in
/// a search path directory. A line `error` always fails. The harness fails
/// when a file named after a unit contains the line `fail`.
///
/// Every invocation is recorded.
#[derive(Default)]
pub struct FakeToolchain {
  calls: Mutex<Vec<Invocation>>,
  fail_programs: HashSet<String>,
}

impl FakeToolchain {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every call to `program` exit with status 1.
  pub fn failing(mut self, program: &str) -> Self {
    self.fail_programs.insert(program.to_string());
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn programs(&self) -> Vec<String> {
    self
      .calls()
      .iter()
      .map(|c| c.program.to_string_lossy().into_owned())
      .collect()
  }

  fn compile(&self, invocation: &Invocation) -> ProcessOutput {
    let (search_path, files) = split_search_path(&invocation.args);
    let dirs: Vec<PathBuf> = std::env::split_paths(&search_path)
      .map(|d| invocation.cwd.join(d))
      .collect();
    let own: Vec<String> = files.iter().flat_map(|f| definitions(Path::new(f))).collect();

    let mut stderr = String::new();
    for file in &files {
      let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
          stderr.push_str(&format!("{}: {}\n", file.to_string_lossy(), e));
          continue;
        }
      };
      for line in content.lines() {
        if line.trim() == "error" {
          stderr.push_str(&format!("{}: syntax error\n", file.to_string_lossy()));
        }
        if let Some(name) = line.trim().strip_prefix("uses ") {
          let found = own.iter().any(|o| o == name) || dirs.iter().any(|d| defines(d, name));
          if !found {
            stderr.push_str(&format!("{}: cannot find symbol {}\n", file.to_string_lossy(), name));
          }
        }
      }
    }

    ProcessOutput {
      code: Some(if stderr.is_empty() { 0 } else { 1 }),
      stdout: String::new(),
      stderr,
    }
  }

  fn test(&self, invocation: &Invocation) -> ProcessOutput {
    let (search_path, units) = split_search_path(&invocation.args);
    let dirs: Vec<PathBuf> = std::env::split_paths(&search_path).collect();
    let mut report = String::new();
    let mut failures = 0;

    for unit in units.iter().filter_map(|u| u.to_str()) {
      if unit.contains('.') && !dirs.iter().any(|d| has_stem(d, unit)) {
        // harness arguments such as a main class name
        continue;
      }
      let failed = dirs.iter().any(|d| {
        std::fs::read_dir(d)
          .into_iter()
          .flatten()
          .flatten()
          .filter(|e| stem(&e.path()) == unit)
          .any(|e| {
            std::fs::read_to_string(e.path())
              .map(|c| c.lines().any(|l| l.trim() == "fail"))
              .unwrap_or(false)
          })
      });
      if failed {
        failures += 1;
        report.push_str(&format!("{}: FAILED\n", unit));
      } else {
        report.push_str(&format!("{}: OK\n", unit));
      }
    }

    ProcessOutput {
      code: Some(if failures == 0 { 0 } else { 1 }),
      stdout: report,
      stderr: String::new(),
    }
  }
}

impl ProcessRunner for FakeToolchain {
  async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
    self.calls.lock().unwrap().push(invocation.clone());
    let program = invocation.program.to_string_lossy();

    if self.fail_programs.contains(program.as_ref()) {
      return Ok(ProcessOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: format!("{} forced failure", program),
      });
    }

    Ok(match program.as_ref() {
      "javac" => self.compile(invocation),
      "java" => self.test(invocation),
      _ => ProcessOutput {
        code: Some(0),
        ..ProcessOutput::default()
      },
    })
  }
}

/// Splits `-cp <path> rest...` into the path and the remaining arguments.
fn split_search_path(args: &[OsString]) -> (OsString, Vec<OsString>) {
  match args.iter().position(|a| a == "-cp") {
    Some(i) if i + 1 < args.len() => {
      let rest = args[i + 2..].to_vec();
      (args[i + 1].clone(), rest)
    }
    _ => (OsString::new(), args.to_vec()),
  }
}

fn stem(path: &Path) -> String {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .map(|n| n.split('.').next().unwrap_or(n).to_string())
    .unwrap_or_default()
}

fn has_stem(dir: &Path, name: &str) -> bool {
  std::fs::read_dir(dir)
    .into_iter()
    .flatten()
    .flatten()
    .any(|e| e.path().is_file() && stem(&e.path()) == name)
}

fn definitions(file: &Path) -> Vec<String> {
  std::fs::read_to_string(file)
    .unwrap_or_default()
    .lines()
    .filter_map(|l| l.trim().strip_prefix("class ").map(|n| n.trim().to_string()))
    .collect()
}

/// Whether any file directly inside `dir` defines `name`.
fn defines(dir: &Path, name: &str) -> bool {
  std::fs::read_dir(dir)
    .into_iter()
    .flatten()
    .flatten()
    .filter(|e| e.path().is_file())
    .any(|e| definitions(&e.path()).iter().any(|d| d == name))
}
