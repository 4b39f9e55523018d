//! External tools driven by the pipeline.
//!
//! The defaults describe a JDK build: `javac -cp <path> <files>` for each group
//! and `java -cp <path> org.junit.runner.JUnitCore <units>` for the tests.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::Invocation;

pub const DEFAULT_COMPILER: &str = "javac";
pub const DEFAULT_SEARCH_PATH_FLAG: &str = "-cp";
pub const DEFAULT_HARNESS: &str = "java";
pub const DEFAULT_HARNESS_MAIN: &str = "org.junit.runner.JUnitCore";

/// How to invoke the compiler, the test harness and an optional extra check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
  pub compiler: String,
  /// Extra arguments placed before the search path.
  #[serde(default)]
  pub compiler_args: Vec<String>,
  /// Flag introducing the search path for both the compiler and the harness.
  pub search_path_flag: String,
  pub harness: String,
  /// Arguments placed after the search path and before the test units.
  #[serde(default)]
  pub harness_args: Vec<String>,
  /// Command run in the working directory once the harness passed.
  #[serde(default)]
  pub verify: Option<Vec<String>>,
  /// Upper bound for any single tool invocation.
  #[serde(default)]
  pub timeout: Option<Duration>,
}

impl Default for Toolchain {
  fn default() -> Self {
    Self {
      compiler: DEFAULT_COMPILER.to_string(),
      compiler_args: Vec::new(),
      search_path_flag: DEFAULT_SEARCH_PATH_FLAG.to_string(),
      harness: DEFAULT_HARNESS.to_string(),
      harness_args: vec![DEFAULT_HARNESS_MAIN.to_string()],
      verify: None,
      timeout: None,
    }
  }
}

impl Toolchain {
  /// Run `mvn clean test -B` after the harness.
  pub fn with_maven_verify(mut self) -> Self {
    self.verify = Some(["mvn", "clean", "test", "-B"].map(String::from).to_vec());
    self
  }

  /// One compiler call for a whole group.
  pub fn compile(&self, cwd: &Path, search_path: OsString, files: &[impl AsRef<Path>]) -> Invocation {
    Invocation::new(&self.compiler, cwd)
      .args(&self.compiler_args)
      .arg(&self.search_path_flag)
      .arg(search_path)
      .args(files.iter().map(|f| f.as_ref().as_os_str()))
      .timeout(self.timeout)
  }

  /// One harness call for every discovered unit.
  pub fn test(&self, cwd: &Path, search_path: OsString, units: &[String]) -> Invocation {
    Invocation::new(&self.harness, cwd)
      .arg(&self.search_path_flag)
      .arg(search_path)
      .args(&self.harness_args)
      .args(units)
      .timeout(self.timeout)
  }

  /// The verification command, if one is configured.
  pub fn verification(&self, cwd: &Path) -> Option<Invocation> {
    let (program, args) = self.verify.as_ref()?.split_first()?;
    Some(Invocation::new(program, cwd).args(args).timeout(self.timeout))
  }
}
