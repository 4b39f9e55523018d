//! External process execution.
//!
//! Stages never spawn processes directly. They describe what to run with an
//! [`Invocation`] and hand it to a [`ProcessRunner`], which lets tests swap in
//! fakes for the compiler and the test harness.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: OsString,
  pub args: Vec<OsString>,
  pub cwd: PathBuf,
  /// Kill the process and fail with [`io::ErrorKind::TimedOut`] after this long.
  pub timeout: Option<Duration>,
}

impl Invocation {
  pub fn new(program: impl Into<OsString>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      timeout: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Shell-like rendering for logs.
  pub fn command_line(&self) -> String {
    std::iter::once(self.program.as_os_str())
      .chain(self.args.iter().map(OsString::as_os_str))
      .map(OsStr::to_string_lossy)
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
  /// Exit code, `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Everything the tool printed, stderr first.
  pub fn diagnostics(&self) -> String {
    let stderr = self.stderr.trim_end();
    let stdout = self.stdout.trim_end();
    match (stderr.is_empty(), stdout.is_empty()) {
      (true, true) => String::new(),
      (false, true) => stderr.to_string(),
      (true, false) => stdout.to_string(),
      (false, false) => format!("{}\n{}", stderr, stdout),
    }
  }
}

/// Runs invocations and waits for them to exit.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
  /// Run `invocation` to completion.
  ///
  /// A nonzero exit is not an error at this level; callers inspect
  /// [`ProcessOutput::code`]. Errors mean the process could not be run.
  async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
  async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
    (**self).run(invocation).await
  }
}

/// Runs invocations as real child processes.
///
/// Children are killed if the waiting future is dropped, so an interrupted
/// pipeline never leaves a compiler running against a deleted staging area.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
  async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
    info!(cmd = %invocation.command_line(), "executing command");
    debug!(working_dir = ?invocation.cwd, "spawning process");

    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .stdin(Stdio::null())
      .kill_on_drop(true);

    let output = match invocation.timeout {
      Some(limit) => tokio::time::timeout(limit, command.output())
        .await
        .map_err(|_| timed_out(&invocation.program, limit))??,
      None => command.output().await?,
    };

    let result = ProcessOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr.trim_end(), "command stderr");
    }
    if !result.stdout.is_empty() {
      debug!(stdout = %result.stdout.trim_end(), "command stdout");
    }
    debug!(code = ?result.code, "process exited");

    Ok(result)
  }
}

fn timed_out(program: &OsStr, limit: Duration) -> io::Error {
  io::Error::new(
    io::ErrorKind::TimedOut,
    format!("{} did not finish within {:?}", program.to_string_lossy(), limit),
  )
}
