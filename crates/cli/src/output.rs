//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable byte/duration formatting, and Unicode symbols.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use stagehand_lib::PipelineError;
use stagehand_lib::registry::RegistryError;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ADD: &str = "+";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One archive entry, as a `+ path` line.
pub fn print_entry(path: &str) {
  println!(
    "  {} {}",
    symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
    path
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

#[derive(Serialize)]
struct Failure<'a> {
  status: &'static str,
  kind: &'a str,
  message: String,
}

/// Error kind and message shown to the user.
///
/// Pipeline and registry errors are shown verbatim, including any captured
/// tool output; anything else with its context chain.
pub fn describe_failure(err: &anyhow::Error) -> (&'static str, String) {
  if let Some(e) = err.downcast_ref::<PipelineError>() {
    (e.kind(), e.to_string())
  } else if let Some(e) = err.downcast_ref::<RegistryError>() {
    ("RegistryError", e.to_string())
  } else {
    ("Error", format!("{:#}", err))
  }
}

pub fn report_failure(err: &anyhow::Error, format: OutputFormat) {
  let (kind, message) = describe_failure(err);
  if format.is_json() {
    let failure = Failure {
      status: "error",
      kind,
      message,
    };
    if print_json(&failure).is_ok() {
      return;
    }
    print_error(&failure.message);
  } else {
    print_error(&message);
  }
}
