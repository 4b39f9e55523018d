//! Implementation of the default command: run the whole pipeline.

use anyhow::{Context, Result};
use serde::Serialize;
use stagehand_lib::pipeline::{AssemblyReport, assemble, display_output, shutdown_signal};
use stagehand_lib::process::SystemRunner;

use super::Settings;
use crate::output::{
  OutputFormat, format_bytes, format_duration, print_entry, print_json, print_stat, print_success,
};

#[derive(Serialize)]
struct AssembleOutput<'a> {
  status: &'static str,
  #[serde(flatten)]
  report: &'a AssemblyReport,
}

/// Stage, compile, test and package, then print a summary.
///
/// The pipeline runs on a single-threaded runtime; Ctrl-C or SIGTERM stop it
/// and still remove the staging area.
pub fn cmd_assemble(settings: &Settings, format: OutputFormat) -> Result<()> {
  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;

  let report = rt.block_on(assemble(
    &settings.registry,
    &settings.options,
    &SystemRunner,
    shutdown_signal(),
  ))?;

  if format.is_json() {
    return print_json(&AssembleOutput {
      status: "ok",
      report: &report,
    });
  }

  print_success(&format!("Assembled {}", display_output(&report.archive).display()));
  for entry in &report.entries {
    print_entry(entry);
  }
  print_stat("Groups compiled", &report.compiled_groups.join(", "));
  print_stat(
    "Test units",
    &if report.test_units.is_empty() {
      "none".to_string()
    } else {
      report.test_units.join(", ")
    },
  );
  print_stat("Archive size", &format_bytes(report.archive_bytes));
  print_stat("Duration", &format_duration(report.duration));

  Ok(())
}
