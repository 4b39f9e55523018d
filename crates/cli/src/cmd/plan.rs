//! Implementation of `--plan`: describe a run without executing it.

use anyhow::Result;
use serde::Serialize;
use stagehand_lib::registry::{ArchiveEntry, FileGroup, GroupRole};
use stagehand_lib::stage::StagingLocation;

use super::Settings;
use crate::output::{OutputFormat, print_entry, print_info, print_json, print_stat};

#[derive(Serialize)]
struct PlanOutput<'a> {
  workdir: &'a std::path::Path,
  groups: &'a [FileGroup],
  compiler: String,
  harness: String,
  archive: &'a std::path::Path,
  entries: Vec<ArchiveEntry>,
}

pub fn cmd_plan(settings: &Settings, format: OutputFormat) -> Result<()> {
  let options = &settings.options;
  let toolchain = &options.toolchain;
  let entries = settings.registry.archive_entries(&settings.workdir);

  if format.is_json() {
    return print_json(&PlanOutput {
      workdir: &settings.workdir,
      groups: settings.registry.groups(),
      compiler: toolchain.compiler.clone(),
      harness: toolchain.harness.clone(),
      archive: &options.output,
      entries,
    });
  }

  let staging = match &options.staging {
    StagingLocation::Unique { parent } => format!("fresh directory under {}", parent.display()),
    StagingLocation::At(path) => path.display().to_string(),
  };
  print_info(&format!("Staging: {}", staging));

  for (i, group) in settings.registry.groups().iter().enumerate() {
    let role = match group.role {
      GroupRole::Source => "source",
      GroupRole::Test => "test",
    };
    print_info(&format!(
      "{}. {} ({}): {} -> {}",
      i + 1,
      group.name,
      role,
      group.source_dir.display(),
      group.dest_layout
    ));
    print_stat("Files", &group.includes.join(", "));
  }

  print_stat("Compiler", &toolchain.compiler);
  print_stat("Harness", &toolchain.harness);
  if let Some(verify) = &toolchain.verify {
    print_stat("Verify", &verify.join(" "));
  }

  print_info(&format!("Archive: {}", options.output.display()));
  for entry in &entries {
    print_entry(&entry.archive_path);
  }

  Ok(())
}
