//! Signals sent to a running pipeline.

use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn sigterm_during_compilation_removes_the_staging_area() {
  let env = TestEnv::new();
  let marker = env.tools.join("started");
  env.tool(
    "compiler",
    &format!("#!/bin/sh\ntouch '{}'\nexec sleep 30\n", marker.display()),
  );

  let mut child = Command::new(env!("CARGO_BIN_EXE_stagehand"))
    .arg("out.zip")
    .arg("-C")
    .arg(&env.workdir)
    .arg("--compiler")
    .arg(env.tools.join("compiler"))
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .spawn()
    .unwrap();

  let deadline = Instant::now() + Duration::from_secs(20);
  while !marker.exists() {
    assert!(Instant::now() < deadline, "compiler never started");
    thread::sleep(Duration::from_millis(20));
  }
  assert_eq!(env.staging_leftovers().len(), 1);

  let killed = Command::new("kill")
    .arg("-TERM")
    .arg(child.id().to_string())
    .status()
    .unwrap();
  assert!(killed.success());

  let output = child.wait_with_output().unwrap();
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert_eq!(output.status.code(), Some(1), "{stderr}");
  assert!(stderr.contains("interrupted"), "{stderr}");
  assert!(env.staging_leftovers().is_empty());
  assert!(!env.archive("out.zip").exists());
}
