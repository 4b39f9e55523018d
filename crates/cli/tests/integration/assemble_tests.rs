//! Full pipeline runs through the binary.

use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn assemble_packages_sources_and_tests() {
  let env = TestEnv::new();

  env
    .cmd("out.zip")
    .assert()
    .success()
    .stdout(predicate::str::contains("Assembled"))
    .stdout(predicate::str::contains("test/GrassBlockTest.java"))
    .stdout(predicate::str::contains("Test units: GrassBlockTest"));

  assert_eq!(
    env.archive_names(&env.archive("out.zip")),
    vec!["src/Block.java", "src/GrassBlock.java", "test/GrassBlockTest.java"]
  );
  assert!(env.staging_leftovers().is_empty());
}

#[test]
fn tools_run_in_order_with_a_growing_search_path() {
  let env = TestEnv::new();

  env.cmd("out.zip").assert().success();

  let calls = env.calls();
  assert_eq!(calls.len(), 3, "{calls:?}");
  assert!(calls[0].starts_with("compile -cp . "), "{}", calls[0]);
  assert!(calls[0].contains("/src/Block.java"), "{}", calls[0]);
  assert!(calls[1].starts_with("compile -cp .:"), "{}", calls[1]);
  assert!(calls[1].contains("/test/GrassBlockTest.java"));
  assert!(calls[2].starts_with("test -cp .:"), "{}", calls[2]);
  assert!(calls[2].ends_with("org.junit.runner.JUnitCore GrassBlockTest"), "{}", calls[2]);
}

#[test]
fn archive_holds_original_files() {
  let env = TestEnv::new();
  // A compiler that rewrites whatever it is given.
  env.tool(
    "compiler",
    r#"#!/bin/sh
for arg in "$@"; do
  if [ -f "$arg" ]; then echo "// touched" >> "$arg"; fi
done
"#,
  );

  env.cmd("out.zip").assert().success();

  let mut archive = zip::ZipArchive::new(fs::File::open(env.archive("out.zip")).unwrap()).unwrap();
  let mut content = String::new();
  std::io::Read::read_to_string(&mut archive.by_name("src/GrassBlock.java").unwrap(), &mut content).unwrap();
  assert_eq!(content, "class GrassBlock extends Block {}\n");
}

#[test]
fn compile_failure_stops_the_pipeline() {
  let env = TestEnv::new();
  env.write_file("src/main/java/Block.java", "class Block { error }\n");

  env
    .cmd("out.zip")
    .assert()
    .failure()
    .stderr(predicate::str::contains("compilation of group `main` failed"))
    .stderr(predicate::str::contains("cannot find symbol"));

  assert!(!env.archive("out.zip").exists());
  assert!(env.staging_leftovers().is_empty());
  let calls = env.calls();
  assert_eq!(calls.len(), 1, "{calls:?}");
}

#[test]
fn test_failure_produces_no_archive() {
  let env = TestEnv::new();
  env.write_file("src/test/java/FailingTest.java", "class FailingTest {}\n");
  env.write_file(
    "stagehand.json",
    &super::common::REGISTRY.replace(r#"["GrassBlockTest.java"]"#, r#"["GrassBlockTest.java", "FailingTest.java"]"#),
  );

  env
    .cmd("out.zip")
    .assert()
    .failure()
    .stderr(predicate::str::contains("tests failed"))
    .stderr(predicate::str::contains("FAILURES!!! FailingTest"));

  assert!(!env.archive("out.zip").exists());
  assert!(env.staging_leftovers().is_empty());
}

#[test]
fn missing_source_fails_before_compiling() {
  let env = TestEnv::new();
  fs::remove_file(env.workdir.join("src/main/java/GrassBlock.java")).unwrap();

  env
    .cmd("out.zip")
    .assert()
    .failure()
    .stderr(predicate::str::contains("source file missing for group `main`"));

  assert!(env.calls().is_empty());
  assert!(!env.archive("out.zip").exists());
  assert!(env.staging_leftovers().is_empty());
}

#[test]
fn rerun_replaces_the_archive() {
  let env = TestEnv::new();

  env.cmd("out.zip").assert().success();
  env.write_file("src/main/java/Block.java", "class Block { int x; }\n");
  env.cmd("out.zip").assert().success();

  let mut archive = zip::ZipArchive::new(fs::File::open(env.archive("out.zip")).unwrap()).unwrap();
  let mut content = String::new();
  std::io::Read::read_to_string(&mut archive.by_name("src/Block.java").unwrap(), &mut content).unwrap();
  assert_eq!(content, "class Block { int x; }\n");
}

#[test]
fn out_dir_and_staging_dir_are_honoured() {
  let env = TestEnv::new();
  fs::create_dir_all(env.workdir.join("dist")).unwrap();

  env
    .cmd("out.zip")
    .arg("--out-dir")
    .arg("dist")
    .arg("--staging-dir")
    .arg("build/stage")
    .assert()
    .success();

  assert!(env.workdir.join("dist/out.zip").exists());
  assert!(!env.archive("out.zip").exists());
  assert!(!env.workdir.join("build/stage").exists());
  assert!(env.calls()[0].contains("/build/stage/src/Block.java"));
}

#[test]
fn staging_dir_inside_the_sources_is_refused() {
  let env = TestEnv::new();

  env
    .cmd("out.zip")
    .arg("--staging-dir")
    .arg("src")
    .assert()
    .failure()
    .stderr(predicate::str::contains("overlaps the sources of group `main`"));

  assert!(env.workdir.join("src/main/java/Block.java").is_file());
  assert!(env.workdir.join("src/test/java/GrassBlockTest.java").is_file());
  assert!(env.calls().is_empty());
}

#[test]
fn existing_staging_dir_from_elsewhere_is_left_alone() {
  let env = TestEnv::new();
  env.write_file("notes/todo.txt", "keep me");

  env
    .cmd("out.zip")
    .arg("--staging-dir")
    .arg("notes")
    .assert()
    .failure()
    .stderr(predicate::str::contains("was not created by stagehand"));

  assert_eq!(fs::read_to_string(env.workdir.join("notes/todo.txt")).unwrap(), "keep me");
  assert!(!env.archive("out.zip").exists());
}

#[test]
fn registry_without_tests_skips_the_harness() {
  let env = TestEnv::new();
  env.write_file(
    "stagehand.json",
    r#"{ "groups": [ { "name": "main", "source_dir": "src/main/java", "dest_layout": "src", "includes": ["Block.java"] } ] }"#,
  );

  env
    .cmd("out.zip")
    .assert()
    .success()
    .stdout(predicate::str::contains("Test units: none"));

  assert_eq!(env.archive_names(&env.archive("out.zip")), vec!["src/Block.java"]);
  assert!(env.calls().iter().all(|c| c.starts_with("compile")));
}

#[test]
fn maven_verification_runs_after_the_tests() {
  let env = TestEnv::new();
  env.tool("mvn", "#!/bin/sh\necho \"mvn $*\" >> \"$(dirname \"$0\")/calls.log\"\n");
  let path = format!("{}:{}", env.tools.display(), std::env::var("PATH").unwrap_or_default());

  env.cmd("out.zip").arg("--maven").env("PATH", path).assert().success();

  let calls = env.calls();
  assert_eq!(calls.last().map(String::as_str), Some("mvn clean test -B"));
  assert!(calls[calls.len() - 2].starts_with("test "));
}

#[test]
fn failing_verification_fails_the_run() {
  let env = TestEnv::new();
  env.tool("mvn", "#!/bin/sh\necho \"BUILD FAILURE\"\nexit 1\n");
  let path = format!("{}:{}", env.tools.display(), std::env::var("PATH").unwrap_or_default());

  env
    .cmd("out.zip")
    .arg("--maven")
    .env("PATH", path)
    .assert()
    .failure()
    .stderr(predicate::str::contains("BUILD FAILURE"));

  assert!(!env.archive("out.zip").exists());
}

#[test]
fn json_report_on_success() {
  let env = TestEnv::new();

  let output = env.cmd("out.zip").arg("-o").arg("json").output().unwrap();

  assert!(output.status.success());
  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["status"], "ok");
  assert_eq!(report["test_units"], serde_json::json!(["GrassBlockTest"]));
  assert_eq!(report["compiled_groups"], serde_json::json!(["main", "tests"]));
  assert_eq!(report["entries"].as_array().unwrap().len(), 3);
}

#[test]
fn json_report_on_compile_failure() {
  let env = TestEnv::new();
  env.write_file("src/main/java/GrassBlock.java", "error\n");

  let output = env.cmd("out.zip").arg("-o").arg("json").output().unwrap();

  assert!(!output.status.success());
  let failure: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(failure["status"], "error");
  assert_eq!(failure["kind"], "CompilationError");
  assert!(failure["message"].as_str().unwrap().contains("cannot find symbol"));
}
