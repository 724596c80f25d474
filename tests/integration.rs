#![cfg(feature = "integration")]

//! End-to-end tests against a real `isolate`-shaped binary. These are
//! gated behind the `integration` feature because they shell out to an
//! executable on PATH rather than a mock, mirroring how the sandbox
//! itself is only ever exercised through a real external tool.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use judge_core::sandbox::{Driver, MaterialSystem, RunContext};
use tempfile::TempDir;

/// Writes a shell script standing in for `isolate` that understands just
/// enough of the real CLI surface to drive a `Driver` through init, run,
/// and cleanup.
fn write_fake_isolate(dir: &TempDir) -> PathBuf {
  let box_root = dir.path().join("box-root");
  fs::create_dir_all(box_root.join("0/box")).unwrap();

  let script = dir.path().join("isolate");
  let body = format!(
    r#"#!/bin/sh
set -e
BOX_ROOT="{box_root}"
case "$*" in
  *--init*)
    echo "$BOX_ROOT/0"
    ;;
  *--cleanup*)
    exit 0
    ;;
  *--run*)
    for arg in "$@"; do
      case "$arg" in
        --meta=*) META="${{arg#--meta=}}" ;;
      esac
    done
    echo "time:0.01" > "$META"
    echo "max-rss:1024" >> "$META"
    echo "exitcode:0" >> "$META"
    echo "status:OK" >> "$META"
    echo "hello" > "$BOX_ROOT/0/box/stdout.txt"
    ;;
esac
"#,
    box_root = box_root.display()
  );

  fs::write(&script, body).unwrap();
  let mut perms = fs::metadata(&script).unwrap().permissions();
  perms.set_mode(0o755);
  fs::set_permissions(&script, perms).unwrap();

  script
}

#[test]
fn driver_round_trips_init_run_cleanup_against_a_real_binary() {
  let dir = TempDir::new().unwrap();
  let isolate = write_fake_isolate(&dir);
  let system = MaterialSystem;

  let mut driver = Driver::new(isolate, 0, &system);
  let box_path = driver.init().unwrap().to_path_buf();
  assert!(box_path.ends_with("0/box"));

  driver.place_file("main.py", b"print('hi')").unwrap();

  let ctx = RunContext::new("python3", vec!["main.py".to_string()])
    .stdout_path(Some(PathBuf::from("stdout.txt")));

  let output = driver.run(&ctx, "meta.txt").unwrap();
  assert_eq!(output.stdout.trim(), "hello");
  assert_eq!(output.meta.exit_code(), Some(0));
  assert_eq!(output.meta.time(), Some(0.01));

  driver.cleanup().unwrap();
}
