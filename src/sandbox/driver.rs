use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{Error, Result};
use crate::path_ext::validate_relative_file_name;

use super::context::RunContext;
use super::meta::Meta;

/// Seam between the driver and the OS, so tests can assert on the exact
/// argument vectors a driver builds without actually shelling out to a
/// real `isolate` binary.
pub trait System {
  fn run(&self, binary: &Path, args: &[String]) -> Result<Output>;
}

pub struct MaterialSystem;

impl System for MaterialSystem {
  fn run(&self, binary: &Path, args: &[String]) -> Result<Output> {
    Command::new(binary).args(args).output().map_err(Error::from)
  }
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
  pub stdout: String,
  pub stderr: String,
  pub meta: Meta,
  pub exit_status: Option<i32>,
}

/// Thin shim around the `isolate` binary: constructs its CLI invocation,
/// normalizes its output, and never reimplements the isolation itself.
/// `isolate` owns namespaces, cgroups, and privilege dropping; this type
/// only ever shells out to it.
pub struct Driver<'a> {
  isolate_binary: PathBuf,
  box_id: u32,
  box_path: Option<PathBuf>,
  system: &'a dyn System,
}

impl<'a> Driver<'a> {
  pub fn new(isolate_binary: PathBuf, box_id: u32, system: &'a dyn System) -> Self {
    Self {
      isolate_binary,
      box_id,
      box_path: None,
      system,
    }
  }

  pub fn box_id(&self) -> u32 {
    self.box_id
  }

  /// Runs `isolate --box-id=<id> --init`, which creates the box directory
  /// (if absent) and prints its root on stdout. The sandboxed filesystem
  /// root is that path joined with `box`.
  pub fn init(&mut self) -> Result<&Path> {
    let args = vec![format!("--box-id={}", self.box_id), "--init".to_string()];
    let output = self.system.run(&self.isolate_binary, &args)?;

    if !output.status.success() {
      return Err(Error::SandboxInit(String::from_utf8_lossy(&output.stderr).into_owned()));
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let path = PathBuf::from(root).join("box");
    self.box_path = Some(path);

    Ok(self.box_path.as_deref().unwrap())
  }

  fn box_path(&self) -> Result<&Path> {
    self
      .box_path
      .as_deref()
      .ok_or_else(|| Error::SandboxInit("sandbox has not been initialized".into()))
  }

  /// Writes `contents` to `relative` inside the box. `relative` is
  /// validated as a bare file name (no traversal, no nested directories)
  /// before anything touches the filesystem.
  pub fn place_file(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    validate_relative_file_name(relative)?;
    let path = self.box_path()?.join(relative);
    fs::write(&path, contents)?;
    Ok(path)
  }

  /// Runs the given execution context inside this box and returns its
  /// normalized output. stdout/stderr are read back from the files the
  /// context wrote them to, or left empty when not redirected.
  pub fn run(&self, ctx: &RunContext, meta_file_name: &str) -> Result<RunOutput> {
    let box_path = self.box_path()?;
    let meta_path = box_path.join(meta_file_name);

    let args = ctx.to_args(self.box_id, &meta_path);
    let output = self.system.run(&self.isolate_binary, &args)?;

    let meta_contents = fs::read_to_string(&meta_path).unwrap_or_default();
    let meta = Meta::parse(&meta_contents);

    let stdout = ctx
      .stdout_path
      .as_ref()
      .map(|p| fs::read_to_string(box_path.join(p)).unwrap_or_default())
      .unwrap_or_else(|| String::from_utf8_lossy(&output.stdout).into_owned());

    let stderr = if ctx.stderr_to_stdout {
      String::new()
    } else {
      ctx
        .stderr_path
        .as_ref()
        .map(|p| fs::read_to_string(box_path.join(p)).unwrap_or_default())
        .unwrap_or_else(|| String::from_utf8_lossy(&output.stderr).into_owned())
    };

    Ok(RunOutput {
      stdout,
      stderr,
      meta,
      exit_status: output.status.code(),
    })
  }

  /// Runs `isolate --box-id=<id> --cleanup`. Always called on every exit
  /// path of the processor, success or failure, so a crashed job never
  /// leaks a box.
  pub fn cleanup(&self) -> Result<()> {
    let args = vec![format!("--box-id={}", self.box_id), "--cleanup".to_string()];
    let output = self.system.run(&self.isolate_binary, &args)?;

    if !output.status.success() {
      return Err(Error::Execution(format!(
        "isolate cleanup failed for box {}: {}",
        self.box_id,
        String::from_utf8_lossy(&output.stderr)
      )));
    }

    Ok(())
  }
}

/// Deterministic box-id assignment from a worker's identity. A worker
/// named `worker-<N>` always claims slot `N`, so sibling workers never
/// contend for the same box. Anything else falls back to scanning the
/// isolator's box root for the lowest free id.
pub fn allocate_slot(worker_identity: &str, box_root: &Path) -> u32 {
  if let Some(n) = worker_identity
    .strip_prefix("worker-")
    .and_then(|n| n.parse::<u32>().ok())
  {
    return n;
  }

  if let Ok(entries) = fs::read_dir(box_root) {
    let taken: std::collections::HashSet<u32> = entries
      .filter_map(|e| e.ok())
      .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse::<u32>().ok()))
      .collect();

    for candidate in 0..1000 {
      if !taken.contains(&candidate) {
        return candidate;
      }
    }
  }

  rand_fallback_slot()
}

fn rand_fallback_slot() -> u32 {
  use std::time::{SystemTime, UNIX_EPOCH};
  let nanos = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.subsec_nanos())
    .unwrap_or(0);
  nanos % 1000
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;
  use std::os::unix::process::ExitStatusExt;
  use std::process::ExitStatus;

  struct MockSystem {
    calls: RefCell<Vec<Vec<String>>>,
    stdout: String,
  }

  impl MockSystem {
    fn new(stdout: &str) -> Self {
      Self {
        calls: RefCell::new(Vec::new()),
        stdout: stdout.to_string(),
      }
    }
  }

  impl System for MockSystem {
    fn run(&self, _binary: &Path, args: &[String]) -> Result<Output> {
      self.calls.borrow_mut().push(args.to_vec());
      Ok(Output {
        status: ExitStatus::from_raw(0),
        stdout: self.stdout.clone().into_bytes(),
        stderr: Vec::new(),
      })
    }
  }

  #[test]
  fn init_parses_box_path_from_stdout() {
    let system = MockSystem::new("/var/local/lib/isolate/5\n");
    let mut driver = Driver::new(PathBuf::from("isolate"), 5, &system);
    let path = driver.init().unwrap();
    assert_eq!(path, Path::new("/var/local/lib/isolate/5/box"));
    assert_eq!(system.calls.borrow()[0], vec!["--box-id=5", "--init"]);
  }

  #[test]
  fn run_without_init_is_an_error() {
    let system = MockSystem::new("");
    let driver = Driver::new(PathBuf::from("isolate"), 0, &system);
    let ctx = RunContext::new("echo", vec![]);
    assert!(driver.run(&ctx, "meta.txt").is_err());
  }

  #[test]
  fn allocate_slot_parses_worker_ordinal() {
    let tmp = tempfile::TempDir::new().unwrap();
    assert_eq!(allocate_slot("worker-7", tmp.path()), 7);
    assert_eq!(allocate_slot("worker-0", tmp.path()), 0);
  }

  #[test]
  fn allocate_slot_scans_for_lowest_free_id_otherwise() {
    let tmp = tempfile::TempDir::new().unwrap();
    fs::create_dir(tmp.path().join("0")).unwrap();
    fs::create_dir(tmp.path().join("1")).unwrap();
    assert_eq!(allocate_slot("some-worker", tmp.path()), 2);
  }
}
