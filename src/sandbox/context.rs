use std::path::PathBuf;

/// Resolved, non-null execution constraints for a single isolate invocation,
/// built with a fluent consuming-setter API in the style of an execution
/// context builder. By the time a `RunContext` is constructed, every
/// three-valued submission field has already been coalesced against the
/// process sandbox defaults — there is nothing left to resolve here.
#[derive(Debug, Clone)]
pub struct RunContext {
  pub program: String,
  pub arguments: Vec<String>,

  pub cpu_time_limit: f64,
  pub cpu_extra_time: f64,
  pub wall_time_limit: f64,
  pub memory_limit_kb: u32,
  pub max_processes: u32,
  pub file_size_limit_kb: u32,

  pub enable_per_process_time_limit: bool,
  pub enable_per_process_memory_limit: bool,
  pub share_net: bool,

  pub stdin_path: Option<PathBuf>,
  pub stdout_path: Option<PathBuf>,
  pub stderr_path: Option<PathBuf>,
  pub stderr_to_stdout: bool,
}

impl Default for RunContext {
  fn default() -> Self {
    Self {
      program: String::new(),
      arguments: Vec::new(),
      cpu_time_limit: 1.0,
      cpu_extra_time: 0.5,
      wall_time_limit: 5.0,
      memory_limit_kb: 256_000,
      max_processes: 1,
      file_size_limit_kb: 8192,
      enable_per_process_time_limit: false,
      enable_per_process_memory_limit: false,
      share_net: false,
      stdin_path: None,
      stdout_path: None,
      stderr_path: None,
      stderr_to_stdout: false,
    }
  }
}

impl RunContext {
  pub fn new(program: impl Into<String>, arguments: Vec<String>) -> Self {
    Self {
      program: program.into(),
      arguments,
      ..Default::default()
    }
  }

  pub fn cpu_time_limit(self, cpu_time_limit: f64) -> Self {
    Self {
      cpu_time_limit,
      ..self
    }
  }

  pub fn cpu_extra_time(self, cpu_extra_time: f64) -> Self {
    Self {
      cpu_extra_time,
      ..self
    }
  }

  pub fn wall_time_limit(self, wall_time_limit: f64) -> Self {
    Self {
      wall_time_limit,
      ..self
    }
  }

  pub fn memory_limit_kb(self, memory_limit_kb: u32) -> Self {
    Self {
      memory_limit_kb,
      ..self
    }
  }

  pub fn max_processes(self, max_processes: u32) -> Self {
    Self {
      max_processes,
      ..self
    }
  }

  pub fn file_size_limit_kb(self, file_size_limit_kb: u32) -> Self {
    Self {
      file_size_limit_kb,
      ..self
    }
  }

  pub fn enable_per_process_time_limit(self, enable_per_process_time_limit: bool) -> Self {
    Self {
      enable_per_process_time_limit,
      ..self
    }
  }

  pub fn enable_per_process_memory_limit(self, enable_per_process_memory_limit: bool) -> Self {
    Self {
      enable_per_process_memory_limit,
      ..self
    }
  }

  pub fn share_net(self, share_net: bool) -> Self {
    Self { share_net, ..self }
  }

  pub fn stdin_path(self, stdin_path: Option<PathBuf>) -> Self {
    Self { stdin_path, ..self }
  }

  pub fn stdout_path(self, stdout_path: Option<PathBuf>) -> Self {
    Self {
      stdout_path,
      ..self
    }
  }

  pub fn stderr_path(self, stderr_path: Option<PathBuf>) -> Self {
    Self {
      stderr_path,
      ..self
    }
  }

  pub fn stderr_to_stdout(self, stderr_to_stdout: bool) -> Self {
    Self {
      stderr_to_stdout,
      ..self
    }
  }

  /// Builds the `isolate` CLI argument vector for this run. `box_id`
  /// selects the sandbox slot, `meta_path` is where isolate writes its
  /// metrics file. The trailing `--run --` separates isolate's own
  /// flags from the program and its arguments, which are passed through
  /// shell-word-split exactly as the program field and argument list
  /// describe them.
  pub fn to_args(&self, box_id: u32, meta_path: &std::path::Path) -> Vec<String> {
    let mut args = vec![
      format!("--box-id={box_id}"),
      format!("--meta={}", meta_path.display()),
      "--full-env".to_string(),
      format!("--time={}", self.cpu_time_limit),
      format!("--extra-time={}", self.cpu_extra_time),
      format!("--wall-time={}", self.wall_time_limit),
      format!("--mem={}", self.memory_limit_kb),
      format!("--processes={}", self.max_processes),
      format!("--fsize={}", self.file_size_limit_kb),
    ];

    if self.enable_per_process_time_limit {
      args.push("--cg-timing".to_string());
    }
    if self.enable_per_process_memory_limit {
      args.push("--cg-mem".to_string());
    }
    if self.share_net {
      args.push("--share-net".to_string());
    }

    if let Some(path) = &self.stdin_path {
      args.push(format!("--stdin={}", path.display()));
    }
    if let Some(path) = &self.stdout_path {
      args.push(format!("--stdout={}", path.display()));
    }
    if self.stderr_to_stdout {
      args.push("--stderr-to-stdout".to_string());
    } else if let Some(path) = &self.stderr_path {
      args.push(format!("--stderr={}", path.display()));
    }

    args.push("--run".to_string());
    args.push("--".to_string());
    args.push(self.program.clone());
    args.extend(self.arguments.iter().cloned());

    args
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn builds_expected_flag_set() {
    let ctx = RunContext::new("python3", vec!["main.py".to_string()])
      .cpu_time_limit(2.0)
      .memory_limit_kb(128_000)
      .enable_per_process_memory_limit(true)
      .stdin_path(Some(PathBuf::from("stdin.txt")))
      .stdout_path(Some(PathBuf::from("stdout.txt")))
      .stderr_to_stdout(true);

    let args = ctx.to_args(3, Path::new("meta.txt"));

    assert!(args.contains(&"--box-id=3".to_string()));
    assert!(args.contains(&"--meta=meta.txt".to_string()));
    assert!(args.contains(&"--time=2".to_string()));
    assert!(args.contains(&"--mem=128000".to_string()));
    assert!(args.contains(&"--cg-mem".to_string()));
    assert!(args.contains(&"--stdin=stdin.txt".to_string()));
    assert!(args.contains(&"--stderr-to-stdout".to_string()));
    assert!(!args.iter().any(|a| a.starts_with("--stderr=")));

    let tail: Vec<&str> = args.iter().rev().take(3).map(String::as_str).collect();
    assert_eq!(tail, vec!["main.py", "python3", "--"]);
  }

  #[test]
  fn default_context_omits_optional_flags() {
    let ctx = RunContext::new("echo", vec![]);
    let args = ctx.to_args(0, Path::new("m"));
    assert!(!args.iter().any(|a| a == "--cg-timing"));
    assert!(!args.iter().any(|a| a == "--share-net"));
  }
}
