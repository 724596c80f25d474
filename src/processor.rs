use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::SandboxDefaults;
use crate::error::Result;
use crate::models::{Language, Submission, SubmissionSnapshot, SubmissionStatus};
use crate::path_ext::validate_relative_file_name;
use crate::repository::SubmissionRepository;
use crate::sandbox::{Driver, RunContext, System};

/// Non-null execution constraints after three-valued resolution against
/// the process sandbox defaults: a null field on the submission always
/// means "use the default", never zero/false.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLimits {
  pub cpu_time_limit: f64,
  pub cpu_extra_time: f64,
  pub wall_time_limit: f64,
  pub memory_limit: u32,
  pub max_processes: u32,
  pub max_file_size: u32,
  pub number_of_runs: u32,
  pub enable_per_process_time_limit: bool,
  pub enable_per_process_memory_limit: bool,
  pub redirect_stderr_to_stdout: bool,
  pub enable_network: bool,
}

/// Three-valued coalescing: a null numeric or boolean field defers to
/// the process default; an explicit value always wins, including an
/// explicit `false`.
pub fn resolve_limits(submission: &Submission, defaults: &SandboxDefaults) -> ResolvedLimits {
  ResolvedLimits {
    cpu_time_limit: submission.cpu_time_limit.unwrap_or(defaults.cpu_time_limit),
    cpu_extra_time: submission.cpu_extra_time.unwrap_or(defaults.cpu_extra_time),
    wall_time_limit: submission.wall_time_limit.unwrap_or(defaults.wall_time_limit),
    memory_limit: submission
      .memory_limit
      .map(|v| v as u32)
      .unwrap_or(defaults.memory_limit),
    max_processes: submission
      .max_processes_and_or_threads
      .map(|v| v as u32)
      .unwrap_or(defaults.max_processes),
    max_file_size: submission
      .max_file_size
      .map(|v| v as u32)
      .unwrap_or(defaults.max_file_size),
    number_of_runs: submission
      .number_of_runs
      .map(|v| v as u32)
      .unwrap_or(defaults.number_of_runs)
      .max(1),
    enable_per_process_time_limit: submission
      .enable_per_process_and_thread_time_limit
      .unwrap_or(defaults.enable_per_process_time_limit),
    enable_per_process_memory_limit: submission
      .enable_per_process_and_thread_memory_limit
      .unwrap_or(defaults.enable_per_process_memory_limit),
    redirect_stderr_to_stdout: submission
      .redirect_stderr_to_stdout
      .unwrap_or(defaults.redirect_stderr_to_stdout),
    enable_network: submission.enable_network.unwrap_or(defaults.enable_network),
  }
}

/// Literal stderr noise emitted by older Node.js runtimes; stripped
/// whenever stderr is captured separately for a Node.js submission.
const NODE_WASM_WARNING: &str = "Warning: disabling flag --expose_wasm due to conflicting flags\n";

fn filter_node_noise(language: &Language, stderr: String) -> String {
  if language.is_node() {
    stderr.replace(NODE_WASM_WARNING, "")
  } else {
    stderr
  }
}

#[derive(Debug)]
pub enum ProcessingOutcome {
  Skipped,
  InvalidSubmission(String),
  CompileError,
  Success,
  InfraError(String),
}

pub struct Processor<'a> {
  pub repository: &'a SubmissionRepository,
  pub isolate_binary: PathBuf,
  pub defaults: SandboxDefaults,
  pub system: &'a dyn System,
}

impl<'a> Processor<'a> {
  fn build_run_context(
    limits: &ResolvedLimits,
    program: &str,
    args: Vec<String>,
    stdin_path: Option<PathBuf>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
  ) -> RunContext {
    RunContext::new(program, args)
      .cpu_time_limit(limits.cpu_time_limit)
      .cpu_extra_time(limits.cpu_extra_time)
      .wall_time_limit(limits.wall_time_limit)
      .memory_limit_kb(limits.memory_limit)
      .max_processes(limits.max_processes)
      .file_size_limit_kb(limits.max_file_size)
      .enable_per_process_time_limit(limits.enable_per_process_time_limit)
      .enable_per_process_memory_limit(limits.enable_per_process_memory_limit)
      .share_net(limits.enable_network)
      .stdin_path(stdin_path)
      .stdout_path(stdout_path)
      .stderr_path(stderr_path)
      .stderr_to_stdout(limits.redirect_stderr_to_stdout)
  }

  pub async fn process(&self, box_id: u32, snapshot: &SubmissionSnapshot) -> Result<ProcessingOutcome> {
    let submission = &snapshot.submission;
    let language = &snapshot.language;

    if submission.source_code.trim().is_empty() {
      return Ok(ProcessingOutcome::InvalidSubmission(
        "invalid submission data".into(),
      ));
    }

    if !self.repository.try_start_processing(submission.id).await? {
      return Ok(ProcessingOutcome::Skipped);
    }

    let outcome = self.run(box_id, submission, language).await;

    let driver = Driver::new(self.isolate_binary.clone(), box_id, self.system);
    if let Err(err) = driver.cleanup() {
      tracing::error!(error = %err, "sandbox cleanup failed");
    }

    match outcome {
      Ok(outcome) => Ok(outcome),
      Err(err) => {
        tracing::error!(error = %err, submission_id = %submission.id, "worker exception");
        let mut meta = HashMap::new();
        meta.insert("error".to_string(), "Worker exception".to_string());
        self
          .repository
          .update_result(
            submission.id,
            SubmissionStatus::Error,
            Some(""),
            Some(&err.to_string()),
            None,
            &meta,
          )
          .await?;
        Ok(ProcessingOutcome::InfraError(err.to_string()))
      }
    }
  }

  async fn run(
    &self,
    box_id: u32,
    submission: &Submission,
    language: &Language,
  ) -> Result<ProcessingOutcome> {
    let limits = resolve_limits(submission, &self.defaults);

    let mut driver = Driver::new(self.isolate_binary.clone(), box_id, self.system);
    driver.init()?;

    let source_name = format!("{}{}", language.file_name, language.file_extension);
    driver.place_file(&source_name, submission.source_code.as_bytes())?;

    for file in &submission.additional_files {
      validate_relative_file_name(&file.name)?;
      driver.place_file(&file.name, file.content.as_bytes())?;
    }

    let stdin_contents = submission.stdin.clone().unwrap_or_default();
    driver.place_file("stdin.txt", stdin_contents.as_bytes())?;

    let mut compile_output: Option<String> = None;

    if let Some(compile_command) = &language.compile_command {
      let parts = shell_words::split(compile_command)
        .map_err(|e| crate::error::Error::Validation(e.to_string()))?;
      let (program, args) = parts
        .split_first()
        .ok_or_else(|| crate::error::Error::Validation("empty compile command".into()))?;

      let ctx = Self::build_run_context(
        &limits,
        program,
        args.to_vec(),
        Some(PathBuf::from("stdin.txt")),
        Some(PathBuf::from("compile_stdout.txt")),
        Some(PathBuf::from("compile_stderr.txt")),
      );

      let result = driver.run(&ctx, "compile_meta.txt")?;
      let combined = format!("{}\n{}", result.stdout, result.stderr);
      compile_output = Some(combined.trim().to_string());

      if result.exit_status != Some(0) {
        self
          .repository
          .update_result(
            submission.id,
            SubmissionStatus::Error,
            Some(&result.stdout),
            Some(&result.stderr),
            compile_output.as_deref(),
            &result.meta.into_map(),
          )
          .await?;
        return Ok(ProcessingOutcome::CompileError);
      }
    }

    let parts = shell_words::split(&language.run_command)
      .map_err(|e| crate::error::Error::Validation(e.to_string()))?;
    let (program, args) = parts
      .split_first()
      .ok_or_else(|| crate::error::Error::Validation("empty run command".into()))?;

    let mut total_time = 0.0f64;
    let mut total_memory = 0.0f64;
    let mut last_stdout = String::new();
    let mut last_stderr = String::new();
    let mut last_meta = HashMap::new();

    for _ in 0..limits.number_of_runs {
      let stderr_path = if limits.redirect_stderr_to_stdout {
        None
      } else {
        Some(PathBuf::from("stderr.txt"))
      };

      let ctx = Self::build_run_context(
        &limits,
        program,
        args.to_vec(),
        Some(PathBuf::from("stdin.txt")),
        Some(PathBuf::from("stdout.txt")),
        stderr_path,
      );

      let result = driver.run(&ctx, "meta.txt")?;

      if let Some(t) = result.meta.time() {
        total_time += t;
      }
      if let Some(m) = result.meta.max_rss() {
        total_memory += m;
      }

      last_stdout = result.stdout;
      last_stderr = filter_node_noise(language, result.stderr);
      last_meta = result.meta.into_map();
    }

    if limits.number_of_runs > 1 {
      last_meta.insert(
        "avg_time".to_string(),
        (total_time / limits.number_of_runs as f64).to_string(),
      );
      last_meta.insert(
        "avg_memory".to_string(),
        (total_memory / limits.number_of_runs as f64).to_string(),
      );
      last_meta.insert("total_runs".to_string(), limits.number_of_runs.to_string());
    }

    if let Some(expected) = &submission.expected_output {
      let matched = last_stdout.trim() == expected.trim();
      last_meta.insert(
        "output_matched".to_string(),
        if matched { "True" } else { "False" }.to_string(),
      );
    }

    self
      .repository
      .update_result(
        submission.id,
        SubmissionStatus::Finished,
        Some(&last_stdout),
        Some(&last_stderr),
        compile_output.as_deref(),
        &last_meta,
      )
      .await?;

    Ok(ProcessingOutcome::Success)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::AdditionalFile as _AdditionalFile;
  use chrono::Utc;
  use uuid::Uuid;

  fn submission(overrides: impl FnOnce(&mut Submission)) -> Submission {
    let mut submission = Submission {
      id: Uuid::new_v4(),
      language_id: 1,
      source_code: "print(1)".into(),
      stdin: None,
      additional_files: vec![],
      expected_output: None,
      cpu_time_limit: None,
      cpu_extra_time: None,
      wall_time_limit: None,
      memory_limit: None,
      max_processes_and_or_threads: None,
      max_file_size: None,
      number_of_runs: None,
      enable_per_process_and_thread_time_limit: None,
      enable_per_process_and_thread_memory_limit: None,
      redirect_stderr_to_stdout: None,
      enable_network: None,
      status: SubmissionStatus::Pending,
      stdout: None,
      stderr: None,
      compile_output: None,
      meta: HashMap::new(),
      created_at: Utc::now(),
    };
    overrides(&mut submission);
    submission
  }

  #[test]
  fn null_fields_fall_back_to_defaults() {
    let defaults = SandboxDefaults::default();
    let submission = submission(|_| {});
    let limits = resolve_limits(&submission, &defaults);
    assert_eq!(limits.cpu_time_limit, defaults.cpu_time_limit);
    assert_eq!(limits.memory_limit, defaults.memory_limit);
    assert_eq!(limits.number_of_runs, 1);
    assert!(!limits.enable_network);
  }

  #[test]
  fn explicit_values_override_defaults_including_false() {
    let defaults = SandboxDefaults {
      enable_network: true,
      ..SandboxDefaults::default()
    };
    let submission = submission(|s| {
      s.cpu_time_limit = Some(9.0);
      s.enable_network = Some(false);
    });
    let limits = resolve_limits(&submission, &defaults);
    assert_eq!(limits.cpu_time_limit, 9.0);
    assert!(!limits.enable_network);
  }

  #[test]
  fn node_noise_is_stripped_only_for_node_language() {
    let node = Language {
      id: 1,
      name: "Node.js".into(),
      version: "20".into(),
      file_name: "script".into(),
      file_extension: ".js".into(),
      compile_command: None,
      run_command: "node script.js".into(),
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    let python = Language {
      name: "Python".into(),
      ..node.clone()
    };

    let stderr = format!("before\n{NODE_WASM_WARNING}after\n");
    assert_eq!(filter_node_noise(&node, stderr.clone()), "before\nafter\n");
    assert_eq!(filter_node_noise(&python, stderr.clone()), stderr);
  }

  #[test]
  fn additional_file_names_are_rejected_when_unsafe() {
    let file = _AdditionalFile {
      name: "../escape.txt".into(),
      content: "x".into(),
    };
    assert!(validate_relative_file_name(&file.name).is_err());
  }
}
