use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::Result;

/// Encodes text for transport. Empty string encodes to empty string
/// (matching what base64 of zero bytes produces anyway), so this is
/// just base64 with no special casing needed beyond that identity.
pub fn encode(text: &str) -> String {
  if text.is_empty() {
    return String::new();
  }
  BASE64.encode(text.as_bytes())
}

pub fn encode_opt(text: Option<&str>) -> Option<String> {
  text.map(encode)
}

/// Decodes a base64 text field. Invalid base64 surfaces as
/// `Error::InvalidBase64`, which handlers turn into a 400.
pub fn decode(text: &str) -> Result<String> {
  if text.is_empty() {
    return Ok(String::new());
  }
  let bytes = BASE64.decode(text.as_bytes())?;
  Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn decode_opt(text: Option<&str>) -> Result<Option<String>> {
  text.map(decode).transpose()
}

pub const DEFAULT_FIELDS: &[&str] = &[
  "id",
  "status",
  "language_id",
  "stdin",
  "stdout",
  "stderr",
  "compile_output",
  "created_at",
];

pub const ALL_FIELDS: &[&str] = &[
  "id",
  "source_code",
  "language_id",
  "stdin",
  "additional_files",
  "expected_output",
  "cpu_time_limit",
  "cpu_extra_time",
  "wall_time_limit",
  "memory_limit",
  "max_processes_and_or_threads",
  "max_file_size",
  "number_of_runs",
  "enable_per_process_and_thread_time_limit",
  "enable_per_process_and_thread_memory_limit",
  "redirect_stderr_to_stdout",
  "enable_network",
  "status",
  "stdout",
  "stderr",
  "compile_output",
  "meta",
  "created_at",
];

/// Parses the `fields` query parameter into the set of field names a
/// response should be projected onto. `None`/empty yields the default
/// projection; `all` yields every field; a comma-separated list is
/// intersected with `ALL_FIELDS`, the `default` token expands to
/// `DEFAULT_FIELDS`, and `id` is always present.
pub fn parse_fields(raw: Option<&str>) -> HashSet<String> {
  let all: HashSet<String> = ALL_FIELDS.iter().map(|s| s.to_string()).collect();
  let defaults: HashSet<String> = DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect();

  let raw = match raw.map(str::trim) {
    Some(s) if !s.is_empty() => s,
    _ => return defaults,
  };

  if raw.eq_ignore_ascii_case("all") {
    return all;
  }

  let mut requested = HashSet::new();
  for token in raw.split(',') {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
      continue;
    }
    if token == "default" {
      requested.extend(defaults.iter().cloned());
    } else {
      requested.insert(token);
    }
  }

  requested.insert("id".to_string());

  let projected: HashSet<String> = requested.intersection(&all).cloned().collect();

  if projected.is_empty() {
    defaults
  } else {
    projected
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_decode_round_trip() {
    let encoded = encode("print('hi')");
    assert_eq!(decode(&encoded).unwrap(), "print('hi')");
  }

  #[test]
  fn empty_string_encodes_to_empty_string() {
    assert_eq!(encode(""), "");
    assert_eq!(decode("").unwrap(), "");
  }

  #[test]
  fn invalid_base64_is_rejected() {
    assert!(decode("not valid base64!!").is_err());
  }

  #[test]
  fn unset_or_empty_fields_yield_default_projection() {
    let defaults: HashSet<String> = DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect();
    assert_eq!(parse_fields(None), defaults);
    assert_eq!(parse_fields(Some("")), defaults.clone());
    assert_eq!(parse_fields(Some("   ")), defaults);
  }

  #[test]
  fn all_token_yields_every_field() {
    let all: HashSet<String> = ALL_FIELDS.iter().map(|s| s.to_string()).collect();
    assert_eq!(parse_fields(Some("all")), all);
    assert_eq!(parse_fields(Some("ALL")), all);
  }

  #[test]
  fn default_token_is_additive_with_explicit_fields() {
    let fields = parse_fields(Some("default,source_code"));
    assert!(fields.contains("source_code"));
    assert!(fields.contains("status"));
    assert!(fields.contains("id"));
  }

  #[test]
  fn id_is_always_included() {
    let fields = parse_fields(Some("stdout"));
    assert!(fields.contains("id"));
    assert!(fields.contains("stdout"));
  }

  #[test]
  fn unknown_names_are_silently_dropped() {
    let fields = parse_fields(Some("stdout,not_a_real_field"));
    assert!(!fields.contains("not_a_real_field"));
    assert!(fields.contains("stdout"));
  }
}
