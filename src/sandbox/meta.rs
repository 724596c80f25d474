use std::collections::HashMap;

/// A parsed isolate meta file: a free-form `key:value` map. Unknown keys
/// are preserved verbatim so they can still be surfaced to API clients
/// through `Submission::meta`, even though this crate only interprets a
/// handful of them (`time`, `max-rss`, `exitcode`, `status`, `message`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta(pub HashMap<String, String>);

impl Meta {
  /// Parses isolate's meta file format: one `key:value` pair per
  /// non-empty line, split on the *first* colon only (values such as
  /// `message:Command exited with status 1: No such file` contain
  /// colons of their own). A later duplicate key overwrites an earlier
  /// one, matching line-by-line last-write-wins semantics.
  pub fn parse(contents: &str) -> Self {
    let mut map = HashMap::new();

    for line in contents.lines() {
      if line.is_empty() {
        continue;
      }

      if let Some((key, value)) = line.split_once(':') {
        map.insert(key.to_string(), value.to_string());
      }
    }

    Self(map)
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn time(&self) -> Option<f64> {
    self.get("time").and_then(|v| v.parse().ok())
  }

  pub fn max_rss(&self) -> Option<f64> {
    self.get("max-rss").and_then(|v| v.parse().ok())
  }

  pub fn exit_code(&self) -> Option<i32> {
    self.get("exitcode").and_then(|v| v.parse().ok())
  }

  pub fn status(&self) -> Option<&str> {
    self.get("status")
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.insert(key.into(), value.into());
  }

  pub fn into_map(self) -> HashMap<String, String> {
    self.0
  }
}

impl From<HashMap<String, String>> for Meta {
  fn from(map: HashMap<String, String>) -> Self {
    Self(map)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_key_value_lines() {
    let meta = Meta::parse("time:0.012\nmax-rss:1984\nexitcode:0\nstatus:OK\n");
    assert_eq!(meta.time(), Some(0.012));
    assert_eq!(meta.max_rss(), Some(1984.0));
    assert_eq!(meta.exit_code(), Some(0));
    assert_eq!(meta.status(), Some("OK"));
  }

  #[test]
  fn splits_on_first_colon_only() {
    let meta = Meta::parse("message:Command exited with status 1: No such file\n");
    assert_eq!(
      meta.get("message"),
      Some("Command exited with status 1: No such file")
    );
  }

  #[test]
  fn last_duplicate_key_wins() {
    let meta = Meta::parse("time:0.1\ntime:0.2\n");
    assert_eq!(meta.time(), Some(0.2));
  }

  #[test]
  fn ignores_blank_lines_and_preserves_unknown_keys() {
    let meta = Meta::parse("\ncg-mem:2048\n\ncsw-voluntary:4\n");
    assert_eq!(meta.get("cg-mem"), Some("2048"));
    assert_eq!(meta.get("csw-voluntary"), Some("4"));
  }
}
