use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A runnable/compilable language descriptor, backed by the `languages`
/// table. Seeded by migration, read-mostly thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
  pub id: i32,
  pub name: String,
  pub version: String,
  pub file_name: String,
  pub file_extension: String,
  pub compile_command: Option<String>,
  pub run_command: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The trimmed shape returned by the language list endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LanguageSummary {
  pub id: i32,
  pub name: String,
  pub version: String,
}

impl Language {
  /// True for a language the Node.js stderr noise filter applies to.
  /// Matched case-insensitively, following the original worker's match.
  pub fn is_node(&self) -> bool {
    self.name.eq_ignore_ascii_case("node.js") || self.name.eq_ignore_ascii_case("javascript")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(name: &str) -> Language {
    Language {
      id: 1,
      name: name.to_string(),
      version: "20".into(),
      file_name: "script".into(),
      file_extension: ".js".into(),
      compile_command: None,
      run_command: "node script.js".into(),
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn node_detection_is_case_insensitive() {
    assert!(node("Node.js").is_node());
    assert!(node("NODE.JS").is_node());
    assert!(!node("Python").is_node());
  }
}
