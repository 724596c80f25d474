use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

pub trait PathExt {
  fn create(&self, mode: u32) -> Result<()>;
  fn recreate(&self, mode: u32) -> Result<()>;
}

impl PathExt for PathBuf {
  fn create(&self, mode: u32) -> Result<()> {
    fs::create_dir_all(self)?;
    fs::set_permissions(self, fs::Permissions::from_mode(mode))?;
    Ok(())
  }

  fn recreate(&self, mode: u32) -> Result<()> {
    if self.exists() {
      fs::remove_dir_all(self)?;
    }

    self.create(mode)
  }
}

/// Rejects file names supplied by a submission (the main source file name,
/// an additional file's name) that escape the box directory: absolute
/// paths, parent references, or any path with more than one component.
pub fn validate_relative_file_name(name: &str) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::Validation("file name must not be empty".into()));
  }

  let path = Path::new(name);
  let mut components = path.components();

  match components.next() {
    Some(Component::Normal(_)) => {}
    _ => {
      return Err(Error::Validation(format!(
        "file name {name:?} is not a plain relative path"
      )))
    }
  }

  if components.next().is_some() {
    return Err(Error::Validation(format!(
      "file name {name:?} must not contain path separators"
    )));
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use {super::*, tempfile::TempDir};

  #[test]
  fn create_with_mode() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test");
    path.create(0o700).unwrap();
    assert!(path.is_dir());
    let metadata = fs::metadata(&path).unwrap();
    assert_eq!(metadata.permissions().mode() & 0o777, 0o700);
  }

  #[test]
  fn recreate_with_mode() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test");
    path.create(0o770).unwrap();
    path.recreate(0o700).unwrap();
    assert_eq!(
      fs::metadata(&path).unwrap().permissions().mode() & 0o777,
      0o700
    );
  }

  #[test]
  fn nested_create() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a/b/c");
    path.create(0o700).unwrap();
    assert!(path.is_dir());
  }

  #[test]
  fn accepts_plain_names() {
    assert!(validate_relative_file_name("main.py").is_ok());
    assert!(validate_relative_file_name("helper.h").is_ok());
  }

  #[test]
  fn rejects_traversal_and_absolute_paths() {
    assert!(validate_relative_file_name("../etc/passwd").is_err());
    assert!(validate_relative_file_name("/etc/passwd").is_err());
    assert!(validate_relative_file_name("a/b").is_err());
    assert!(validate_relative_file_name("").is_err());
    assert!(validate_relative_file_name("   ").is_err());
  }
}
