#[macro_export]
macro_rules! ensure {
  ($cond:expr, $err:expr) => {
    if !($cond) {
      return Err($err);
    }
  };
  ($cond:expr, $fmt:expr, $($arg:tt)*) => {
    if !($cond) {
      return Err(format!($fmt, $($arg)*).into());
    }
  };
}

#[cfg(test)]
mod tests {
  use crate::error::Error;

  fn validate_page_size(size: u32) -> Result<(), Error> {
    ensure!(
      size >= 1 && size <= 100,
      Error::Validation(format!("page_size {size} out of range"))
    );
    Ok(())
  }

  #[test]
  fn passes_when_condition_holds() {
    assert!(validate_page_size(50).is_ok());
  }

  #[test]
  fn returns_error_when_condition_fails() {
    assert!(matches!(
      validate_page_size(0),
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      validate_page_size(500),
      Err(Error::Validation(_))
    ));
  }
}
