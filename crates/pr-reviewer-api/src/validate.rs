//! Field-level request validation.
//!
//! Each request shape implements [`Validate`] by calling the checks below
//! field by field. A field reports at most one error: the first rule it
//! breaks, checked in the order required, charset, minimum, maximum.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldErrorKind {
  Required,
  /// Only ASCII letters, digits, `-` and `_` are allowed.
  InvalidCharacters,
  TooShort { min: usize },
  TooLong { max: usize },
  Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field: String,
  #[serde(flatten)]
  pub kind:  FieldErrorKind,
}

impl std::fmt::Display for FieldError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self.kind {
      FieldErrorKind::Required => write!(f, "field '{}' is required", self.field),
      FieldErrorKind::InvalidCharacters => write!(
        f,
        "field '{}' must contain only letters, numbers, hyphens, and underscores",
        self.field
      ),
      FieldErrorKind::TooShort { min } => {
        write!(f, "field '{}' must be at least {min} characters", self.field)
      }
      FieldErrorKind::TooLong { max } => {
        write!(f, "field '{}' must be at most {max} characters", self.field)
      }
      FieldErrorKind::Duplicate => write!(f, "field '{}' is duplicated", self.field),
    }
  }
}

/// A request shape that can check its own fields.
pub trait Validate {
  /// Every field error; empty when the request is valid.
  fn validate(&self) -> Vec<FieldError>;
}

/// Accumulates field errors for one request.
#[derive(Debug, Default)]
pub struct Checks {
  errors: Vec<FieldError>,
}

impl Checks {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, field: impl Into<String>, kind: FieldErrorKind) {
    self.errors.push(FieldError { field: field.into(), kind });
  }

  /// A required string of `min..=max` characters.
  pub fn text(&mut self, field: impl Into<String>, value: &str, min: usize, max: usize) {
    if let Some(kind) = text_error(value, min, max) {
      self.push(field, kind);
    }
  }

  /// A required identifier: 1 to 100 characters of `[A-Za-z0-9_-]`.
  pub fn id(&mut self, field: impl Into<String>, value: &str) {
    let kind = if value.is_empty() {
      Some(FieldErrorKind::Required)
    } else if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
      Some(FieldErrorKind::InvalidCharacters)
    } else {
      text_error(value, ID_MIN, ID_MAX)
    };
    if let Some(kind) = kind {
      self.push(field, kind);
    }
  }

  pub fn finish(self) -> Vec<FieldError> { self.errors }
}

pub const ID_MIN: usize = 1;
pub const ID_MAX: usize = 100;

fn text_error(value: &str, min: usize, max: usize) -> Option<FieldErrorKind> {
  let len = value.chars().count();
  if len == 0 {
    Some(FieldErrorKind::Required)
  } else if len < min {
    Some(FieldErrorKind::TooShort { min })
  } else if len > max {
    Some(FieldErrorKind::TooLong { max })
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn id_errors(value: &str) -> Vec<FieldError> {
    let mut checks = Checks::new();
    checks.id("user_id", value);
    checks.finish()
  }

  #[test]
  fn ids_accept_the_documented_charset() {
    assert!(id_errors("u").is_empty());
    assert!(id_errors("pr_1-A9").is_empty());
    assert!(id_errors(&"x".repeat(100)).is_empty());
  }

  #[test]
  fn ids_report_the_first_broken_rule() {
    assert_eq!(id_errors("")[0].kind, FieldErrorKind::Required);
    assert_eq!(id_errors("has space")[0].kind, FieldErrorKind::InvalidCharacters);
    assert_eq!(id_errors("ünïcode")[0].kind, FieldErrorKind::InvalidCharacters);
    assert_eq!(id_errors(&"x".repeat(101))[0].kind, FieldErrorKind::TooLong { max: 100 });
    assert_eq!(id_errors("a b").len(), 1);
  }

  #[test]
  fn text_lengths_count_characters() {
    let mut checks = Checks::new();
    checks.text("team_name", "ab", 3, 50);
    checks.text("username", "éé", 2, 100);
    checks.text("pull_request_name", &"n".repeat(256), 5, 255);
    let errors = checks.finish();

    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], FieldError {
      field: "team_name".into(),
      kind:  FieldErrorKind::TooShort { min: 3 },
    });
    assert_eq!(errors[1].kind, FieldErrorKind::TooLong { max: 255 });
  }

  #[test]
  fn serialises_kind_inline() {
    let err = FieldError { field: "team_name".into(), kind: FieldErrorKind::TooShort { min: 3 } };
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json, serde_json::json!({"field": "team_name", "kind": "too_short", "min": 3}));
  }
}
