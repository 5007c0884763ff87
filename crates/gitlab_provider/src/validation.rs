//! Field-presence validation for references and Info types.
//!
//! A [`Validator`] accumulates every violation before reporting, so callers
//! see the complete set of problems in one error.

use std::fmt;

use thiserror::Error;

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorReason {
    /// A required field was empty or absent.
    Missing,
    /// A field was present but held an unacceptable value.
    Invalid(String),
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: FieldErrorReason,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FieldErrorReason::Missing => write!(f, "field {} is required", self.field),
            FieldErrorReason::Invalid(why) => write!(f, "field {} is invalid: {}", self.field, why),
        }
    }
}

/// All violations found while validating one object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {}", format_errors(.errors))]
pub struct ValidationErrors {
    pub kind: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Build an error for a single invalid field.
    pub fn single(kind: &'static str, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            errors: vec![FieldError {
                field: field.into(),
                reason: FieldErrorReason::Invalid(reason.into()),
            }],
        }
    }

    /// Names of all fields that failed, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

fn format_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accumulating validator.
///
/// ```ignore
/// let mut v = Validator::new("DeployKeyInfo");
/// v.required("name", &info.name).required_bytes("key", &info.key);
/// v.finish()?;
/// ```
#[derive(Debug)]
pub struct Validator {
    kind: &'static str,
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            errors: Vec::new(),
        }
    }

    /// Require a non-blank string.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.missing(field);
        }
        self
    }

    /// Require an optional string to be present and non-blank.
    pub fn required_opt(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        self.required(field, value.unwrap_or_default())
    }

    /// Require a non-empty byte payload.
    pub fn required_bytes(&mut self, field: &str, value: &[u8]) -> &mut Self {
        if value.is_empty() {
            self.missing(field);
        }
        self
    }

    /// Reject an optional string that is present but blank.
    pub fn not_blank(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value
            && v.trim().is_empty()
        {
            self.invalid(field, "must not be blank");
        }
        self
    }

    pub fn missing(&mut self, field: &str) -> &mut Self {
        self.errors.push(FieldError {
            field: field.to_string(),
            reason: FieldErrorReason::Missing,
        });
        self
    }

    pub fn invalid(&mut self, field: &str, reason: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError {
            field: field.to_string(),
            reason: FieldErrorReason::Invalid(reason.into()),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                kind: self.kind,
                errors: self.errors,
            })
        }
    }
}

/// Types that can check their own required fields.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Types whose unset optional fields have provider defaults.
pub trait Defaulted {
    fn default_fields(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_accumulates_all_violations() {
        let mut v = Validator::new("Thing");
        v.required("name", "")
            .required_bytes("key", b"")
            .required_opt("owner", None)
            .required("ok", "present");

        let err = v.finish().expect_err("three fields are missing");
        assert_eq!(err.kind, "Thing");
        assert_eq!(err.fields(), vec!["name", "key", "owner"]);
        assert!(
            err.errors
                .iter()
                .all(|e| e.reason == FieldErrorReason::Missing)
        );
    }

    #[test]
    fn validator_passes_when_everything_is_present() {
        let mut v = Validator::new("Thing");
        v.required("name", "demo").required_bytes("key", b"ssh-ed25519 AAAA");
        assert!(v.is_empty());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut v = Validator::new("Thing");
        v.required("name", "   ");
        assert!(v.finish().is_err());
    }

    #[test]
    fn not_blank_only_rejects_present_blank_values() {
        let mut v = Validator::new("Thing");
        v.not_blank("a", None).not_blank("b", Some("x")).not_blank("c", Some(" "));
        let err = v.finish().expect_err("c is blank");
        assert_eq!(err.fields(), vec!["c"]);
    }

    #[test]
    fn display_lists_every_field() {
        let mut v = Validator::new("DeployKeyInfo");
        v.missing("name").invalid("key", "not an ssh key");
        let msg = v.finish().unwrap_err().to_string();
        assert!(msg.contains("invalid DeployKeyInfo"));
        assert!(msg.contains("field name is required"));
        assert!(msg.contains("field key is invalid: not an ssh key"));
    }
}
