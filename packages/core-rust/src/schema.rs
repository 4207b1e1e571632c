//! Parameter descriptors declared by operations.
//!
//! Each operation lists the parameters it understands. Descriptors are plain
//! values built when the operation is constructed; operations call
//! [`validate_params`] to decide whether a request is usable. The dispatcher
//! itself never validates parameters.

use serde::{Deserialize, Serialize};

use crate::params::Params;

/// Numeric interpretation required of a parameter value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    /// Free-form text.
    #[default]
    None,
    /// Must parse as a signed 64-bit integer.
    Integer,
    /// Must parse as a finite 64-bit float.
    FloatingPoint,
}

/// Declaration of a single operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Parameter name as sent on the wire.
    pub name: String,
    /// Whether the parameter must be present and non-blank.
    pub mandatory: bool,
    /// Numeric constraint applied when the parameter is present.
    pub numeric: NumericKind,
}

impl ParamDescriptor {
    /// A parameter that must be present and non-blank.
    pub fn mandatory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: true,
            numeric: NumericKind::None,
        }
    }

    /// A parameter that may be omitted.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandatory: false,
            numeric: NumericKind::None,
        }
    }

    /// Requires the value to be an integer.
    #[must_use]
    pub fn integer(mut self) -> Self {
        self.numeric = NumericKind::Integer;
        self
    }

    /// Requires the value to be a floating-point number.
    #[must_use]
    pub fn floating_point(mut self) -> Self {
        self.numeric = NumericKind::FloatingPoint;
        self
    }

    /// Checks this descriptor against `params`, returning a description of
    /// the violation if any.
    #[must_use]
    pub fn check(&self, params: &Params) -> Option<String> {
        let value = params.get(&self.name);
        match value {
            None if self.mandatory => Some(format!("parameter '{}' is missing", self.name)),
            Some(v) if self.mandatory && v.trim().is_empty() => {
                Some(format!("parameter '{}' is blank", self.name))
            }
            Some(v) if !v.trim().is_empty() => self.check_numeric(v.trim()),
            _ => None,
        }
    }

    fn check_numeric(&self, value: &str) -> Option<String> {
        let ok = match self.numeric {
            NumericKind::None => true,
            NumericKind::Integer => value.parse::<i64>().is_ok(),
            NumericKind::FloatingPoint => value.parse::<f64>().is_ok_and(f64::is_finite),
        };
        if ok {
            None
        } else {
            Some(format!(
                "parameter '{}' is not a valid {} value: {value}",
                self.name,
                match self.numeric {
                    NumericKind::Integer => "integer",
                    _ => "floating-point",
                }
            ))
        }
    }
}

/// Result of validating request parameters against descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every descriptor is satisfied.
    Valid,
    /// One or more descriptors are violated.
    Invalid {
        /// Human-readable descriptions of each violation.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    /// Whether validation passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validates `params` against every descriptor, collecting all violations.
#[must_use]
pub fn validate_params(descriptors: &[ParamDescriptor], params: &Params) -> ValidationResult {
    let errors: Vec<String> = descriptors
        .iter()
        .filter_map(|d| d.check(params))
        .collect();
    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        tracing::debug!(?errors, "parameter validation failed");
        ValidationResult::Invalid { errors }
    }
}

/// Validates a free-text input such as a login field.
///
/// A `required` value must be non-empty; any value longer than `max_len`
/// characters is rejected.
#[must_use]
pub fn validate_text(value: Option<&str>, field: &str, required: bool, max_len: usize) -> bool {
    match value {
        None | Some("") if required => {
            tracing::debug!(field, "required field is empty");
            false
        }
        Some(v) if v.chars().count() > max_len => {
            tracing::debug!(field, max_len, "field exceeds maximum length");
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_descriptors() -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor::mandatory("username"),
            ParamDescriptor::mandatory("password"),
            ParamDescriptor::optional("age").integer(),
            ParamDescriptor::optional("score").floating_point(),
        ]
    }

    #[test]
    fn empty_params_report_every_mandatory_field() {
        let result = validate_params(&user_descriptors(), &Params::new());
        let ValidationResult::Invalid { errors } = result else {
            panic!("expected invalid");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("username"));
        assert!(errors[1].contains("password"));
    }

    #[test]
    fn blank_mandatory_value_is_rejected() {
        let params = Params::new().with("username", "   ").with("password", "x");
        assert!(!validate_params(&user_descriptors(), &params).is_valid());
    }

    #[test]
    fn numeric_kinds_are_checked_when_present() {
        let base = Params::new().with("username", "teo").with("password", "pwd");
        assert!(validate_params(&user_descriptors(), &base).is_valid());

        let bad_int = base.clone().with("age", "12.5");
        assert!(!validate_params(&user_descriptors(), &bad_int).is_valid());

        let good = base.clone().with("age", "42").with("score", "3.25");
        assert!(validate_params(&user_descriptors(), &good).is_valid());

        let nan = base.with("score", "NaN");
        assert!(!validate_params(&user_descriptors(), &nan).is_valid());
    }

    #[test]
    fn optional_blank_value_skips_numeric_check() {
        let params = Params::new()
            .with("username", "teo")
            .with("password", "pwd")
            .with("age", "");
        assert!(validate_params(&user_descriptors(), &params).is_valid());
    }

    #[test]
    fn validate_text_rules() {
        assert!(!validate_text(None, "username", true, 45));
        assert!(!validate_text(Some(""), "username", true, 45));
        assert!(validate_text(None, "note", false, 45));
        assert!(validate_text(Some("teo"), "username", true, 45));
        assert!(!validate_text(Some(&"x".repeat(46)), "username", true, 45));
        assert!(validate_text(Some(&"x".repeat(45)), "username", true, 45));
    }
}
