//! Error types for the payroll engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while loading rules and
//! computing payroll.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::PayrollPeriod;
use crate::validation::ValidationResult;

/// The main error type for the payroll engine.
///
/// The variants follow the engine's error taxonomy:
/// - [`PayrollError::Validation`]: the request is malformed or breaks a legal
///   rule; the caller must correct it. Business-rule violations are a
///   subtype, see [`PayrollError::is_business_rule_violation`].
/// - [`PayrollError::Calculation`] and [`PayrollError::MalformedRuleTable`]:
///   an internal invariant broke. These are defects and are never expected in
///   normal operation.
/// - The remaining variants cover the rule and employee-data collaborators.
///
/// # Example
///
/// ```
/// use paie_engine::error::PayrollError;
///
/// let error = PayrollError::ConfigNotFound {
///     path: "/missing/file.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/file.yaml");
/// ```
#[derive(Debug, Clone, Error)]
pub enum PayrollError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A rule table is inconsistent (bracket gap, duplicate scheme, ...).
    #[error("Malformed {table} table: {message}")]
    MalformedRuleTable {
        /// The table that failed its checks.
        table: String,
        /// What is wrong with it.
        message: String,
    },

    /// No rule set is effective on the requested date.
    #[error("No payroll rules effective on {date}")]
    RulesNotFound {
        /// The date rules were requested for.
        date: NaiveDate,
    },

    /// The employee data source has nothing for this employee and period.
    #[error("No payroll data for employee '{employee_id}' in period {period}")]
    EmployeeNotFound {
        /// The employee that was looked up.
        employee_id: String,
        /// The period that was looked up.
        period: PayrollPeriod,
    },

    /// The request failed validation; nothing was calculated.
    #[error("Validation failed: {}", .result.summary())]
    Validation {
        /// Every error and warning found.
        result: ValidationResult,
    },

    /// An internal invariant was broken during calculation.
    #[error("Calculation error: {message}")]
    Calculation {
        /// A description of the calculation error.
        message: String,
    },

    /// The same employee appears more than once in a bulk run.
    #[error("Duplicate payroll request for employee '{employee_id}' in the same batch")]
    DuplicateRequest {
        /// The repeated employee ID.
        employee_id: String,
    },
}

impl PayrollError {
    /// Shorthand for a [`PayrollError::Calculation`].
    pub fn calculation(message: impl Into<String>) -> Self {
        PayrollError::Calculation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`PayrollError::MalformedRuleTable`].
    pub fn malformed(table: impl Into<String>, message: impl Into<String>) -> Self {
        PayrollError::MalformedRuleTable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns true for validation failures (including business-rule violations).
    pub fn is_validation(&self) -> bool {
        matches!(self, PayrollError::Validation { .. })
    }

    /// Returns true when validation failed because of a business-rule violation.
    pub fn is_business_rule_violation(&self) -> bool {
        match self {
            PayrollError::Validation { result } => result.has_business_rule_violation(),
            _ => false,
        }
    }

    /// Returns true for errors that indicate a defect rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            PayrollError::Calculation { .. } | PayrollError::MalformedRuleTable { .. }
        )
    }
}

/// A type alias for Results that return PayrollError.
pub type EngineResult<T> = Result<T, PayrollError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{IssueKind, ValidationIssue};

    #[test]
    fn test_config_not_found_displays_path() {
        let error = PayrollError::ConfigNotFound {
            path: "/missing/file.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/file.yaml"
        );
    }

    #[test]
    fn test_config_parse_error_displays_path_and_message() {
        let error = PayrollError::ConfigParseError {
            path: "/config/bad.yaml".to_string(),
            message: "invalid YAML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration file '/config/bad.yaml': invalid YAML syntax"
        );
    }

    #[test]
    fn test_malformed_table_displays_table_and_message() {
        let error = PayrollError::malformed("tax bracket", "gap between brackets 1 and 2");
        assert_eq!(
            error.to_string(),
            "Malformed tax bracket table: gap between brackets 1 and 2"
        );
        assert!(error.is_defect());
    }

    #[test]
    fn test_rules_not_found_displays_date() {
        let error = PayrollError::RulesNotFound {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        assert_eq!(error.to_string(), "No payroll rules effective on 2020-01-01");
    }

    #[test]
    fn test_employee_not_found_displays_id_and_period() {
        let error = PayrollError::EmployeeNotFound {
            employee_id: "emp_404".to_string(),
            period: PayrollPeriod::new(2024, 5).unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "No payroll data for employee 'emp_404' in period 2024-05"
        );
    }

    #[test]
    fn test_validation_error_lists_every_issue() {
        let mut result = ValidationResult::default();
        result.push_error(ValidationIssue::new(
            IssueKind::Validation,
            "BASE_SALARY_BELOW_MINIMUM",
            "base_salary",
            "below minimum wage",
        ));
        result.push_error(ValidationIssue::new(
            IssueKind::BusinessRule,
            "DEDUCTIONS_EXCEED_GROSS",
            "deductions",
            "deductions exceed gross",
        ));

        let error = PayrollError::Validation { result };
        let text = error.to_string();
        assert!(text.contains("below minimum wage"));
        assert!(text.contains("deductions exceed gross"));
        assert!(error.is_validation());
        assert!(error.is_business_rule_violation());
        assert!(!error.is_defect());
    }

    #[test]
    fn test_calculation_error_displays_message() {
        let error = PayrollError::calculation("net salary is negative");
        assert_eq!(
            error.to_string(),
            "Calculation error: net salary is negative"
        );
        assert!(error.is_defect());
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<PayrollError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_config_not_found() -> EngineResult<()> {
            Err(PayrollError::ConfigNotFound {
                path: "/test".to_string(),
            })
        }

        fn propagates_error() -> EngineResult<()> {
            returns_config_not_found()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
