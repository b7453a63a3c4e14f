//! Pre-flight validation of payroll requests.
//!
//! [`validate`] checks a request against the legal constraints of the rule
//! snapshot before any amount is computed. It collects every problem instead
//! of stopping at the first one, so a caller can show them all at once.
//! When the result is not valid, calculation must not proceed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use crate::calculation::{
    compute_adjustment, compute_contributions, compute_overtime, resolve_income_tax, taxable_income,
};
use crate::config::RuleSnapshot;
use crate::models::{MODERATE_DELAY_MAX_MINUTES, PayrollPeriod, PayrollRequest};

/// Longest delay accepted for one day, in minutes.
pub const MAX_DAILY_DELAY_MINUTES: u32 = 24 * 60;

/// Whether an issue is plain bad input or a breach of a business rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Malformed or out-of-range input.
    Validation,
    /// Well-formed input that breaks a payroll rule.
    BusinessRule,
}

/// One problem found in a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Validation or business rule.
    pub kind: IssueKind,
    /// Stable machine-readable code.
    pub code: String,
    /// The request field at fault.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue.
    pub fn new(
        kind: IssueKind,
        code: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code: code.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every error and warning found for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False as soon as one error is recorded.
    pub valid: bool,
    /// Problems that block calculation.
    pub errors: Vec<ValidationIssue>,
    /// Problems worth reporting that do not block calculation.
    pub warnings: Vec<ValidationIssue>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    /// Records a blocking error.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Records a warning.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// True when at least one error is a business-rule violation.
    pub fn has_business_rule_violation(&self) -> bool {
        self.errors.iter().any(|e| e.kind == IssueKind::BusinessRule)
    }

    /// Returns true if an error with the given code was recorded.
    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// All error messages joined into one line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn invalid(result: &mut ValidationResult, code: &str, field: &str, message: String) {
    result.push_error(ValidationIssue::new(IssueKind::Validation, code, field, message));
}

/// Validates a request against a rule snapshot.
///
/// # Arguments
///
/// * `request` - The request to check
/// * `snapshot` - The rules in force for the request's period
/// * `as_of` - Today's date; periods after this month are rejected
///
/// # Checks
///
/// - employee ID present
/// - base salary positive and at least the statutory minimum wage
/// - every hour and amount non-negative, every name non-blank
/// - overtime only alongside non-zero regular hours, and only for configured categories
/// - explicit deductions not above the estimated gross (base + allowances)
/// - period not in the future
/// - delay at most 24 hours, absence at most the days in the period
/// - once everything else passes, deductions plus attendance adjustments
///   not above gross, and net salary not negative (see [`NetBounds`])
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use paie_engine::config::ConfigLoader;
/// use paie_engine::models::{PayrollPeriod, PayrollRequest};
/// use paie_engine::validation::validate;
/// use rust_decimal::Decimal;
///
/// let loader = ConfigLoader::load("./config/senegal")?;
/// let period = PayrollPeriod::new(2024, 3).unwrap();
/// let snapshot = loader.rules().snapshot_for_period(period)?;
/// let request = PayrollRequest::new("emp_001", period, Decimal::ZERO, Decimal::ZERO);
///
/// let result = validate(&request, &snapshot, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
/// assert!(!result.valid);
/// # Ok::<(), paie_engine::error::PayrollError>(())
/// ```
pub fn validate(
    request: &PayrollRequest,
    snapshot: &RuleSnapshot,
    as_of: NaiveDate,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let days_in_period = request.period.days_in_period();

    if request.employee_id.trim().is_empty() {
        invalid(
            &mut result,
            "EMPLOYEE_ID_MISSING",
            "employee_id",
            "employee ID is required".to_string(),
        );
    }

    if request.base_salary <= Decimal::ZERO {
        invalid(
            &mut result,
            "BASE_SALARY_NOT_POSITIVE",
            "base_salary",
            format!("base salary must be positive, got {}", request.base_salary),
        );
    } else if request.base_salary < snapshot.minimum_monthly_wage {
        result.push_error(ValidationIssue::new(
            IssueKind::BusinessRule,
            "BASE_SALARY_BELOW_MINIMUM",
            "base_salary",
            format!(
                "base salary {} is below the minimum monthly wage {}",
                request.base_salary, snapshot.minimum_monthly_wage
            ),
        ));
    }

    if request.regular_hours < Decimal::ZERO {
        invalid(
            &mut result,
            "NEGATIVE_HOURS",
            "regular_hours",
            format!("regular hours cannot be negative, got {}", request.regular_hours),
        );
    } else if request.regular_hours > Decimal::from(24 * days_in_period) {
        invalid(
            &mut result,
            "HOURS_EXCEED_PERIOD",
            "regular_hours",
            format!(
                "{} regular hours exceed the {} hours in {}",
                request.regular_hours,
                24 * days_in_period,
                request.period
            ),
        );
    }

    let mut has_overtime = false;
    for (category, hours) in &request.hours_by_category {
        let field = format!("hours_by_category.{}", category);
        if *hours < Decimal::ZERO {
            invalid(
                &mut result,
                "NEGATIVE_HOURS",
                &field,
                format!("{} overtime hours cannot be negative, got {}", category, hours),
            );
            continue;
        }
        if *hours == Decimal::ZERO {
            continue;
        }
        has_overtime = true;

        match snapshot.overtime_rule(*category) {
            None => invalid(
                &mut result,
                "OVERTIME_CATEGORY_NOT_CONFIGURED",
                &field,
                format!("no overtime rule is configured for {}", category),
            ),
            Some(rule) => {
                if let Some(cap) = rule.max_hours_per_period.filter(|cap| hours > cap) {
                    result.push_warning(ValidationIssue::new(
                        IssueKind::BusinessRule,
                        "OVERTIME_ABOVE_CAP",
                        &field,
                        format!(
                            "{} {} hours exceed the {} hour cap and will be clamped",
                            hours, category, cap
                        ),
                    ));
                }
            }
        }
    }
    if has_overtime && request.regular_hours <= Decimal::ZERO {
        result.push_error(ValidationIssue::new(
            IssueKind::BusinessRule,
            "OVERTIME_WITHOUT_REGULAR_HOURS",
            "hours_by_category",
            "overtime hours require non-zero regular hours".to_string(),
        ));
    }

    for (kind, amounts) in [("allowances", &request.allowances), ("deductions", &request.deductions)] {
        for (name, amount) in amounts {
            if name.trim().is_empty() {
                invalid(
                    &mut result,
                    "BLANK_NAME",
                    kind,
                    format!("{} entries need a name", kind),
                );
            }
            if *amount < Decimal::ZERO {
                invalid(
                    &mut result,
                    "NEGATIVE_AMOUNT",
                    &format!("{}.{}", kind, name),
                    format!("{} '{}' cannot be negative, got {}", kind, name, amount),
                );
            }
        }
    }

    let estimated_gross = request.base_salary + request.total_allowances();
    let explicit_deductions = request.total_explicit_deductions();
    if explicit_deductions > estimated_gross {
        result.push_error(ValidationIssue::new(
            IssueKind::BusinessRule,
            "DEDUCTIONS_EXCEED_GROSS",
            "deductions",
            format!(
                "deductions {} exceed the estimated gross salary {}",
                explicit_deductions, estimated_gross
            ),
        ));
    }

    if request.period > PayrollPeriod::containing(as_of) {
        invalid(
            &mut result,
            "PERIOD_IN_FUTURE",
            "period",
            format!("period {} is after {}", request.period, as_of),
        );
    }

    let attendance = &request.attendance;
    if attendance.delay_minutes > MAX_DAILY_DELAY_MINUTES {
        invalid(
            &mut result,
            "DELAY_EXCEEDS_DAY",
            "attendance.delay_minutes",
            format!(
                "delay of {} minutes exceeds 24 hours",
                attendance.delay_minutes
            ),
        );
    } else if attendance.delay_minutes > MODERATE_DELAY_MAX_MINUTES {
        result.push_warning(ValidationIssue::new(
            IssueKind::BusinessRule,
            "DELAY_REQUIRES_APPROVAL",
            "attendance.delay_minutes",
            format!(
                "delay of {} minutes is severe; the penalty requires approval",
                attendance.delay_minutes
            ),
        ));
    }

    if attendance.absence_days < Decimal::ZERO {
        invalid(
            &mut result,
            "NEGATIVE_ABSENCE",
            "attendance.absence_days",
            format!("absence days cannot be negative, got {}", attendance.absence_days),
        );
    } else if attendance.absence_days > Decimal::from(days_in_period) {
        invalid(
            &mut result,
            "ABSENCE_EXCEEDS_PERIOD",
            "attendance.absence_days",
            format!(
                "{} absence days exceed the {} days in {}",
                attendance.absence_days, days_in_period, request.period
            ),
        );
    } else if attendance.is_paid_absence && attendance.absence_days > Decimal::ZERO {
        result.push_warning(ValidationIssue::new(
            IssueKind::Validation,
            "PAID_ABSENCE",
            "attendance.absence_days",
            format!(
                "{} days of paid absence will be recorded without deduction",
                attendance.absence_days
            ),
        ));
    }

    if result.valid {
        if let Some(bounds) = NetBounds::estimate(request, snapshot) {
            if bounds.deductions > bounds.gross {
                result.push_error(ValidationIssue::new(
                    IssueKind::BusinessRule,
                    "DEDUCTIONS_EXCEED_GROSS",
                    "deductions",
                    format!(
                        "deductions and attendance adjustments of up to {} exceed the gross salary {}",
                        bounds.deductions, bounds.gross
                    ),
                ));
            } else if bounds.deductions + bounds.withholdings > bounds.gross {
                result.push_error(ValidationIssue::new(
                    IssueKind::BusinessRule,
                    "NET_SALARY_NEGATIVE",
                    "deductions",
                    format!(
                        "deductions of up to {} plus tax and contributions of up to {} exceed the gross salary {}",
                        bounds.deductions, bounds.withholdings, bounds.gross
                    ),
                ));
            }
        }
    }

    result
}

/// Conservative bounds on the amounts the pipeline will produce.
///
/// Every money term the pipeline rounds lies between the floor and the ceiling
/// of its exact value, whatever the currency scale. `gross` is a lower bound of
/// the final gross; `withholdings` and `deductions` are upper bounds of income
/// tax plus employee contributions and of total deductions. When
/// `deductions + withholdings <= gross`, the computed net cannot be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetBounds {
    /// Lower bound of gross salary.
    pub gross: Decimal,
    /// Upper bound of income tax plus employee contributions.
    pub withholdings: Decimal,
    /// Upper bound of explicit deductions plus attendance adjustments.
    pub deductions: Decimal,
}

impl NetBounds {
    /// Estimates the bounds for a well-formed request.
    ///
    /// Returns `None` when a calculator rejects the request; the pipeline
    /// reports that failure itself.
    pub fn estimate(request: &PayrollRequest, snapshot: &RuleSnapshot) -> Option<Self> {
        let fixed_pay = request.base_salary.checked_add(request.total_allowances())?;
        let overtime = compute_overtime(
            &request.hours_by_category,
            snapshot.hourly_rate(request.base_salary),
            &snapshot.overtime,
        )
        .ok()?;
        let overtime_floor: Decimal = overtime.lines.iter().map(|l| l.amount.floor()).sum();
        let overtime_ceiling: Decimal = overtime.lines.iter().map(|l| l.amount.ceil()).sum();
        let gross_floor = fixed_pay + overtime_floor;
        let gross_ceiling = fixed_pay + overtime_ceiling;

        let contributions_floor = compute_contributions(gross_floor, &snapshot.contributions).ok()?;
        let contributions_ceiling =
            compute_contributions(gross_ceiling, &snapshot.contributions).ok()?;
        let employee_floor: Decimal = contributions_floor
            .lines
            .iter()
            .map(|l| l.employee_amount.floor())
            .sum();
        let employee_ceiling: Decimal = contributions_ceiling
            .lines
            .iter()
            .map(|l| l.employee_amount.ceil())
            .sum();

        let taxable = taxable_income(gross_ceiling, employee_floor, snapshot.income_tax.tax_base);
        let tax = resolve_income_tax(taxable, &snapshot.income_tax).ok()?;

        let adjustment = compute_adjustment(
            &request.attendance,
            snapshot.daily_rate(request.base_salary),
            &snapshot.attendance,
            snapshot.standard_daily_hours,
        )
        .ok()?;

        Some(Self {
            gross: gross_floor,
            withholdings: tax.tax.ceil() + employee_ceiling,
            deductions: request.total_explicit_deductions()
                + adjustment.delay_penalty.ceil()
                + adjustment.absence_deduction.ceil(),
        })
    }
}
