//! Payroll result models.
//!
//! This module contains the [`PayrollResult`] type and its associated structures
//! that capture all outputs from a payroll calculation: gross and net pay,
//! tax, contributions, overtime, attendance adjustments, warnings and the
//! ordered calculation details that trace every figure.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DelayTier, OvertimeCategory, PayrollPeriod};

/// One traced term of a payroll calculation.
///
/// Details are appended in calculation order so a reader (or an audit sink)
/// can replay the computation from the formulas alone.
///
/// # Example
///
/// ```
/// use paie_engine::models::CalculationDetail;
/// use rust_decimal::Decimal;
///
/// let detail = CalculationDetail {
///     step_number: 1,
///     rule_id: "base_salary".to_string(),
///     label: "Base salary".to_string(),
///     formula: "base salary".to_string(),
///     amount: Decimal::new(500_000, 0),
///     inputs: serde_json::json!({}),
/// };
/// assert_eq!(detail.amount, Decimal::new(500_000, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationDetail {
    /// The sequential step number.
    pub step_number: u32,
    /// Stable identifier of the rule that produced the amount.
    pub rule_id: String,
    /// Human-readable label.
    pub label: String,
    /// The formula with its operands substituted.
    pub formula: String,
    /// The resulting amount.
    pub amount: Decimal,
    /// The operands, keyed by name.
    pub inputs: serde_json::Value,
}

/// How much attention a warning needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    /// Informational.
    Low,
    /// Should be reviewed.
    Medium,
    /// Must be reviewed before the payslip is released.
    High,
}

/// A warning raised during calculation.
///
/// Warnings never block a calculation but travel with the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level.
    pub severity: WarningSeverity,
}

/// Attendance outcome reported on the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    /// The delay tier that applied.
    pub tier: DelayTier,
    /// Minutes of delay.
    pub delay_minutes: u32,
    /// Amount withheld for the delay.
    pub delay_penalty: Decimal,
    /// Days absent, paid or not.
    pub absence_days: Decimal,
    /// Days of the absence that were paid leave.
    pub paid_absence_days: Decimal,
    /// Amount withheld for unpaid absence.
    pub absence_deduction: Decimal,
    /// Whether the delay penalty needs manager approval.
    pub requires_approval: bool,
}

/// The complete result of one employee's payroll for one period.
///
/// Results hold no timestamps or random identifiers: the same request and
/// rule snapshot always produce an identical value.
///
/// Invariants (checked when the result is built):
/// - `net_salary = gross_salary - income_tax - Σ contributions_by_scheme - total_deductions`
/// - `net_salary >= 0`
/// - `total_deductions <= gross_salary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollResult {
    /// The ID of the employee the calculation is for.
    pub employee_id: String,
    /// The period paid.
    pub period: PayrollPeriod,
    /// Effective date of the rule set used.
    pub rules_effective_date: chrono::NaiveDate,
    /// Monthly base salary.
    pub base_salary: Decimal,
    /// Base salary plus allowances plus overtime.
    pub gross_salary: Decimal,
    /// Income subject to IRPP.
    pub taxable_income: Decimal,
    /// IRPP withheld.
    pub income_tax: Decimal,
    /// Employee-side contributions by scheme (deducted from net).
    pub contributions_by_scheme: BTreeMap<String, Decimal>,
    /// Employer-side contributions by scheme (employer cost, not deducted).
    pub employer_contributions_by_scheme: BTreeMap<String, Decimal>,
    /// Overtime pay by category.
    pub overtime_amount_by_category: BTreeMap<OvertimeCategory, Decimal>,
    /// Sum of overtime pay.
    pub total_overtime: Decimal,
    /// Sum of allowances.
    pub total_allowances: Decimal,
    /// Explicit deductions plus attendance adjustments.
    pub total_deductions: Decimal,
    /// Amount paid to the employee.
    pub net_salary: Decimal,
    /// Attendance adjustment outcome.
    pub attendance: AttendanceSummary,
    /// Warnings raised along the way.
    pub warnings: Vec<CalculationWarning>,
    /// Every contributing term, in calculation order.
    pub calculation_details: Vec<CalculationDetail>,
}

impl PayrollResult {
    /// Sum of employee-side contributions.
    pub fn total_contributions(&self) -> Decimal {
        self.contributions_by_scheme.values().copied().sum()
    }

    /// Sum of employer-side contributions.
    pub fn total_employer_contributions(&self) -> Decimal {
        self.employer_contributions_by_scheme.values().copied().sum()
    }

    /// Total cost of the employee to the employer.
    pub fn employer_cost(&self) -> Decimal {
        self.gross_salary + self.total_employer_contributions()
    }

    /// Returns the calculation detail produced by the given rule, if any.
    pub fn detail(&self, rule_id: &str) -> Option<&CalculationDetail> {
        self.calculation_details.iter().find(|d| d.rule_id == rule_id)
    }
}
