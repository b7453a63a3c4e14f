//! Payroll aggregation.
//!
//! This module combines the outputs of the tax, contribution, overtime and
//! attendance calculators into one [`PayrollResult`]:
//!
//! ```text
//! gross            = base + allowances + overtime
//! total_deductions = explicit deductions + delay penalty + absence deduction
//! net              = gross - income tax - employee contributions - total_deductions
//! ```
//!
//! `net >= 0` and `total_deductions <= gross` are hard invariants: a
//! violation fails with [`PayrollError::Calculation`] and is never clamped.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;

use crate::error::{EngineResult, PayrollError};
use crate::models::{CalculationDetail, DelayTier, PayrollRequest, PayrollResult};

use super::attendance::AttendanceAdjustment;
use super::income_tax::IncomeTaxResult;
use super::overtime::OvertimeResult;
use super::social_contributions::ContributionResult;

/// Collects calculation details with sequential step numbers.
#[derive(Debug, Default)]
struct DetailLog {
    details: Vec<CalculationDetail>,
}

impl DetailLog {
    fn push(
        &mut self,
        rule_id: impl Into<String>,
        label: impl Into<String>,
        formula: impl Into<String>,
        amount: Decimal,
        inputs: serde_json::Value,
    ) {
        let step_number = self.details.len() as u32 + 1;
        self.details.push(CalculationDetail {
            step_number,
            rule_id: rule_id.into(),
            label: label.into(),
            formula: formula.into(),
            amount,
            inputs,
        });
    }
}

/// Builds the final payroll result and enforces its invariants.
///
/// All amounts passed in are expected to be rounded already; the aggregator
/// only adds and subtracts them.
///
/// # Arguments
///
/// * `request` - The validated request
/// * `tax` - Income tax for the period
/// * `contributions` - Contributions per scheme
/// * `overtime` - Overtime valuation
/// * `adjustment` - Attendance adjustment
/// * `rules_effective_date` - Effective date of the rule snapshot used
///
/// # Errors
///
/// Returns [`PayrollError::Calculation`] if total deductions exceed gross
/// salary, if net salary would be negative, or if the overtime total does not
/// match its lines.
pub fn aggregate(
    request: &PayrollRequest,
    tax: &IncomeTaxResult,
    contributions: &ContributionResult,
    overtime: &OvertimeResult,
    adjustment: &AttendanceAdjustment,
    rules_effective_date: NaiveDate,
) -> EngineResult<PayrollResult> {
    let mut log = DetailLog::default();

    let overtime_by_category = overtime.amount_by_category();
    let overtime_sum: Decimal = overtime_by_category.values().copied().sum();
    if overtime_sum != overtime.total_amount {
        return Err(PayrollError::calculation(format!(
            "overtime total {} does not match category sum {}",
            overtime.total_amount, overtime_sum
        )));
    }

    log.push(
        "base_salary",
        "Base salary",
        format!("{}", request.base_salary.normalize()),
        request.base_salary,
        json!({ "base_salary": request.base_salary.to_string() }),
    );

    for (name, amount) in &request.allowances {
        log.push(
            format!("allowance:{}", name),
            format!("Allowance: {}", name),
            format!("{}", amount.normalize()),
            *amount,
            json!({ "name": name }),
        );
    }
    let total_allowances = request.total_allowances();

    for line in &overtime.lines {
        log.push(
            format!("overtime:{}", line.category),
            format!("Overtime ({})", line.category),
            format!(
                "{} h × {} × {}",
                line.paid_hours.normalize(),
                line.hourly_rate.round_dp(4).normalize(),
                line.multiplier.normalize()
            ),
            line.amount,
            json!({
                "requested_hours": line.requested_hours.to_string(),
                "paid_hours": line.paid_hours.to_string(),
                "hourly_rate": line.hourly_rate.to_string(),
                "multiplier": line.multiplier.to_string(),
            }),
        );
    }

    let gross_salary = request.base_salary + total_allowances + overtime.total_amount;
    log.push(
        "gross_salary",
        "Gross salary",
        format!(
            "{} + {} + {}",
            request.base_salary.normalize(),
            total_allowances.normalize(),
            overtime.total_amount.normalize()
        ),
        gross_salary,
        json!({
            "base_salary": request.base_salary.to_string(),
            "total_allowances": total_allowances.to_string(),
            "total_overtime": overtime.total_amount.to_string(),
        }),
    );

    for line in &contributions.lines {
        let formula = match line.income_ceiling {
            Some(ceiling) => format!(
                "min({}, {}) × {}",
                gross_salary.normalize(),
                ceiling.normalize(),
                line.employee_rate.normalize()
            ),
            None => format!(
                "{} × {}",
                gross_salary.normalize(),
                line.employee_rate.normalize()
            ),
        };
        log.push(
            format!("contribution:{}", line.scheme_name),
            format!("Contribution: {}", line.scheme_name),
            formula,
            line.employee_amount,
            json!({
                "base": line.base.to_string(),
                "employee_rate": line.employee_rate.to_string(),
                "employer_rate": line.employer_rate.to_string(),
                "employer_amount": line.employer_amount.to_string(),
            }),
        );
    }
    let total_contributions = contributions.employee_total();

    log.push(
        "taxable_income",
        "Taxable income",
        format!("{}", tax.taxable_income.normalize()),
        tax.taxable_income,
        json!({ "gross_salary": gross_salary.to_string() }),
    );

    let bracket_formula = format!(
        "{} + ({} − {}) × {}",
        tax.bracket.fixed_amount.normalize(),
        tax.bracket_income.normalize(),
        tax.bracket.min_income.normalize(),
        tax.bracket.rate.normalize()
    );
    log.push(
        "income_tax",
        "Income tax (IRPP)",
        if tax.annualized {
            format!("({}) / 12", bracket_formula)
        } else {
            bracket_formula
        },
        tax.tax,
        json!({
            "bracket_income": tax.bracket_income.to_string(),
            "bracket_min_income": tax.bracket.min_income.to_string(),
            "bracket_rate": tax.bracket.rate.to_string(),
            "bracket_fixed_amount": tax.bracket.fixed_amount.to_string(),
            "annualized": tax.annualized,
        }),
    );

    for (name, amount) in &request.deductions {
        log.push(
            format!("deduction:{}", name),
            format!("Deduction: {}", name),
            format!("{}", amount.normalize()),
            *amount,
            json!({ "name": name }),
        );
    }

    if adjustment.tier != DelayTier::None {
        log.push(
            "delay_penalty",
            "Delay penalty",
            format!(
                "{} min late ({:?})",
                adjustment.delay_minutes, adjustment.tier
            ),
            adjustment.delay_penalty,
            json!({
                "delay_minutes": adjustment.delay_minutes,
                "daily_rate": adjustment.daily_rate.to_string(),
                "requires_approval": adjustment.requires_approval,
            }),
        );
    }
    if adjustment.absence_days > Decimal::ZERO {
        let formula = if adjustment.is_paid_absence {
            format!("{} days paid absence", adjustment.absence_days.normalize())
        } else {
            format!(
                "{} days × {}",
                adjustment.absence_days.normalize(),
                adjustment.daily_rate.round_dp(4).normalize()
            )
        };
        log.push(
            "absence_deduction",
            "Absence deduction",
            formula,
            adjustment.absence_deduction,
            json!({
                "absence_days": adjustment.absence_days.to_string(),
                "is_paid_absence": adjustment.is_paid_absence,
            }),
        );
    }

    let explicit_deductions = request.total_explicit_deductions();
    let total_deductions = explicit_deductions + adjustment.total();
    log.push(
        "total_deductions",
        "Total deductions",
        format!(
            "{} + {} + {}",
            explicit_deductions.normalize(),
            adjustment.delay_penalty.normalize(),
            adjustment.absence_deduction.normalize()
        ),
        total_deductions,
        json!({}),
    );

    if total_deductions > gross_salary {
        return Err(PayrollError::calculation(format!(
            "total deductions {} exceed gross salary {} for employee '{}'",
            total_deductions, gross_salary, request.employee_id
        )));
    }

    let net_salary = gross_salary - tax.tax - total_contributions - total_deductions;
    if net_salary < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "net salary {} is negative for employee '{}'",
            net_salary, request.employee_id
        )));
    }
    log.push(
        "net_salary",
        "Net salary",
        format!(
            "{} − {} − {} − {}",
            gross_salary.normalize(),
            tax.tax.normalize(),
            total_contributions.normalize(),
            total_deductions.normalize()
        ),
        net_salary,
        json!({}),
    );

    let mut warnings = overtime.warnings.clone();
    warnings.extend(adjustment.warnings.iter().cloned());

    Ok(PayrollResult {
        employee_id: request.employee_id.clone(),
        period: request.period,
        rules_effective_date,
        base_salary: request.base_salary,
        gross_salary,
        taxable_income: tax.taxable_income,
        income_tax: tax.tax,
        contributions_by_scheme: contributions.employee_by_scheme(),
        employer_contributions_by_scheme: contributions.employer_by_scheme(),
        overtime_amount_by_category: overtime_by_category,
        total_overtime: overtime.total_amount,
        total_allowances,
        total_deductions,
        net_salary,
        attendance: adjustment.summary(),
        warnings,
        calculation_details: log.details,
    })
}
