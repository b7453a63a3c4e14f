//! Overtime pay calculation.
//!
//! This module values overtime hours by category. Each category is priced
//! independently:
//!
//! ```text
//! paid_hours = min(hours, max_hours_per_period)
//! amount     = paid_hours * hourly_rate * multiplier
//! ```
//!
//! Hours above a category's cap are not paid at that tier. They are never
//! dropped silently: every clamp produces a warning naming the category and
//! the uncompensated hours.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use tracing::warn;

use crate::config::{MoneyRounding, OvertimeRule};
use crate::error::{EngineResult, PayrollError};
use crate::models::{CalculationWarning, OvertimeCategory, WarningSeverity};

const TABLE: &str = "overtime rule";

/// Warning code raised when hours exceed a category cap.
pub const OVERTIME_CAP_WARNING: &str = "OVERTIME_HOURS_CLAMPED";

/// The valuation of one overtime category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvertimeLine {
    /// The category.
    pub category: OvertimeCategory,
    /// Hours submitted.
    pub requested_hours: Decimal,
    /// Hours paid after the cap.
    pub paid_hours: Decimal,
    /// The base hourly rate.
    pub hourly_rate: Decimal,
    /// The category multiplier.
    pub multiplier: Decimal,
    /// `paid_hours * hourly_rate * multiplier`.
    pub amount: Decimal,
}

/// The valuation of every overtime category.
///
/// `total_amount` is always the sum of the line amounts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OvertimeResult {
    /// One line per category with hours, ordered by category.
    pub lines: Vec<OvertimeLine>,
    /// Sum of the line amounts.
    pub total_amount: Decimal,
    /// Cap warnings.
    pub warnings: Vec<CalculationWarning>,
}

impl OvertimeResult {
    /// Amount by category.
    pub fn amount_by_category(&self) -> BTreeMap<OvertimeCategory, Decimal> {
        self.lines.iter().map(|l| (l.category, l.amount)).collect()
    }

    /// Rounds every line to the ledger currency and recomputes the total from
    /// the rounded lines.
    pub fn rounded(&self, rounding: MoneyRounding) -> Self {
        let lines: Vec<OvertimeLine> = self
            .lines
            .iter()
            .map(|l| OvertimeLine {
                amount: rounding.round(l.amount),
                ..l.clone()
            })
            .collect();
        let total_amount = lines.iter().map(|l| l.amount).sum();
        Self {
            lines,
            total_amount,
            warnings: self.warnings.clone(),
        }
    }
}

/// Values overtime hours by category.
///
/// # Arguments
///
/// * `hours_by_category` - Overtime hours submitted per category
/// * `hourly_rate` - Base hourly rate (`base_salary / standard_monthly_hours`)
/// * `rules` - The overtime rules in force
///
/// # Returns
///
/// An [`OvertimeResult`] with exact (unrounded) amounts. Categories with zero
/// hours produce no line.
///
/// # Errors
///
/// Returns [`PayrollError::Calculation`] if hours are submitted for a
/// category with no rule, or if hours or rate are negative.
///
/// # Example
///
/// ```
/// use paie_engine::calculation::compute_overtime;
/// use paie_engine::config::OvertimeRule;
/// use paie_engine::models::OvertimeCategory;
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let rules = vec![OvertimeRule {
///     category: OvertimeCategory::Night,
///     multiplier: Decimal::new(16, 1),
///     max_hours_per_period: Some(Decimal::new(10, 0)),
/// }];
/// let hours = BTreeMap::from([(OvertimeCategory::Night, Decimal::new(12, 0))]);
///
/// let result = compute_overtime(&hours, Decimal::new(2000, 0), &rules).unwrap();
/// assert_eq!(result.lines[0].paid_hours, Decimal::new(10, 0));
/// assert_eq!(result.total_amount, Decimal::new(32_000, 0));
/// assert_eq!(result.warnings.len(), 1);
/// ```
pub fn compute_overtime(
    hours_by_category: &BTreeMap<OvertimeCategory, Decimal>,
    hourly_rate: Decimal,
    rules: &[OvertimeRule],
) -> EngineResult<OvertimeResult> {
    if hourly_rate < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "hourly rate cannot be negative, got {}",
            hourly_rate
        )));
    }

    let mut lines = Vec::new();
    let mut warnings = Vec::new();

    for (&category, &hours) in hours_by_category {
        if hours < Decimal::ZERO {
            return Err(PayrollError::calculation(format!(
                "{} overtime hours cannot be negative, got {}",
                category, hours
            )));
        }
        if hours == Decimal::ZERO {
            continue;
        }

        let rule = rules
            .iter()
            .find(|r| r.category == category)
            .ok_or_else(|| {
                PayrollError::calculation(format!("no overtime rule for category {}", category))
            })?;

        let paid_hours = match rule.max_hours_per_period {
            Some(cap) if hours > cap => {
                let excess = hours - cap;
                warn!(
                    category = %category,
                    requested_hours = %hours,
                    cap = %cap,
                    "Overtime hours clamped to category cap"
                );
                warnings.push(CalculationWarning {
                    code: OVERTIME_CAP_WARNING.to_string(),
                    message: format!(
                        "{} overtime clamped to {} hours: {} hours above the cap are not compensated at this tier",
                        category,
                        cap.normalize(),
                        excess.normalize()
                    ),
                    severity: WarningSeverity::Medium,
                });
                cap
            }
            _ => hours,
        };

        lines.push(OvertimeLine {
            category,
            requested_hours: hours,
            paid_hours,
            hourly_rate,
            multiplier: rule.multiplier,
            amount: paid_hours * hourly_rate * rule.multiplier,
        });
    }

    let total_amount = lines.iter().map(|l| l.amount).sum();
    Ok(OvertimeResult {
        lines,
        total_amount,
        warnings,
    })
}

/// Checks an overtime table: one rule per category, multipliers above 1,
/// non-negative caps.
pub fn validate_overtime_rules(rules: &[OvertimeRule]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.category) {
            return Err(PayrollError::malformed(
                TABLE,
                format!("category {} has more than one rule", rule.category),
            ));
        }
        if rule.multiplier <= Decimal::ONE {
            return Err(PayrollError::malformed(
                TABLE,
                format!(
                    "category {} multiplier must be greater than 1, got {}",
                    rule.category, rule.multiplier
                ),
            ));
        }
        if rule.max_hours_per_period.is_some_and(|cap| cap < Decimal::ZERO) {
            return Err(PayrollError::malformed(
                TABLE,
                format!("category {} cap cannot be negative", rule.category),
            ));
        }
    }
    Ok(())
}
