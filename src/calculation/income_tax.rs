//! Progressive income tax (IRPP) calculation.
//!
//! This module provides the validated [`TaxBracketTable`] and the functions
//! that compute tax from it.
//!
//! ## Bracket Structure
//!
//! Brackets are ordered ascending, contiguous and non-overlapping; the first
//! starts at zero and the last is unbounded. Each bracket carries the tax due
//! on all lower brackets as `fixed_amount`, so the tax on an income `x` in
//! bracket `b` is:
//!
//! ```text
//! tax(x) = b.fixed_amount + (x - b.min_income) * b.rate
//! ```
//!
//! This closed form always equals the marginal walk over the brackets; the
//! table refuses to build otherwise.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::{TaxBase, TaxBracket, TaxSchedule};
use crate::error::{EngineResult, PayrollError};

const TABLE: &str = "tax bracket";

/// A bracket table that has passed every structural check.
///
/// # Example
///
/// ```
/// use paie_engine::calculation::{TaxBracketTable, compute_income_tax};
/// use rust_decimal::Decimal;
///
/// let table = TaxBracketTable::from_marginal_rates(&[
///     (Decimal::ZERO, Decimal::ZERO),
///     (Decimal::new(100_000, 0), Decimal::new(20, 2)),
/// ])
/// .unwrap();
///
/// let tax = compute_income_tax(Decimal::new(150_000, 0), &table).unwrap();
/// assert_eq!(tax, Decimal::new(10_000, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>")]
pub struct TaxBracketTable {
    brackets: Vec<TaxBracket>,
}

impl TaxBracketTable {
    /// Validates and wraps a bracket list.
    ///
    /// # Errors
    ///
    /// Returns [`PayrollError::MalformedRuleTable`] if the list is empty, does
    /// not start at zero, has a gap or overlap, has a bounded last bracket or an
    /// unbounded inner one, has a rate outside 0..=1, or carries a
    /// `fixed_amount` that disagrees with the cumulative tax below it.
    pub fn new(brackets: Vec<TaxBracket>) -> EngineResult<Self> {
        let first = brackets
            .first()
            .ok_or_else(|| PayrollError::malformed(TABLE, "no brackets"))?;
        if first.min_income != Decimal::ZERO {
            return Err(PayrollError::malformed(
                TABLE,
                format!("first bracket must start at 0, starts at {}", first.min_income),
            ));
        }

        let last_index = brackets.len() - 1;
        let mut expected_fixed = Decimal::ZERO;

        for (index, bracket) in brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(PayrollError::malformed(
                    TABLE,
                    format!("bracket {} rate {} is outside 0..=1", index, bracket.rate),
                ));
            }
            if bracket.fixed_amount != expected_fixed {
                return Err(PayrollError::malformed(
                    TABLE,
                    format!(
                        "bracket {} fixed amount {} does not match cumulative tax {}",
                        index, bracket.fixed_amount, expected_fixed
                    ),
                ));
            }

            match (bracket.max_income, index == last_index) {
                (None, true) => {}
                (Some(_), true) => {
                    return Err(PayrollError::malformed(
                        TABLE,
                        "last bracket must be unbounded",
                    ));
                }
                (None, false) => {
                    return Err(PayrollError::malformed(
                        TABLE,
                        format!("bracket {} is unbounded but is not the last", index),
                    ));
                }
                (Some(max), false) => {
                    if max <= bracket.min_income {
                        return Err(PayrollError::malformed(
                            TABLE,
                            format!("bracket {} upper bound {} is not above {}", index, max, bracket.min_income),
                        ));
                    }
                    let next_min = brackets[index + 1].min_income;
                    if next_min != max {
                        return Err(PayrollError::malformed(
                            TABLE,
                            format!(
                                "brackets {} and {} are not contiguous ({} vs {})",
                                index,
                                index + 1,
                                max,
                                next_min
                            ),
                        ));
                    }
                    expected_fixed += (max - bracket.min_income) * bracket.rate;
                }
            }
        }

        Ok(Self { brackets })
    }

    /// Builds a table from `(threshold, rate)` pairs, deriving each bracket's
    /// upper bound and fixed amount.
    ///
    /// Thresholds must be strictly ascending and start at zero.
    pub fn from_marginal_rates(rates: &[(Decimal, Decimal)]) -> EngineResult<Self> {
        let mut brackets = Vec::with_capacity(rates.len());
        let mut fixed_amount = Decimal::ZERO;

        for (index, &(min_income, rate)) in rates.iter().enumerate() {
            let max_income = rates.get(index + 1).map(|&(next, _)| next);
            brackets.push(TaxBracket {
                min_income,
                max_income,
                rate,
                fixed_amount,
            });
            if let Some(max) = max_income {
                fixed_amount += (max - min_income) * rate;
            }
        }

        Self::new(brackets)
    }

    /// Returns the brackets, lowest first.
    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Returns the index of the bracket containing `income`.
    ///
    /// An income equal to a bracket's upper bound belongs to the next bracket.
    pub fn bracket_index(&self, income: Decimal) -> usize {
        self.brackets
            .iter()
            .rposition(|b| income >= b.min_income)
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<TaxBracket>> for TaxBracketTable {
    type Error = PayrollError;

    fn try_from(brackets: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

/// Computes income tax with the closed form.
///
/// # Arguments
///
/// * `taxable_income` - The income to tax, in the table's unit (monthly or annual)
/// * `brackets` - The validated bracket table
///
/// # Returns
///
/// The exact (unrounded) tax. Income at or below the first bracket's minimum
/// is taxed at zero.
///
/// # Errors
///
/// Returns [`PayrollError::Calculation`] for negative income: validation
/// rejects negative amounts, so reaching here with one is a defect.
pub fn compute_income_tax(
    taxable_income: Decimal,
    brackets: &TaxBracketTable,
) -> EngineResult<Decimal> {
    if taxable_income < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "taxable income cannot be negative, got {}",
            taxable_income
        )));
    }

    let bracket = &brackets.brackets[brackets.bracket_index(taxable_income)];
    if taxable_income <= bracket.min_income {
        return Ok(bracket.fixed_amount);
    }
    Ok(bracket.fixed_amount + (taxable_income - bracket.min_income) * bracket.rate)
}

/// Computes income tax by walking the brackets and summing each slice.
///
/// Always agrees with [`compute_income_tax`].
pub fn marginal_income_tax(
    taxable_income: Decimal,
    brackets: &TaxBracketTable,
) -> EngineResult<Decimal> {
    if taxable_income < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "taxable income cannot be negative, got {}",
            taxable_income
        )));
    }

    let mut tax = Decimal::ZERO;
    for bracket in &brackets.brackets {
        if taxable_income <= bracket.min_income {
            break;
        }
        let upper = match bracket.max_income {
            Some(max) => taxable_income.min(max),
            None => taxable_income,
        };
        tax += (upper - bracket.min_income) * bracket.rate;
    }
    Ok(tax)
}

/// The income tax owed for one period, before rounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeTaxResult {
    /// The monthly income the schedule was applied to.
    pub taxable_income: Decimal,
    /// The income looked up in the brackets (annual when the schedule is annualized).
    pub bracket_income: Decimal,
    /// The bracket the income fell in.
    pub bracket: TaxBracket,
    /// Whether the schedule was annualized.
    pub annualized: bool,
    /// Tax for the period.
    pub tax: Decimal,
}

/// Derives taxable income from gross pay and employee contributions.
pub fn taxable_income(
    gross_salary: Decimal,
    employee_contributions: Decimal,
    tax_base: TaxBase,
) -> Decimal {
    match tax_base {
        TaxBase::Gross => gross_salary,
        TaxBase::GrossLessEmployeeContributions => gross_salary - employee_contributions,
    }
}

/// Applies a full tax schedule (including annualization) to a month's taxable income.
pub fn resolve_income_tax(
    taxable_income: Decimal,
    schedule: &TaxSchedule,
) -> EngineResult<IncomeTaxResult> {
    let months = Decimal::from(12);
    let bracket_income = if schedule.annualized {
        taxable_income.checked_mul(months).ok_or_else(|| {
            PayrollError::calculation(format!(
                "taxable income {} is too large to annualize",
                taxable_income
            ))
        })?
    } else {
        taxable_income
    };

    let tax = compute_income_tax(bracket_income, &schedule.brackets)?;
    let tax = if schedule.annualized { tax / months } else { tax };
    let bracket = schedule.brackets.brackets()[schedule.brackets.bracket_index(bracket_income)].clone();

    Ok(IncomeTaxResult {
        taxable_income,
        bracket_income,
        bracket,
        annualized: schedule.annualized,
        tax,
    })
}
