//! Social contribution calculation.
//!
//! This module computes the employee and employer shares of every
//! contribution scheme (IPRES pension, CSS family allowance and work
//! accident, IPM health cover). Each scheme is independent and applies its
//! rates to gross salary capped at its own ceiling:
//!
//! ```text
//! base     = min(gross, ceiling)   (gross when uncapped)
//! employee = base * employee_rate
//! employer = base * employer_rate
//! ```
//!
//! Only the employee share reduces net pay; the employer share is reported
//! for the employer's cost view.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;

use crate::config::{MoneyRounding, SocialContributionRate};
use crate::error::{EngineResult, PayrollError};

const TABLE: &str = "social contribution";

/// Contribution amounts for one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionLine {
    /// The scheme identifier.
    pub scheme_name: String,
    /// The gross salary after applying the ceiling.
    pub base: Decimal,
    /// The ceiling that applied, if any.
    pub income_ceiling: Option<Decimal>,
    /// Employee-side rate.
    pub employee_rate: Decimal,
    /// Employer-side rate.
    pub employer_rate: Decimal,
    /// Employee share (deducted from net pay).
    pub employee_amount: Decimal,
    /// Employer share (employer cost only).
    pub employer_amount: Decimal,
}

/// The contributions of every configured scheme, in configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContributionResult {
    /// One line per scheme.
    pub lines: Vec<ContributionLine>,
}

impl ContributionResult {
    /// Employee share by scheme.
    pub fn employee_by_scheme(&self) -> BTreeMap<String, Decimal> {
        self.lines
            .iter()
            .map(|l| (l.scheme_name.clone(), l.employee_amount))
            .collect()
    }

    /// Employer share by scheme.
    pub fn employer_by_scheme(&self) -> BTreeMap<String, Decimal> {
        self.lines
            .iter()
            .map(|l| (l.scheme_name.clone(), l.employer_amount))
            .collect()
    }

    /// Sum of employee shares.
    pub fn employee_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.employee_amount).sum()
    }

    /// Sum of employer shares.
    pub fn employer_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.employer_amount).sum()
    }

    /// Rounds every amount to the ledger currency.
    pub fn rounded(&self, rounding: MoneyRounding) -> Self {
        Self {
            lines: self
                .lines
                .iter()
                .map(|l| ContributionLine {
                    employee_amount: rounding.round(l.employee_amount),
                    employer_amount: rounding.round(l.employer_amount),
                    ..l.clone()
                })
                .collect(),
        }
    }
}

/// Computes the contributions of every scheme on a gross salary.
///
/// # Arguments
///
/// * `gross_salary` - The period's gross salary
/// * `rates` - The contribution schemes in force
///
/// # Returns
///
/// Exact (unrounded) amounts for each scheme.
///
/// # Errors
///
/// Returns [`PayrollError::Calculation`] if the gross salary is negative.
///
/// # Example
///
/// ```
/// use paie_engine::calculation::compute_contributions;
/// use paie_engine::config::SocialContributionRate;
/// use rust_decimal::Decimal;
///
/// let rates = vec![SocialContributionRate {
///     scheme_name: "ipres_general".to_string(),
///     employee_rate: Decimal::new(56, 3),
///     employer_rate: Decimal::new(84, 3),
///     income_ceiling: Some(Decimal::new(432_000, 0)),
/// }];
///
/// let result = compute_contributions(Decimal::new(600_000, 0), &rates).unwrap();
/// assert_eq!(result.lines[0].base, Decimal::new(432_000, 0));
/// assert_eq!(result.employee_total(), Decimal::new(24_192, 0));
/// ```
pub fn compute_contributions(
    gross_salary: Decimal,
    rates: &[SocialContributionRate],
) -> EngineResult<ContributionResult> {
    if gross_salary < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "gross salary cannot be negative, got {}",
            gross_salary
        )));
    }

    let lines = rates
        .iter()
        .map(|rate| {
            let base = match rate.income_ceiling {
                Some(ceiling) => gross_salary.min(ceiling),
                None => gross_salary,
            };
            ContributionLine {
                scheme_name: rate.scheme_name.clone(),
                base,
                income_ceiling: rate.income_ceiling,
                employee_rate: rate.employee_rate,
                employer_rate: rate.employer_rate,
                employee_amount: base * rate.employee_rate,
                employer_amount: base * rate.employer_rate,
            }
        })
        .collect();

    Ok(ContributionResult { lines })
}

/// Checks a contribution table: unique non-blank names, rates in 0..=1,
/// positive ceilings, and employee rates summing below 1.
pub fn validate_contribution_rates(rates: &[SocialContributionRate]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for rate in rates {
        if rate.scheme_name.trim().is_empty() {
            return Err(PayrollError::malformed(TABLE, "scheme name is blank"));
        }
        if !seen.insert(rate.scheme_name.as_str()) {
            return Err(PayrollError::malformed(
                TABLE,
                format!("scheme '{}' is listed twice", rate.scheme_name),
            ));
        }
        for (side, value) in [("employee", rate.employee_rate), ("employer", rate.employer_rate)] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(PayrollError::malformed(
                    TABLE,
                    format!(
                        "scheme '{}' {} rate {} is outside 0..=1",
                        rate.scheme_name, side, value
                    ),
                ));
            }
        }
        if rate.income_ceiling.is_some_and(|c| c <= Decimal::ZERO) {
            return Err(PayrollError::malformed(
                TABLE,
                format!("scheme '{}' ceiling must be positive", rate.scheme_name),
            ));
        }
    }

    let employee_total: Decimal = rates.iter().map(|r| r.employee_rate).sum();
    if employee_total >= Decimal::ONE {
        return Err(PayrollError::malformed(
            TABLE,
            format!("employee rates sum to {}, must be below 1", employee_total),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rate(name: &str, employee: &str, employer: &str, ceiling: Option<&str>) -> SocialContributionRate {
        SocialContributionRate {
            scheme_name: name.to_string(),
            employee_rate: dec(employee),
            employer_rate: dec(employer),
            income_ceiling: ceiling.map(dec),
        }
    }

    fn senegal_rates() -> Vec<SocialContributionRate> {
        vec![
            rate("ipres_general", "0.056", "0.084", Some("432000")),
            rate("css_family", "0", "0.07", Some("63000")),
            rate("ipm_health", "0.03", "0.03", None),
        ]
    }

    #[test]
    fn test_ceiling_caps_the_base() {
        let result = compute_contributions(dec("600000"), &senegal_rates()).unwrap();
        let ipres = &result.lines[0];
        assert_eq!(ipres.base, dec("432000"));
        assert_eq!(ipres.employee_amount, dec("24192"));
        assert_eq!(ipres.employer_amount, dec("36288"));
    }

    #[test]
    fn test_below_ceiling_uses_gross() {
        let result = compute_contributions(dec("300000"), &senegal_rates()).unwrap();
        assert_eq!(result.lines[0].base, dec("300000"));
        assert_eq!(result.lines[0].employee_amount, dec("16800"));
    }

    #[test]
    fn test_uncapped_scheme_uses_full_gross() {
        let result = compute_contributions(dec("2000000"), &senegal_rates()).unwrap();
        let ipm = &result.lines[2];
        assert_eq!(ipm.base, dec("2000000"));
        assert_eq!(ipm.employee_amount, dec("60000"));
    }

    #[test]
    fn test_employer_only_scheme_costs_employee_nothing() {
        let result = compute_contributions(dec("300000"), &senegal_rates()).unwrap();
        let css = &result.lines[1];
        assert_eq!(css.employee_amount, dec("0"));
        assert_eq!(css.employer_amount, dec("4410"));
    }

    #[test]
    fn test_totals_and_maps() {
        let result = compute_contributions(dec("300000"), &senegal_rates()).unwrap();
        // 16800 + 0 + 9000
        assert_eq!(result.employee_total(), dec("25800"));
        // 25200 + 4410 + 9000
        assert_eq!(result.employer_total(), dec("38610"));

        let by_scheme = result.employee_by_scheme();
        assert_eq!(by_scheme.len(), 3);
        assert_eq!(by_scheme["ipm_health"], dec("9000"));
    }

    #[test]
    fn test_rounded_amounts() {
        let rates = vec![rate("ipm_health", "0.035", "0.035", None)];
        let result = compute_contributions(dec("123457"), &rates)
            .unwrap()
            .rounded(MoneyRounding::new(0));
        // 4320.995 rounds half away from zero
        assert_eq!(result.lines[0].employee_amount, dec("4321"));
    }

    #[test]
    fn test_negative_gross_is_calculation_error() {
        let result = compute_contributions(dec("-1"), &senegal_rates());
        assert!(matches!(result, Err(PayrollError::Calculation { .. })));
    }

    #[test]
    fn test_validate_accepts_senegal_rates() {
        assert!(validate_contribution_rates(&senegal_rates()).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_scheme() {
        let rates = vec![
            rate("ipres_general", "0.056", "0.084", None),
            rate("ipres_general", "0.01", "0.01", None),
        ];
        assert!(matches!(
            validate_contribution_rates(&rates),
            Err(PayrollError::MalformedRuleTable { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_rate_outside_range() {
        let rates = vec![rate("ipm_health", "-0.01", "0.03", None)];
        assert!(validate_contribution_rates(&rates).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let rates = vec![rate("css_family", "0", "0.07", Some("0"))];
        assert!(validate_contribution_rates(&rates).is_err());
    }
}
