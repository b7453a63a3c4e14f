//! Configuration types for payroll rules.
//!
//! This module contains the strongly-typed rule structures that are
//! deserialized from YAML configuration files: the income tax, contribution
//! and overtime tables, bundled into effective-dated
//! [`RuleSnapshot`]s collected in a [`RuleBook`].

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::calculation::{TaxBracketTable, validate_contribution_rates, validate_overtime_rules};
use crate::error::{EngineResult, PayrollError};
use crate::models::{OvertimeCategory, PayrollPeriod};

/// Metadata about the jurisdiction the rules implement.
#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionMetadata {
    /// Short code (e.g., "SN").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// ISO 4217 ledger currency (e.g., "XOF").
    pub currency: String,
    /// Decimal places money amounts are rounded to.
    #[serde(default)]
    pub currency_scale: u32,
    /// Where the rules were sourced from.
    #[serde(default)]
    pub source_url: Option<String>,
}

/// Rounds money amounts to the ledger currency's scale, half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyRounding {
    scale: u32,
}

impl MoneyRounding {
    /// Creates a rounding rule for the given number of decimal places.
    pub fn new(scale: u32) -> Self {
        Self { scale }
    }

    /// The number of decimal places kept.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Rounds an amount.
    ///
    /// # Example
    ///
    /// ```
    /// use paie_engine::config::MoneyRounding;
    /// use rust_decimal::Decimal;
    ///
    /// let xof = MoneyRounding::new(0);
    /// assert_eq!(xof.round(Decimal::new(125, 1)), Decimal::new(13, 0));
    /// ```
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// One bracket of the progressive income-tax table.
///
/// `fixed_amount` is the cumulative tax of every lower bracket, so the tax on
/// an income inside this bracket is `fixed_amount + (income - min_income) * rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Inclusive lower bound.
    pub min_income: Decimal,
    /// Exclusive upper bound; `None` for the top bracket.
    #[serde(default)]
    pub max_income: Option<Decimal>,
    /// Marginal rate between 0 and 1.
    pub rate: Decimal,
    /// Tax due on all lower brackets.
    #[serde(default)]
    pub fixed_amount: Decimal,
}

/// Which income the tax schedule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxBase {
    /// Gross salary.
    #[default]
    Gross,
    /// Gross salary minus employee-side social contributions.
    GrossLessEmployeeContributions,
}

/// The income-tax (IRPP) schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxSchedule {
    /// Income the brackets apply to.
    #[serde(default)]
    pub tax_base: TaxBase,
    /// When true the brackets are annual: monthly income is multiplied by 12
    /// and the resulting tax divided by 12.
    #[serde(default)]
    pub annualized: bool,
    /// The validated bracket table.
    pub brackets: TaxBracketTable,
}

/// Rates of one social contribution scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialContributionRate {
    /// Scheme identifier (e.g., "ipres_general").
    pub scheme_name: String,
    /// Employee-side rate between 0 and 1.
    pub employee_rate: Decimal,
    /// Employer-side rate between 0 and 1.
    pub employer_rate: Decimal,
    /// Monthly income ceiling; `None` means uncapped.
    #[serde(default)]
    pub income_ceiling: Option<Decimal>,
}

/// Pay multiplier and cap for one overtime category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeRule {
    /// The category this rule prices.
    pub category: OvertimeCategory,
    /// Multiplier applied to the hourly rate, greater than 1.
    pub multiplier: Decimal,
    /// Most hours compensated in one period; `None` means no cap.
    #[serde(default)]
    pub max_hours_per_period: Option<Decimal>,
}

/// Amounts used for late arrival.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttendancePolicy {
    /// Flat amount withheld for a minor delay (zero means warning only).
    #[serde(default)]
    pub minor_penalty: Decimal,
    /// Factor applied to the proportional deduction for a severe delay.
    #[serde(default = "default_severe_escalation")]
    pub severe_escalation: Decimal,
}

fn default_severe_escalation() -> Decimal {
    Decimal::TWO
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            minor_penalty: Decimal::ZERO,
            severe_escalation: default_severe_escalation(),
        }
    }
}

/// An immutable, effective-dated set of every rule the pipeline needs.
///
/// Snapshots are shared behind an `Arc` and never change once loaded: a
/// refreshed rule set is a new snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSnapshot {
    /// First date these rules apply to.
    pub effective_date: NaiveDate,
    /// Statutory minimum monthly wage (SMIG).
    pub minimum_monthly_wage: Decimal,
    /// Divisor turning a monthly salary into an hourly rate.
    pub standard_monthly_hours: Decimal,
    /// Divisor turning a monthly salary into a daily rate.
    pub working_days_per_month: Decimal,
    /// Length of a standard working day, in hours.
    pub standard_daily_hours: Decimal,
    /// Late-arrival policy.
    #[serde(default)]
    pub attendance: AttendancePolicy,
    /// Income-tax schedule.
    pub income_tax: TaxSchedule,
    /// Contribution schemes.
    pub contributions: Vec<SocialContributionRate>,
    /// Overtime rules.
    pub overtime: Vec<OvertimeRule>,
}

impl RuleSnapshot {
    /// Checks the cross-field constraints the table types cannot enforce alone.
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("standard_monthly_hours", self.standard_monthly_hours),
            ("working_days_per_month", self.working_days_per_month),
            ("standard_daily_hours", self.standard_daily_hours),
        ];
        for (name, value) in positive {
            if value <= Decimal::ZERO {
                return Err(PayrollError::malformed(
                    "rule snapshot",
                    format!("{} must be positive, got {}", name, value),
                ));
            }
        }
        if self.standard_daily_hours > Decimal::from(24) {
            return Err(PayrollError::malformed(
                "rule snapshot",
                format!(
                    "standard_daily_hours cannot exceed 24, got {}",
                    self.standard_daily_hours
                ),
            ));
        }
        if self.minimum_monthly_wage < Decimal::ZERO {
            return Err(PayrollError::malformed(
                "rule snapshot",
                "minimum_monthly_wage cannot be negative",
            ));
        }
        if self.attendance.minor_penalty < Decimal::ZERO
            || self.attendance.severe_escalation < Decimal::ONE
        {
            return Err(PayrollError::malformed(
                "attendance policy",
                "minor_penalty must be >= 0 and severe_escalation >= 1",
            ));
        }

        validate_contribution_rates(&self.contributions)?;
        validate_overtime_rules(&self.overtime)?;
        Ok(())
    }

    /// Returns the overtime rule for a category, if configured.
    pub fn overtime_rule(&self, category: OvertimeCategory) -> Option<&OvertimeRule> {
        self.overtime.iter().find(|r| r.category == category)
    }

    /// Hourly rate for a monthly salary.
    pub fn hourly_rate(&self, base_salary: Decimal) -> Decimal {
        base_salary / self.standard_monthly_hours
    }

    /// Daily rate for a monthly salary.
    pub fn daily_rate(&self, base_salary: Decimal) -> Decimal {
        base_salary / self.working_days_per_month
    }
}

/// The complete rule configuration: jurisdiction metadata plus every
/// effective-dated snapshot.
///
/// A bulk run captures one `Arc<RuleBook>` and resolves every employee
/// against it, so a concurrent reload cannot mix rule versions in a batch.
#[derive(Debug, Clone)]
pub struct RuleBook {
    metadata: JurisdictionMetadata,
    /// Sorted oldest first.
    snapshots: Vec<Arc<RuleSnapshot>>,
}

impl RuleBook {
    /// Creates a rule book, validating and sorting the snapshots.
    pub fn new(metadata: JurisdictionMetadata, snapshots: Vec<RuleSnapshot>) -> EngineResult<Self> {
        if snapshots.is_empty() {
            return Err(PayrollError::malformed("rule book", "no rule snapshots"));
        }
        for snapshot in &snapshots {
            snapshot.validate()?;
        }

        let mut sorted = snapshots;
        sorted.sort_by(|a, b| a.effective_date.cmp(&b.effective_date));
        if let Some(pair) = sorted
            .windows(2)
            .find(|w| w[0].effective_date == w[1].effective_date)
        {
            return Err(PayrollError::malformed(
                "rule book",
                format!("two rule snapshots effective on {}", pair[0].effective_date),
            ));
        }

        Ok(Self {
            metadata,
            snapshots: sorted.into_iter().map(Arc::new).collect(),
        })
    }

    /// Returns the jurisdiction metadata.
    pub fn metadata(&self) -> &JurisdictionMetadata {
        &self.metadata
    }

    /// Returns all snapshots, oldest first.
    pub fn snapshots(&self) -> &[Arc<RuleSnapshot>] {
        &self.snapshots
    }

    /// Money rounding for the ledger currency.
    pub fn rounding(&self) -> MoneyRounding {
        MoneyRounding::new(self.metadata.currency_scale)
    }

    /// Returns the most recent snapshot effective on or before `date`.
    pub fn snapshot_for(&self, date: NaiveDate) -> EngineResult<Arc<RuleSnapshot>> {
        self.snapshots
            .iter()
            .rfind(|s| s.effective_date <= date)
            .cloned()
            .ok_or(PayrollError::RulesNotFound { date })
    }

    /// Returns the snapshot governing a payroll period: the one in force on
    /// the first day of the month.
    pub fn snapshot_for_period(&self, period: PayrollPeriod) -> EngineResult<Arc<RuleSnapshot>> {
        self.snapshot_for(period.first_day())
    }
}
