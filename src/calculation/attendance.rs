//! Attendance adjustment calculation.
//!
//! This module derives the delay penalty and absence deduction for a
//! period from the attendance facts. It never changes the attendance
//! record, it only computes amounts from it.
//!
//! ## Delay tiers
//!
//! | Tier | Delay | Penalty |
//! |---|---|---|
//! | None | 0 min | none |
//! | Minor | 1-15 min | flat `minor_penalty` (zero by default, warning only) |
//! | Moderate | 16-60 min | `daily_rate * delay / standard_day_minutes` |
//! | Severe | > 60 min | moderate formula × `severe_escalation`, at most one daily rate; needs approval |
//!
//! Unpaid absence costs `absence_days * daily_rate`; paid absence is recorded
//! without a deduction.

use rust_decimal::Decimal;

use crate::config::{AttendancePolicy, MoneyRounding};
use crate::error::{EngineResult, PayrollError};
use crate::models::{
    AttendanceInput, AttendanceSummary, CalculationWarning, DelayTier, WarningSeverity,
};

/// The attendance adjustment for one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceAdjustment {
    /// The delay tier.
    pub tier: DelayTier,
    /// Minutes of delay.
    pub delay_minutes: u32,
    /// The daily rate the amounts derive from.
    pub daily_rate: Decimal,
    /// Amount withheld for the delay.
    pub delay_penalty: Decimal,
    /// Days absent.
    pub absence_days: Decimal,
    /// Whether the absence was paid.
    pub is_paid_absence: bool,
    /// Amount withheld for unpaid absence.
    pub absence_deduction: Decimal,
    /// Whether the delay penalty needs approval before payment.
    pub requires_approval: bool,
    /// Warnings to carry on the result.
    pub warnings: Vec<CalculationWarning>,
}

impl AttendanceAdjustment {
    /// Rounds both amounts to the ledger currency.
    pub fn rounded(&self, rounding: MoneyRounding) -> Self {
        Self {
            delay_penalty: rounding.round(self.delay_penalty),
            absence_deduction: rounding.round(self.absence_deduction),
            ..self.clone()
        }
    }

    /// Delay penalty plus absence deduction.
    pub fn total(&self) -> Decimal {
        self.delay_penalty + self.absence_deduction
    }

    /// The summary reported on the payroll result.
    pub fn summary(&self) -> AttendanceSummary {
        AttendanceSummary {
            tier: self.tier,
            delay_minutes: self.delay_minutes,
            delay_penalty: self.delay_penalty,
            absence_days: self.absence_days,
            paid_absence_days: if self.is_paid_absence {
                self.absence_days
            } else {
                Decimal::ZERO
            },
            absence_deduction: self.absence_deduction,
            requires_approval: self.requires_approval,
        }
    }
}

/// Computes the delay penalty and absence deduction.
///
/// # Arguments
///
/// * `attendance` - Delay and absence facts for the period
/// * `daily_rate` - `base_salary / working_days_per_month`
/// * `policy` - Minor penalty and severe escalation factor
/// * `standard_daily_hours` - Length of a working day, for the delay ratio
///
/// # Errors
///
/// Returns [`PayrollError::Calculation`] for a negative daily rate or absence,
/// or a non-positive working day length.
///
/// # Example
///
/// ```
/// use paie_engine::calculation::compute_adjustment;
/// use paie_engine::config::AttendancePolicy;
/// use paie_engine::models::{AttendanceInput, DelayTier};
/// use rust_decimal::Decimal;
///
/// let attendance = AttendanceInput { delay_minutes: 30, ..AttendanceInput::default() };
/// let adjustment = compute_adjustment(
///     &attendance,
///     Decimal::new(16_000, 0),
///     &AttendancePolicy::default(),
///     Decimal::new(8, 0),
/// )
/// .unwrap();
///
/// assert_eq!(adjustment.tier, DelayTier::Moderate);
/// assert_eq!(adjustment.delay_penalty, Decimal::new(1_000, 0));
/// ```
pub fn compute_adjustment(
    attendance: &AttendanceInput,
    daily_rate: Decimal,
    policy: &AttendancePolicy,
    standard_daily_hours: Decimal,
) -> EngineResult<AttendanceAdjustment> {
    if daily_rate < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "daily rate cannot be negative, got {}",
            daily_rate
        )));
    }
    if attendance.absence_days < Decimal::ZERO {
        return Err(PayrollError::calculation(format!(
            "absence days cannot be negative, got {}",
            attendance.absence_days
        )));
    }
    if standard_daily_hours <= Decimal::ZERO {
        return Err(PayrollError::calculation(
            "standard daily hours must be positive",
        ));
    }

    let tier = attendance.delay_tier();
    let delay = Decimal::from(attendance.delay_minutes);
    let day_minutes = standard_daily_hours * Decimal::from(60);
    let proportional = daily_rate * delay / day_minutes;
    let mut warnings = Vec::new();

    let (delay_penalty, requires_approval) = match tier {
        DelayTier::None => (Decimal::ZERO, false),
        DelayTier::Minor => {
            warnings.push(CalculationWarning {
                code: "MINOR_DELAY".to_string(),
                message: format!(
                    "Late arrival of {} minutes recorded",
                    attendance.delay_minutes
                ),
                severity: WarningSeverity::Low,
            });
            (policy.minor_penalty.min(daily_rate), false)
        }
        DelayTier::Moderate => (proportional.min(daily_rate), false),
        DelayTier::Severe => {
            warnings.push(CalculationWarning {
                code: "SEVERE_DELAY_REQUIRES_APPROVAL".to_string(),
                message: format!(
                    "Late arrival of {} minutes exceeds one hour; the penalty requires approval",
                    attendance.delay_minutes
                ),
                severity: WarningSeverity::High,
            });
            ((proportional * policy.severe_escalation).min(daily_rate), true)
        }
    };

    let absence_deduction = if attendance.is_paid_absence {
        if attendance.absence_days > Decimal::ZERO {
            warnings.push(CalculationWarning {
                code: "PAID_ABSENCE_RECORDED".to_string(),
                message: format!(
                    "{} days of paid absence recorded without deduction",
                    attendance.absence_days.normalize()
                ),
                severity: WarningSeverity::Low,
            });
        }
        Decimal::ZERO
    } else {
        attendance.absence_days * daily_rate
    };

    Ok(AttendanceAdjustment {
        tier,
        delay_minutes: attendance.delay_minutes,
        daily_rate,
        delay_penalty,
        absence_days: attendance.absence_days,
        is_paid_absence: attendance.is_paid_absence,
        absence_deduction,
        requires_approval,
        warnings,
    })
}
