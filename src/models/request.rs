//! Payroll request models.
//!
//! This module defines the per-employee, per-period input to the payroll
//! pipeline: [`PayrollRequest`], its [`AttendanceInput`], and the
//! [`OvertimeCategory`] and [`DelayTier`] classifications.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayrollPeriod;

/// Longest delay, in minutes, still classified as [`DelayTier::Minor`].
pub const MINOR_DELAY_MAX_MINUTES: u32 = 15;

/// Longest delay, in minutes, still classified as [`DelayTier::Moderate`].
pub const MODERATE_DELAY_MAX_MINUTES: u32 = 60;

/// Classification of overtime hours, each paid at its own multiplier.
///
/// `Regular` is overtime worked on an ordinary weekday during daytime hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimeCategory {
    /// Weekday daytime overtime.
    Regular,
    /// Overtime worked at night.
    Night,
    /// Overtime worked on the weekly rest day.
    Weekend,
    /// Overtime worked on a public holiday.
    Holiday,
}

impl OvertimeCategory {
    /// All categories, in reporting order.
    pub const ALL: [OvertimeCategory; 4] = [
        OvertimeCategory::Regular,
        OvertimeCategory::Night,
        OvertimeCategory::Weekend,
        OvertimeCategory::Holiday,
    ];

    /// The snake_case name used in configuration and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            OvertimeCategory::Regular => "regular",
            OvertimeCategory::Night => "night",
            OvertimeCategory::Weekend => "weekend",
            OvertimeCategory::Holiday => "holiday",
        }
    }
}

impl fmt::Display for OvertimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Penalty tier for late arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayTier {
    /// On time.
    None,
    /// 1 to 15 minutes late.
    Minor,
    /// 16 to 60 minutes late.
    Moderate,
    /// More than 60 minutes late.
    Severe,
}

impl DelayTier {
    /// Classifies a delay expressed in minutes.
    ///
    /// # Example
    ///
    /// ```
    /// use paie_engine::models::DelayTier;
    ///
    /// assert_eq!(DelayTier::for_delay(0), DelayTier::None);
    /// assert_eq!(DelayTier::for_delay(15), DelayTier::Minor);
    /// assert_eq!(DelayTier::for_delay(16), DelayTier::Moderate);
    /// assert_eq!(DelayTier::for_delay(61), DelayTier::Severe);
    /// ```
    pub fn for_delay(delay_minutes: u32) -> Self {
        match delay_minutes {
            0 => DelayTier::None,
            m if m <= MINOR_DELAY_MAX_MINUTES => DelayTier::Minor,
            m if m <= MODERATE_DELAY_MAX_MINUTES => DelayTier::Moderate,
            _ => DelayTier::Severe,
        }
    }
}

/// Attendance facts for one employee over one period.
///
/// The zero value (`AttendanceInput::default()`) means no delay and no absence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceInput {
    /// Minutes of late arrival.
    #[serde(default)]
    pub delay_minutes: u32,
    /// Days absent (may be fractional for half days).
    #[serde(default)]
    pub absence_days: Decimal,
    /// Whether the absence is paid leave (recorded but not deducted).
    #[serde(default)]
    pub is_paid_absence: bool,
}

impl AttendanceInput {
    /// Builds an attendance input from a scheduled and an actual start time.
    ///
    /// Early arrival counts as no delay.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::NaiveTime;
    /// use paie_engine::models::AttendanceInput;
    ///
    /// let scheduled = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
    /// let actual = NaiveTime::from_hms_opt(8, 15, 0).unwrap();
    /// let attendance = AttendanceInput::from_clock_in(scheduled, actual);
    /// assert_eq!(attendance.delay_minutes, 15);
    /// ```
    pub fn from_clock_in(scheduled_start: NaiveTime, actual_start: NaiveTime) -> Self {
        let minutes = (actual_start - scheduled_start).num_minutes().max(0);
        Self {
            delay_minutes: u32::try_from(minutes).unwrap_or(u32::MAX),
            ..Self::default()
        }
    }

    /// The delay tier of this input.
    pub fn delay_tier(&self) -> DelayTier {
        DelayTier::for_delay(self.delay_minutes)
    }
}

/// Everything needed to compute one employee's payroll for one period.
///
/// Requests are plain values: construct one with [`PayrollRequest::new`] and
/// struct update syntax, and build a new request to correct one.
///
/// # Example
///
/// ```
/// use paie_engine::models::{OvertimeCategory, PayrollPeriod, PayrollRequest};
/// use rust_decimal::Decimal;
/// use std::collections::BTreeMap;
///
/// let request = PayrollRequest {
///     hours_by_category: BTreeMap::from([(OvertimeCategory::Night, Decimal::new(4, 0))]),
///     ..PayrollRequest::new(
///         "emp_001",
///         PayrollPeriod::new(2024, 3).unwrap(),
///         Decimal::new(350_000, 0),
///         Decimal::new(17333, 2),
///     )
/// };
/// assert_eq!(request.total_overtime_hours(), Decimal::new(4, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRequest {
    /// Unique identifier for the employee.
    pub employee_id: String,
    /// The month being paid.
    pub period: PayrollPeriod,
    /// Monthly base salary.
    pub base_salary: Decimal,
    /// Ordinary hours worked in the period.
    pub regular_hours: Decimal,
    /// Overtime hours by category.
    #[serde(default)]
    pub hours_by_category: BTreeMap<OvertimeCategory, Decimal>,
    /// Named allowances and bonuses added to gross pay.
    #[serde(default)]
    pub allowances: BTreeMap<String, Decimal>,
    /// Named explicit deductions (advances, loan repayments, ...).
    #[serde(default)]
    pub deductions: BTreeMap<String, Decimal>,
    /// Attendance facts for the period.
    #[serde(default)]
    pub attendance: AttendanceInput,
}

impl PayrollRequest {
    /// Creates a request with no overtime, allowances, deductions or attendance events.
    pub fn new(
        employee_id: impl Into<String>,
        period: PayrollPeriod,
        base_salary: Decimal,
        regular_hours: Decimal,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            period,
            base_salary,
            regular_hours,
            hours_by_category: BTreeMap::new(),
            allowances: BTreeMap::new(),
            deductions: BTreeMap::new(),
            attendance: AttendanceInput::default(),
        }
    }

    /// Sum of all allowances.
    pub fn total_allowances(&self) -> Decimal {
        self.allowances.values().copied().sum()
    }

    /// Sum of all explicit deductions.
    pub fn total_explicit_deductions(&self) -> Decimal {
        self.deductions.values().copied().sum()
    }

    /// Sum of overtime hours across categories.
    pub fn total_overtime_hours(&self) -> Decimal {
        self.hours_by_category.values().copied().sum()
    }
}
