//! Core data models for the payroll engine.
//!
//! This module contains the request and result value types used throughout
//! the engine.

mod period;
mod request;
mod result;

pub use period::{ParsePeriodError, PayrollPeriod};
pub use request::{
    AttendanceInput, DelayTier, MINOR_DELAY_MAX_MINUTES, MODERATE_DELAY_MAX_MINUTES,
    OvertimeCategory, PayrollRequest,
};
pub use result::{
    AttendanceSummary, CalculationDetail, CalculationWarning, PayrollResult, WarningSeverity,
};
