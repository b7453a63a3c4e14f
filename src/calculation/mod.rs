//! Calculation logic for the payroll engine.
//!
//! This module contains the pure calculators that make up the payroll
//! pipeline: progressive income tax from a bracket table, capped social
//! contributions, categorized overtime, attendance adjustments, and the
//! aggregation that combines them into a checked [`PayrollResult`].
//!
//! [`PayrollResult`]: crate::models::PayrollResult

mod aggregation;
mod attendance;
mod income_tax;
mod overtime;
mod social_contributions;

pub use aggregation::aggregate;
pub use attendance::{AttendanceAdjustment, compute_adjustment};
pub use income_tax::{
    IncomeTaxResult, TaxBracketTable, compute_income_tax, marginal_income_tax,
    resolve_income_tax, taxable_income,
};
pub use overtime::{
    OVERTIME_CAP_WARNING, OvertimeLine, OvertimeResult, compute_overtime, validate_overtime_rules,
};
pub use social_contributions::{
    ContributionLine, ContributionResult, compute_contributions, validate_contribution_rates,
};
