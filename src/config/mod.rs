//! Configuration loading and management for the payroll engine.
//!
//! This module loads a jurisdiction's payroll rules from YAML files: the
//! statutory constants, the income-tax schedule, the social contribution
//! schemes and the overtime rules, each set versioned by its effective date.
//!
//! # Example
//!
//! ```no_run
//! use paie_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/senegal").unwrap();
//! println!("Loaded rules for: {}", config.jurisdiction().name);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AttendancePolicy, JurisdictionMetadata, MoneyRounding, OvertimeRule, RuleBook, RuleSnapshot,
    SocialContributionRate, TaxBase, TaxBracket, TaxSchedule,
};
