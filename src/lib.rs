//! Statutory payroll engine for Senegal
//!
//! This crate computes monthly payroll under Senegalese labour and tax law:
//! progressive income tax (IRPP), capped social contributions (IPRES, CSS,
//! IPM), categorized overtime and attendance adjustments. Rules are loaded
//! from effective-dated YAML files and every result carries an ordered trace
//! of the steps that produced it.

#![warn(missing_docs)]

pub mod bulk;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod validation;
