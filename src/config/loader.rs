//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading a
//! jurisdiction's payroll rules from YAML files.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::engine::RuleSource;
use crate::error::{EngineResult, PayrollError};

use super::types::{JurisdictionMetadata, RuleBook, RuleSnapshot};

/// Loads and provides access to a jurisdiction's payroll rules.
///
/// # Directory Structure
///
/// The configuration directory should have the following structure:
/// ```text
/// config/senegal/
/// ├── jurisdiction.yaml   # Code, name, currency and rounding scale
/// └── rules/
///     └── 2024-01-01.yaml # Rules effective from this date
/// ```
///
/// Every rule file is a complete [`RuleSnapshot`]; a change in law is a new
/// dated file, never an edit of an old one.
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use paie_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/senegal").unwrap();
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// let rules = loader.rules().snapshot_for(date).unwrap();
/// println!("SMIG: {}", rules.minimum_monthly_wage);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    rules: Arc<RuleBook>,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration directory (e.g., "./config/senegal")
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - A rule table fails its consistency checks
    /// - A rule file's name does not match its `effective_date`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use paie_engine::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::load("./config/senegal")?;
    /// # Ok::<(), paie_engine::error::PayrollError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let metadata = Self::load_yaml::<JurisdictionMetadata>(&path.join("jurisdiction.yaml"))?;
        let snapshots = Self::load_rules(&path.join("rules"))?;
        let rules = RuleBook::new(metadata, snapshots)?;

        tracing::info!(
            jurisdiction = %rules.metadata().code,
            snapshots = rules.snapshots().len(),
            "Payroll rules loaded"
        );

        Ok(Self {
            rules: Arc::new(rules),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| PayrollError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| PayrollError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every rule file from the rules directory.
    fn load_rules(rules_dir: &Path) -> EngineResult<Vec<RuleSnapshot>> {
        let rules_dir_str = rules_dir.display().to_string();

        let entries = fs::read_dir(rules_dir).map_err(|_| PayrollError::ConfigNotFound {
            path: rules_dir_str.clone(),
        })?;

        let mut snapshots = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|_| PayrollError::ConfigNotFound {
                path: rules_dir_str.clone(),
            })?;

            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "yaml") {
                continue;
            }

            let snapshot = Self::load_yaml::<RuleSnapshot>(&path)?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if let Ok(file_date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                if file_date != snapshot.effective_date {
                    return Err(PayrollError::ConfigParseError {
                        path: path.display().to_string(),
                        message: format!(
                            "file name says {} but effective_date is {}",
                            file_date, snapshot.effective_date
                        ),
                    });
                }
            }
            snapshots.push(snapshot);
        }

        if snapshots.is_empty() {
            return Err(PayrollError::ConfigNotFound {
                path: format!("{} (no rule files found)", rules_dir_str),
            });
        }

        Ok(snapshots)
    }

    /// Returns the loaded rule book.
    ///
    /// [`RuleSource::rule_book`] hands out a shared handle to the same book.
    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Returns the jurisdiction metadata.
    pub fn jurisdiction(&self) -> &JurisdictionMetadata {
        self.rules.metadata()
    }
}

impl RuleSource for ConfigLoader {
    fn rule_book(&self) -> EngineResult<Arc<RuleBook>> {
        Ok(Arc::clone(&self.rules))
    }
}
