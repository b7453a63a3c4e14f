//! Bulk payroll runs.
//!
//! [`BulkPayrollOrchestrator`] runs many requests through the single-employee
//! pipeline on a bounded pool of blocking tasks. Failures are isolated per
//! employee: one bad request, or even a panicking one, never aborts the
//! batch. Every employee ID ends up in exactly one of `results`, `errors` or
//! `skipped`.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RuleBook;
use crate::engine::calculate;
use crate::error::{EngineResult, PayrollError};
use crate::models::{PayrollRequest, PayrollResult};

/// Employees computed at once when not configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// The per-employee calculation a batch runs.
pub type CalculateFn = fn(&PayrollRequest, &RuleBook, NaiveDate) -> EngineResult<PayrollResult>;

/// Options for a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    /// Upper bound on concurrently computed employees (at least 1).
    pub max_concurrency: usize,
    /// Today's date, used by validation to reject future periods.
    pub as_of: NaiveDate,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            as_of: Utc::now().date_naive(),
        }
    }
}

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    /// Every employee was computed successfully.
    Complete,
    /// Every employee was attempted and at least one failed.
    PartialFailure,
    /// The run was cancelled before every employee was dispatched.
    Cancelled,
}

/// The outcome of a bulk run, keyed by employee ID.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOperationResult {
    /// Identifies the run in logs.
    pub batch_id: Uuid,
    /// Successful results.
    pub results: BTreeMap<String, PayrollResult>,
    /// Failures, one per employee ID.
    #[serde(serialize_with = "serialize_errors")]
    pub errors: BTreeMap<String, PayrollError>,
    /// IDs never dispatched because the run was cancelled.
    pub skipped: BTreeSet<String>,
    /// Number of entries in `results`.
    pub success_count: usize,
    /// Number of entries in `errors`.
    pub failure_count: usize,
}

fn serialize_errors<S: Serializer>(
    errors: &BTreeMap<String, PayrollError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(errors.iter().map(|(id, e)| (id, e.to_string())))
}

impl BulkOperationResult {
    /// The overall status of the run.
    pub fn status(&self) -> BulkStatus {
        if !self.skipped.is_empty() {
            BulkStatus::Cancelled
        } else if self.failure_count > 0 {
            BulkStatus::PartialFailure
        } else {
            BulkStatus::Complete
        }
    }

    /// Number of distinct employee IDs the run accounted for.
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count + self.skipped.len()
    }
}

/// Runs payroll for many employees against one rule book.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use paie_engine::bulk::{BulkOptions, BulkPayrollOrchestrator};
/// use paie_engine::config::ConfigLoader;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), paie_engine::error::PayrollError> {
/// let loader = ConfigLoader::load("./config/senegal")?;
/// let orchestrator = BulkPayrollOrchestrator::new(
///     Arc::new(loader.rules().clone()),
///     BulkOptions::default(),
/// );
///
/// let result = orchestrator.compute_bulk(vec![], &CancellationToken::new()).await;
/// assert_eq!(result.total(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BulkPayrollOrchestrator {
    rules: Arc<RuleBook>,
    options: BulkOptions,
    calculate: CalculateFn,
}

impl BulkPayrollOrchestrator {
    /// Creates an orchestrator that runs the standard pipeline.
    pub fn new(rules: Arc<RuleBook>, options: BulkOptions) -> Self {
        Self {
            rules,
            options,
            calculate,
        }
    }

    /// Replaces the per-employee calculation.
    pub fn with_calculator(mut self, calculate: CalculateFn) -> Self {
        self.calculate = calculate;
        self
    }

    /// Computes payroll for every request.
    ///
    /// Requests are dispatched in input order, at most `max_concurrency` at a
    /// time. Once `cancel` fires no further request is dispatched: requests
    /// already running finish and keep their results, the rest are reported
    /// in `skipped`. An employee ID submitted more than once is not computed
    /// and gets a single [`PayrollError::DuplicateRequest`].
    pub async fn compute_bulk(
        &self,
        requests: Vec<PayrollRequest>,
        cancel: &CancellationToken,
    ) -> BulkOperationResult {
        let batch_id = Uuid::new_v4();
        let start_time = Instant::now();
        info!(
            batch_id = %batch_id,
            requests = requests.len(),
            max_concurrency = self.options.max_concurrency,
            "Bulk payroll started"
        );

        let mut occurrences: BTreeMap<String, usize> = BTreeMap::new();
        for request in &requests {
            *occurrences.entry(request.employee_id.clone()).or_default() += 1;
        }

        let mut errors = BTreeMap::new();
        let mut queue = Vec::with_capacity(requests.len());
        for request in requests {
            if occurrences[&request.employee_id] > 1 {
                errors
                    .entry(request.employee_id.clone())
                    .or_insert_with(|| PayrollError::DuplicateRequest {
                        employee_id: request.employee_id.clone(),
                    });
            } else {
                queue.push(request);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut in_flight = BTreeSet::new();
        let mut skipped = BTreeSet::new();
        let mut pending = queue.into_iter();

        while let Some(request) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                skipped.insert(request.employee_id);
                skipped.extend(pending.by_ref().map(|r| r.employee_id));
                break;
            };

            in_flight.insert(request.employee_id.clone());
            let rules = Arc::clone(&self.rules);
            let calculate = self.calculate;
            let as_of = self.options.as_of;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = compute_isolated(calculate, &request, &rules, as_of);
                (request.employee_id, outcome)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((employee_id, outcome)) => {
                    in_flight.remove(&employee_id);
                    match outcome {
                        Ok(result) => {
                            results.insert(employee_id, result);
                        }
                        Err(err) => {
                            errors.insert(employee_id, err);
                        }
                    }
                }
                Err(join_error) => {
                    error!(batch_id = %batch_id, error = %join_error, "Bulk payroll task failed");
                }
            }
        }
        for employee_id in in_flight {
            errors.insert(
                employee_id,
                PayrollError::calculation("payroll task ended without a result"),
            );
        }

        for (employee_id, err) in &errors {
            warn!(
                batch_id = %batch_id,
                employee_id = %employee_id,
                error = %err,
                "Payroll failed for employee"
            );
        }

        let result = BulkOperationResult {
            batch_id,
            success_count: results.len(),
            failure_count: errors.len(),
            results,
            errors,
            skipped,
        };
        info!(
            batch_id = %batch_id,
            succeeded = result.success_count,
            failed = result.failure_count,
            skipped = result.skipped.len(),
            status = ?result.status(),
            duration_ms = start_time.elapsed().as_millis(),
            "Bulk payroll finished"
        );
        result
    }
}

/// Runs one calculation, turning a panic into a calculation error.
fn compute_isolated(
    calculate: CalculateFn,
    request: &PayrollRequest,
    rules: &RuleBook,
    as_of: NaiveDate,
) -> EngineResult<PayrollResult> {
    match panic::catch_unwind(AssertUnwindSafe(|| calculate(request, rules, as_of))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                employee_id = %request.employee_id,
                panic = %message,
                "Payroll calculation panicked"
            );
            Err(PayrollError::calculation(format!(
                "calculation panicked: {}",
                message
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::TaxBracketTable;
    use crate::config::{
        AttendancePolicy, JurisdictionMetadata, OvertimeRule, RuleSnapshot,
        SocialContributionRate, TaxBase, TaxSchedule,
    };
    use crate::models::{OvertimeCategory, PayrollPeriod};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::OnceLock;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rule_book() -> Arc<RuleBook> {
        let snapshot = RuleSnapshot {
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            minimum_monthly_wage: dec("64223"),
            standard_monthly_hours: dec("173.33"),
            working_days_per_month: dec("26"),
            standard_daily_hours: dec("8"),
            attendance: AttendancePolicy::default(),
            income_tax: TaxSchedule {
                tax_base: TaxBase::Gross,
                annualized: false,
                brackets: TaxBracketTable::from_marginal_rates(&[
                    (dec("0"), dec("0")),
                    (dec("100000"), dec("0.2")),
                ])
                .unwrap(),
            },
            contributions: vec![SocialContributionRate {
                scheme_name: "ipres_general".to_string(),
                employee_rate: dec("0.056"),
                employer_rate: dec("0.084"),
                income_ceiling: Some(dec("432000")),
            }],
            overtime: vec![OvertimeRule {
                category: OvertimeCategory::Regular,
                multiplier: dec("1.15"),
                max_hours_per_period: Some(dec("32")),
            }],
        };
        let metadata = JurisdictionMetadata {
            code: "SN".to_string(),
            name: "Senegal".to_string(),
            currency: "XOF".to_string(),
            currency_scale: 0,
            source_url: None,
        };
        Arc::new(RuleBook::new(metadata, vec![snapshot]).unwrap())
    }

    fn options(max_concurrency: usize) -> BulkOptions {
        BulkOptions {
            max_concurrency,
            as_of: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        }
    }

    fn request(id: &str, base: &str) -> PayrollRequest {
        PayrollRequest::new(
            id,
            PayrollPeriod::new(2024, 3).unwrap(),
            dec(base),
            dec("173.33"),
        )
    }

    fn batch(size: usize) -> Vec<PayrollRequest> {
        (0..size)
            .map(|i| request(&format!("emp_{:03}", i), "250000"))
            .collect()
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(4));
        let result = orchestrator
            .compute_bulk(batch(20), &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 20);
        assert_eq!(result.failure_count, 0);
        assert!(result.skipped.is_empty());
        assert_eq!(result.status(), BulkStatus::Complete);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut requests = batch(5);
        requests.push(request("emp_low", "1000"));
        requests.push(request("", "250000"));

        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(2));
        let result = orchestrator
            .compute_bulk(requests, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 5);
        assert_eq!(result.failure_count, 2);
        assert!(result.errors["emp_low"].is_business_rule_violation());
        assert!(result.errors[""].is_validation());
        assert_eq!(result.status(), BulkStatus::PartialFailure);
        assert_eq!(result.total(), 7);
    }

    #[tokio::test]
    async fn test_duplicate_ids_get_one_error() {
        let mut requests = batch(3);
        requests.push(request("emp_001", "300000"));
        requests.push(request("emp_001", "400000"));

        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(2));
        let result = orchestrator
            .compute_bulk(requests, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert!(!result.results.contains_key("emp_001"));
        match &result.errors["emp_001"] {
            PayrollError::DuplicateRequest { employee_id } => assert_eq!(employee_id, "emp_001"),
            other => panic!("Expected DuplicateRequest error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(4));
        let result = orchestrator.compute_bulk(batch(10), &cancel).await;

        assert_eq!(result.success_count, 0);
        assert_eq!(result.skipped.len(), 10);
        assert_eq!(result.status(), BulkStatus::Cancelled);
    }

    static MID_RUN_CANCEL: OnceLock<CancellationToken> = OnceLock::new();

    fn cancel_after_compute(
        request: &PayrollRequest,
        rules: &RuleBook,
        as_of: NaiveDate,
    ) -> EngineResult<PayrollResult> {
        let outcome = calculate(request, rules, as_of);
        if let Some(token) = MID_RUN_CANCEL.get() {
            token.cancel();
        }
        outcome
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_completed_results() {
        let cancel = MID_RUN_CANCEL.get_or_init(CancellationToken::new);

        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(1))
            .with_calculator(cancel_after_compute);
        let result = orchestrator.compute_bulk(batch(6), cancel).await;

        assert_eq!(result.success_count, 1);
        assert!(result.results.contains_key("emp_000"));
        assert_eq!(result.skipped.len(), 5);
        assert_eq!(result.total(), 6);
        assert_eq!(result.status(), BulkStatus::Cancelled);
    }

    fn panic_on_emp_002(
        request: &PayrollRequest,
        rules: &RuleBook,
        as_of: NaiveDate,
    ) -> EngineResult<PayrollResult> {
        if request.employee_id == "emp_002" {
            panic!("corrupt employee record");
        }
        calculate(request, rules, as_of)
    }

    #[tokio::test]
    async fn test_panic_is_captured_for_its_employee() {
        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(3))
            .with_calculator(panic_on_emp_002);
        let result = orchestrator
            .compute_bulk(batch(5), &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 4);
        match &result.errors["emp_002"] {
            PayrollError::Calculation { message } => {
                assert!(message.contains("corrupt employee record"));
            }
            other => panic!("Expected Calculation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_results_match_single_pipeline() {
        let rules = rule_book();
        let requests = batch(4);
        let orchestrator = BulkPayrollOrchestrator::new(Arc::clone(&rules), options(4));
        let result = orchestrator
            .compute_bulk(requests.clone(), &CancellationToken::new())
            .await;

        for request in &requests {
            let single = calculate(request, &rules, options(1).as_of).unwrap();
            assert_eq!(result.results[&request.employee_id], single);
        }
    }

    #[tokio::test]
    async fn test_serializes_errors_as_messages() {
        let orchestrator = BulkPayrollOrchestrator::new(rule_book(), options(1));
        let result = orchestrator
            .compute_bulk(vec![request("emp_low", "1000")], &CancellationToken::new())
            .await;

        let json = serde_json::to_value(&result).unwrap();
        let message = json["errors"]["emp_low"].as_str().unwrap();
        assert!(message.starts_with("Validation failed"));
    }
}
